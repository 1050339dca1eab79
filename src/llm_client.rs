use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_openai::types::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs};
use async_openai::{config::OpenAIConfig, Client as AsyncOpenAiClient};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use tracing::instrument;

use crate::config::AppConfig;

pub type SharedLlmClient = Arc<dyn LlmClient>;

/// Finite, non-restartable sequence of answer fragments. The full answer is
/// the concatenation of the fragments in emission order.
pub type TextStream = BoxStream<'static, anyhow::Result<String>>;

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;

    async fn stream(&self, prompt: &str) -> anyhow::Result<TextStream>;
}

/// Offline stand-in that answers with the prompt it was given.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct EchoLlmClient;

#[cfg(test)]
#[async_trait]
impl LlmClient for EchoLlmClient {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        Ok(prompt.to_string())
    }

    async fn stream(&self, prompt: &str) -> anyhow::Result<TextStream> {
        let fragments: Vec<anyhow::Result<String>> = prompt
            .split_inclusive('\n')
            .map(|line| Ok(line.to_string()))
            .collect();
        Ok(futures::stream::iter(fragments).boxed())
    }
}

#[cfg(test)]
impl EchoLlmClient {
    pub fn shared() -> SharedLlmClient {
        Arc::new(Self)
    }
}

/// OpenAI-compatible client; by default routed through OpenRouter.
pub struct OpenAiLlmClient {
    client: AsyncOpenAiClient<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAiLlmClient {
    pub fn shared_from_config(config: &AppConfig) -> anyhow::Result<SharedLlmClient> {
        let client = Self::from_config(config)?;
        Ok(Arc::new(client))
    }

    fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let openai_config = OpenAIConfig::new()
            .with_api_key(config.llm_api_key.clone())
            .with_api_base(config.llm_base_url.clone());

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.http_timeout_ms))
            .build()
            .context("Failed to build LLM HTTP client")?;

        Ok(Self {
            client: AsyncOpenAiClient::with_config(openai_config).with_http_client(http_client),
            model: config.llm_model.clone(),
            temperature: config.llm_temperature,
        })
    }

    fn request(
        &self,
        prompt: &str,
        stream: bool,
    ) -> anyhow::Result<async_openai::types::CreateChatCompletionRequest> {
        let user_message = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()?;

        Ok(CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(self.temperature)
            .stream(stream)
            .messages(vec![user_message.into()])
            .build()?)
    }
}

#[async_trait]
impl LlmClient for OpenAiLlmClient {
    #[instrument(level = "debug", skip_all, fields(model = %self.model))]
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        let request = self.request(prompt, false)?;
        let response = self.client.chat().create(request).await?;
        let choice = response
            .choices
            .first()
            .context("LLM response did not contain any choices")?;

        Ok(choice.message.content.clone().unwrap_or_default())
    }

    #[instrument(level = "debug", skip_all, fields(model = %self.model))]
    async fn stream(&self, prompt: &str) -> anyhow::Result<TextStream> {
        let request = self.request(prompt, true)?;
        let response = self.client.chat().create_stream(request).await?;

        let fragments = response.filter_map(|item| async move {
            match item {
                Ok(chunk) => chunk
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.delta.content)
                    .filter(|content| !content.is_empty())
                    .map(Ok),
                Err(err) => Some(Err(anyhow::Error::new(err).context("LLM stream failed"))),
            }
        });

        Ok(fragments.boxed())
    }
}
