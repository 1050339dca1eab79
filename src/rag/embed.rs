use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context};
use async_openai::{
    config::OpenAIConfig, types::CreateEmbeddingRequestArgs, Client as OpenAiClient,
};
use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::config::AppConfig;

pub type SharedEmbeddings = Arc<dyn EmbeddingsProvider>;

#[async_trait]
pub trait EmbeddingsProvider: Send + Sync {
    /// One vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .context("Embedding response missing data")
    }
}

/// Embeds `texts` with sequential requests of at most `batch_size` inputs and
/// concatenates the results, so vector `i` always belongs to `texts[i]`.
#[instrument(level = "debug", skip_all, fields(total = texts.len(), batch_size = batch_size))]
pub async fn embed_in_batches(
    provider: &dyn EmbeddingsProvider,
    texts: &[String],
    batch_size: usize,
) -> anyhow::Result<Vec<Vec<f32>>> {
    anyhow::ensure!(batch_size > 0, "embedding batch size must be positive");

    let mut vectors = Vec::with_capacity(texts.len());
    for (batch_idx, batch) in texts.chunks(batch_size).enumerate() {
        debug!(batch_idx, len = batch.len(), "Embedding batch");
        let embedded = provider
            .embed_batch(batch)
            .await
            .with_context(|| format!("Embedding batch {batch_idx} failed"))?;
        anyhow::ensure!(
            embedded.len() == batch.len(),
            "Embedding batch {batch_idx} returned {} vectors for {} inputs",
            embedded.len(),
            batch.len()
        );
        vectors.extend(embedded);
    }

    Ok(vectors)
}

pub struct OpenAiEmbeddingsClient {
    client: OpenAiClient<OpenAIConfig>,
    model: String,
    cache: Mutex<HashMap<String, Vec<f32>>>,
    cache_capacity: usize,
}

impl OpenAiEmbeddingsClient {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let mut openai_config = OpenAIConfig::new().with_api_key(config.embedding_api_key.clone());
        if let Some(base_url) = &config.embedding_base_url {
            openai_config = openai_config.with_api_base(base_url.clone());
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.http_timeout_ms))
            .build()
            .context("Failed to build embeddings HTTP client")?;

        Ok(Self {
            client: OpenAiClient::with_config(openai_config).with_http_client(http_client),
            model: config.embedding_model.clone(),
            cache: Mutex::new(HashMap::new()),
            cache_capacity: 512,
        })
    }
}

#[async_trait]
impl EmbeddingsProvider for OpenAiEmbeddingsClient {
    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(texts.to_vec())
            .build()?;

        let response = self.client.embeddings().create(request).await?;
        let mut data = response.data;
        data.sort_by_key(|embedding| embedding.index);

        Ok(data.into_iter().map(|embedding| embedding.embedding).collect())
    }

    /// Query path; repeated questions hit the cache instead of the API.
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let cache_key = blake3::hash(text.as_bytes()).to_hex().to_string();

        if let Some(hit) = self
            .cache
            .lock()
            .map_err(|_| anyhow!("embedding cache poisoned"))?
            .get(&cache_key)
            .cloned()
        {
            return Ok(hit);
        }

        let embedding = self
            .embed_batch(&[text.to_string()])
            .await?
            .pop()
            .context("Embedding response missing data")?;

        let mut cache = self
            .cache
            .lock()
            .map_err(|_| anyhow!("embedding cache poisoned"))?;

        if cache.len() >= self.cache_capacity {
            cache.clear();
        }
        cache.insert(cache_key, embedding.clone());

        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::mock::HashEmbeddings;

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("chunk number {i} about topic{}", i % 7)).collect()
    }

    #[tokio::test]
    async fn batches_are_bounded_and_counted() {
        let provider = HashEmbeddings::default();
        let inputs = texts(450);

        let vectors = embed_in_batches(&provider, &inputs, 200)
            .await
            .expect("embed");

        assert_eq!(vectors.len(), 450);
        assert_eq!(provider.batch_sizes(), vec![200, 200, 50]);
    }

    #[tokio::test]
    async fn batching_preserves_input_to_vector_mapping() {
        let inputs = texts(23);

        let unbatched = HashEmbeddings::default()
            .embed_batch(&inputs)
            .await
            .expect("single call");
        let batched = embed_in_batches(&HashEmbeddings::default(), &inputs, 5)
            .await
            .expect("batched");

        assert_eq!(batched, unbatched);
    }

    #[tokio::test]
    async fn empty_input_issues_no_requests() {
        let provider = HashEmbeddings::default();
        let vectors = embed_in_batches(&provider, &[], 200).await.expect("embed");

        assert!(vectors.is_empty());
        assert!(provider.batch_sizes().is_empty());
    }

    #[tokio::test]
    async fn zero_batch_size_is_rejected() {
        let provider = HashEmbeddings::default();
        assert!(embed_in_batches(&provider, &texts(3), 0).await.is_err());
    }

    #[tokio::test]
    async fn provider_errors_propagate() {
        let provider = HashEmbeddings::failing_after(1);
        let err = embed_in_batches(&provider, &texts(10), 4)
            .await
            .expect_err("second batch fails");
        assert!(err.to_string().contains("Embedding batch 1 failed"));
    }
}
