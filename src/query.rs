use std::path::Path;

use anyhow::Context;
use tracing::{info, instrument};

use crate::llm_client::{SharedLlmClient, TextStream};
use crate::prompts::{InitialAnalysisPrompt, QuestionPrompt};
use crate::rag::Retriever;
use crate::structure;

/// The two prompt-driven query modes over one repository.
pub struct QueryEngine {
    llm_client: SharedLlmClient,
}

impl QueryEngine {
    pub fn new(llm_client: SharedLlmClient) -> Self {
        Self { llm_client }
    }

    /// Tree walk runs on the blocking pool; I/O errors surface to the caller.
    pub async fn initial_analysis_prompt(&self, root: &Path) -> anyhow::Result<InitialAnalysisPrompt> {
        let root = root.to_path_buf();
        tokio::task::spawn_blocking(move || -> anyhow::Result<InitialAnalysisPrompt> {
            Ok(InitialAnalysisPrompt {
                file_structure: structure::describe(&root)?,
                readme_content: structure::readme_or_sentinel(&root),
            })
        })
        .await
        .context("Structure walk panicked")?
    }

    /// Whole-response architectural summary of the repository at `root`.
    #[instrument(skip_all, fields(root = %root.display()))]
    pub async fn initial_analysis(&self, root: &Path) -> anyhow::Result<String> {
        let prompt = self.initial_analysis_prompt(root).await?;
        self.llm_client
            .complete(&prompt.render())
            .await
            .context("Initial analysis request failed")
    }

    /// Retrieves context for `question` and streams the model's answer.
    /// An empty retrieval still goes to the model with an empty context.
    #[instrument(skip_all)]
    pub async fn answer(&self, retriever: &Retriever, question: &str) -> anyhow::Result<TextStream> {
        let chunks = retriever
            .retrieve(question)
            .await
            .context("Context retrieval failed")?;
        info!(retrieved = chunks.len(), "Answering question");

        let prompt = QuestionPrompt {
            context: chunks
                .iter()
                .map(|chunk| chunk.text.as_str())
                .collect::<Vec<_>>()
                .join("\n\n"),
            question: question.to_string(),
        };

        self.llm_client
            .stream(&prompt.render())
            .await
            .context("Question answering request failed")
    }
}
