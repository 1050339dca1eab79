//! Per-session state: one [`Analyzer`] per chat, driven by [`ChatSession`].

pub mod transport;

use std::path::Path;
use std::sync::{Arc, OnceLock};

use futures::StreamExt;
use regex::Regex;
use tracing::{error, info, instrument, warn};

use crate::config::{AppConfig, IndexingConfig};
use crate::error::FetchError;
use crate::llm_client::{OpenAiLlmClient, SharedLlmClient, TextStream};
use crate::query::QueryEngine;
use crate::rag::{Indexer, OpenAiEmbeddingsClient, Retriever, SharedEmbeddings};
use crate::workspace::{GitCliFetcher, SharedFetcher, Workspace};

pub use transport::{ChatTransport, TerminalTransport};

pub const GREETING: &str =
    "Hello! I can analyze a GitHub repository for you. Please provide a public GitHub URL to begin.";
pub const INVALID_URL: &str =
    "That doesn't look like a GitHub repository URL. Please provide a valid URL.";
pub const ANALYSIS_COMPLETE: &str =
    "Repository analysis complete! You can now ask questions about the code.";
pub const CLONE_SUCCEEDED: &str = "Repository cloned successfully.";
pub const INITIAL_ANALYSIS_AUTHOR: &str = "Initial Analysis";

const STEP_CLONE: &str = "Cloning repository...";
const STEP_INDEX: &str = "Indexing codebase...";
const STEP_ANALYZE: &str = "Performing high-level analysis...";

pub fn is_github_url(text: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^https?://github\.com/[\w-]+/[\w.-]+/?").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(text))
}

/// External collaborators shared by every analyzer a session creates.
#[derive(Clone)]
pub struct Services {
    pub llm_client: SharedLlmClient,
    pub embedder: SharedEmbeddings,
    pub fetcher: SharedFetcher,
    pub embedding_batch_size: usize,
    pub indexing: IndexingConfig,
}

impl Services {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        Ok(Self {
            llm_client: OpenAiLlmClient::shared_from_config(config)?,
            embedder: Arc::new(OpenAiEmbeddingsClient::from_config(config)?),
            fetcher: Arc::new(GitCliFetcher::new(config.shallow_clone)),
            embedding_batch_size: config.embedding_batch_size,
            indexing: config.indexing.clone(),
        })
    }
}

/// Owns one workspace, its index, and the query engine over it.
///
/// Callers sequence the steps: clone, then index, then query. Questions
/// asked before indexing finishes are rejected.
pub struct Analyzer {
    workspace: Workspace,
    fetcher: SharedFetcher,
    indexer: Indexer,
    engine: QueryEngine,
    retriever: Option<Retriever>,
}

impl Analyzer {
    pub fn new(services: &Services) -> anyhow::Result<Self> {
        Ok(Self {
            workspace: Workspace::create()?,
            fetcher: services.fetcher.clone(),
            indexer: Indexer::new(
                &services.indexing,
                services.embedder.clone(),
                services.embedding_batch_size,
            )?,
            engine: QueryEngine::new(services.llm_client.clone()),
            retriever: None,
        })
    }

    pub fn workspace_path(&self) -> &Path {
        self.workspace.path()
    }

    pub async fn clone_repo(&mut self, url: &str) -> Result<(), FetchError> {
        self.workspace.populate(self.fetcher.as_ref(), url).await
    }

    /// Returns the number of indexed chunks.
    pub async fn load_and_index(&mut self) -> anyhow::Result<usize> {
        let retriever = self.indexer.build_index(self.workspace.path()).await?;
        let indexed = retriever.index().len();
        self.retriever = Some(retriever);
        Ok(indexed)
    }

    pub async fn initial_analysis(&self) -> anyhow::Result<String> {
        self.engine.initial_analysis(self.workspace.path()).await
    }

    pub async fn ask(&self, question: &str) -> anyhow::Result<TextStream> {
        let retriever = self
            .retriever
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("The repository has not been indexed yet"))?;
        self.engine.answer(retriever, question).await
    }

    pub fn cleanup(&mut self) {
        self.retriever = None;
        self.workspace.destroy();
    }
}

/// Explicit session context: holds the analyzer, if one is ready.
pub struct ChatSession {
    services: Services,
    analyzer: Option<Analyzer>,
}

impl ChatSession {
    pub fn new(services: Services) -> Self {
        Self {
            services,
            analyzer: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.analyzer.is_some()
    }

    #[cfg(test)]
    pub fn analyzer(&self) -> Option<&Analyzer> {
        self.analyzer.as_ref()
    }

    pub async fn start(&self, transport: &dyn ChatTransport) -> anyhow::Result<()> {
        transport.send(None, GREETING).await
    }

    /// Handles one user message. Pipeline failures are reported through the
    /// transport; only transport failures are returned.
    #[instrument(skip_all, fields(ready = self.analyzer.is_some()))]
    pub async fn handle_message(
        &mut self,
        content: &str,
        transport: &dyn ChatTransport,
    ) -> anyhow::Result<()> {
        let content = content.trim();
        if content.is_empty() {
            return Ok(());
        }

        match &self.analyzer {
            Some(analyzer) => Self::answer(analyzer, content, transport).await,
            None => self.open_repository(content, transport).await,
        }
    }

    /// Tears down the analyzer and its workspace.
    pub fn end(&mut self) {
        if let Some(mut analyzer) = self.analyzer.take() {
            info!("Ending session");
            analyzer.cleanup();
        }
    }

    async fn open_repository(&mut self, url: &str, transport: &dyn ChatTransport) -> anyhow::Result<()> {
        if !is_github_url(url) {
            return transport.send(None, INVALID_URL).await;
        }

        transport
            .send(
                None,
                &format!("Cloning `{url}` and starting analysis... This may take a few minutes."),
            )
            .await?;

        let mut analyzer = match Analyzer::new(&self.services) {
            Ok(analyzer) => analyzer,
            Err(err) => return report_critical(transport, &err).await,
        };

        match Self::prepare(&mut analyzer, url, transport).await {
            Ok(true) => {
                self.analyzer = Some(analyzer);
                transport.send(None, ANALYSIS_COMPLETE).await
            }
            Ok(false) => Ok(()),
            Err(err) => {
                analyzer.cleanup();
                report_critical(transport, &err).await
            }
        }
    }

    /// `Ok(false)` means the clone failed and was already reported.
    async fn prepare(
        analyzer: &mut Analyzer,
        url: &str,
        transport: &dyn ChatTransport,
    ) -> anyhow::Result<bool> {
        transport.step_started(STEP_CLONE).await?;
        if let Err(err) = analyzer.clone_repo(url).await {
            warn!(%err, %url, "Clone failed");
            analyzer.cleanup();
            transport.send(None, &err.to_string()).await?;
            return Ok(false);
        }
        transport.step_finished(STEP_CLONE, CLONE_SUCCEEDED).await?;

        transport.step_started(STEP_INDEX).await?;
        let indexed = analyzer.load_and_index().await?;
        info!(indexed, "Codebase indexed");
        transport
            .step_finished(STEP_INDEX, "Codebase indexed successfully.")
            .await?;

        transport.step_started(STEP_ANALYZE).await?;
        let analysis = analyzer.initial_analysis().await?;
        transport.send(Some(INITIAL_ANALYSIS_AUTHOR), &analysis).await?;
        transport
            .step_finished(STEP_ANALYZE, "Analysis complete.")
            .await?;

        Ok(true)
    }

    async fn answer(
        analyzer: &Analyzer,
        question: &str,
        transport: &dyn ChatTransport,
    ) -> anyhow::Result<()> {
        let mut fragments = match analyzer.ask(question).await {
            Ok(stream) => stream,
            Err(err) => return report_critical(transport, &err).await,
        };

        while let Some(fragment) = fragments.next().await {
            match fragment {
                Ok(text) => transport.stream_fragment(&text).await?,
                Err(err) => {
                    transport.finish_stream().await?;
                    return report_critical(transport, &err).await;
                }
            }
        }
        transport.finish_stream().await
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.end();
    }
}

async fn report_critical(transport: &dyn ChatTransport, err: &anyhow::Error) -> anyhow::Result<()> {
    error!(?err, "Session step failed");
    transport
        .send(None, &format!("A critical error occurred: {err:#}"))
        .await
}
