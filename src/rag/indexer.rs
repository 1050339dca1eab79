use std::path::Path;

use anyhow::Context;
use tracing::{info, instrument};

use crate::config::IndexingConfig;

use super::embed::{embed_in_batches, SharedEmbeddings};
use super::index::{DocumentChunk, Retriever, VectorIndex};
use super::loader::{SourceDocument, SourceLoader};
use super::splitter::TextSplitter;

/// One-shot bulk build: discover, load, split, embed, index.
pub struct Indexer {
    loader: SourceLoader,
    splitter: TextSplitter,
    embedder: SharedEmbeddings,
    batch_size: usize,
    top_k: usize,
}

impl Indexer {
    pub fn new(
        config: &IndexingConfig,
        embedder: SharedEmbeddings,
        batch_size: usize,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            loader: SourceLoader::with_defaults()?,
            splitter: TextSplitter::new(
                config.splitter_language,
                config.chunk_size,
                config.chunk_overlap,
            ),
            embedder,
            batch_size,
            top_k: config.top_k,
        })
    }

    /// Builds a retriever over every chunk under `root`. An empty repository
    /// yields an empty index, not an error.
    #[instrument(skip_all, fields(root = %root.display()))]
    pub async fn build_index(&self, root: &Path) -> anyhow::Result<Retriever> {
        let loader = self.loader.clone();
        let splitter = self.splitter.clone();
        let walk_root = root.to_path_buf();

        let chunks = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<DocumentChunk>> {
            let documents = loader.load(&walk_root)?;
            Ok(split_documents(&splitter, &documents))
        })
        .await
        .context("Indexing task panicked")??;

        info!(
            chunks = chunks.len(),
            profile = ?self.splitter.profile(),
            "Split repository into chunks"
        );

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = embed_in_batches(self.embedder.as_ref(), &texts, self.batch_size).await?;
        let index = VectorIndex::build(chunks, vectors)?;

        info!(indexed = index.len(), "Vector index ready");
        Ok(Retriever::new(index, self.embedder.clone(), self.top_k))
    }
}

pub fn split_documents(splitter: &TextSplitter, documents: &[SourceDocument]) -> Vec<DocumentChunk> {
    documents
        .iter()
        .flat_map(|doc| {
            splitter.split(&doc.text).into_iter().map(|text| DocumentChunk {
                source: doc.path.clone(),
                language: doc.language,
                text,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use super::*;
    use crate::rag::mock::HashEmbeddings;
    use crate::rag::splitter::LanguageProfile;

    fn small_config() -> IndexingConfig {
        IndexingConfig {
            chunk_size: 120,
            chunk_overlap: 20,
            splitter_language: LanguageProfile::Python,
            top_k: 2,
        }
    }

    #[tokio::test]
    async fn builds_index_over_supported_files_in_batches() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut source = String::new();
        for i in 0..30 {
            source.push_str(&format!("\ndef step_{i}(ctx):\n    return ctx.advance({i})\n"));
        }
        fs::write(dir.path().join("pipeline.py"), &source).expect("write py");
        fs::write(dir.path().join("README.md"), "# Pipeline\nRuns steps.").expect("write md");
        fs::write(dir.path().join("data.csv"), "a,b\n1,2").expect("write csv");

        let embedder = Arc::new(HashEmbeddings::default());
        let indexer = Indexer::new(&small_config(), embedder.clone(), 4).expect("indexer");
        let retriever = indexer.build_index(dir.path()).await.expect("index");

        let total = retriever.index().len();
        assert!(total > 4);
        let sizes = embedder.batch_sizes();
        assert_eq!(sizes.len(), total.div_ceil(4));
        assert!(sizes.iter().all(|size| *size <= 4));
        assert_eq!(sizes.iter().sum::<usize>(), total);
    }

    #[tokio::test]
    async fn repository_without_sources_builds_empty_index() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("notes.txt"), "nothing to index").expect("write");

        let embedder = Arc::new(HashEmbeddings::default());
        let indexer = Indexer::new(&small_config(), embedder.clone(), 200).expect("indexer");
        let retriever = indexer.build_index(dir.path()).await.expect("index");

        assert!(retriever.index().is_empty());
        assert!(embedder.batch_sizes().is_empty());
        assert!(retriever.retrieve("what is this?").await.expect("retrieve").is_empty());
    }

    #[tokio::test]
    async fn embedding_failures_propagate() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("main.go"), "package main\n\nfunc main() {}\n").expect("write");

        let indexer = Indexer::new(&small_config(), Arc::new(HashEmbeddings::failing_after(0)), 200)
            .expect("indexer");
        assert!(indexer.build_index(dir.path()).await.is_err());
    }

    #[test]
    fn chunks_are_tagged_with_their_source() {
        let splitter = TextSplitter::new(LanguageProfile::Python, 50, 0);
        let documents = vec![
            SourceDocument {
                path: "a.py".to_string(),
                language: None,
                text: "x = 1\n".repeat(20),
            },
            SourceDocument {
                path: "empty.py".to_string(),
                language: None,
                text: String::new(),
            },
        ];

        let chunks = split_documents(&splitter, &documents);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|chunk| chunk.source == "a.py"));
    }
}
