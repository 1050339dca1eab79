//! In-memory vector index and the retriever view over it.
//!
//! Search is brute-force cosine similarity over every stored vector. The
//! index is built once from the full chunk set and never mutated afterwards.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::Serialize;
use tracing::instrument;

use super::embed::SharedEmbeddings;
use super::loader::SourceLanguage;

/// Contiguous span of one source file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentChunk {
    pub source: String,
    pub language: Option<SourceLanguage>,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct VectorIndex {
    entries: Vec<(DocumentChunk, Vec<f32>)>,
}

impl VectorIndex {
    pub fn build(chunks: Vec<DocumentChunk>, vectors: Vec<Vec<f32>>) -> anyhow::Result<Self> {
        anyhow::ensure!(
            chunks.len() == vectors.len(),
            "cannot index {} chunks with {} vectors",
            chunks.len(),
            vectors.len()
        );
        Ok(Self {
            entries: chunks.into_iter().zip(vectors).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Up to `k` chunks, most similar first. Ties keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<DocumentChunk> {
        let mut scored: Vec<(f32, usize)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(idx, (_, vector))| (cosine_sim(query, vector), idx))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        scored
            .into_iter()
            .take(k)
            .map(|(_, idx)| self.entries[idx].0.clone())
            .collect()
    }
}

fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

/// Read-only query interface: embeds the question, then searches the index.
#[derive(Clone)]
pub struct Retriever {
    index: Arc<VectorIndex>,
    embedder: SharedEmbeddings,
    top_k: usize,
}

impl Retriever {
    pub fn new(index: VectorIndex, embedder: SharedEmbeddings, top_k: usize) -> Self {
        Self {
            index: Arc::new(index),
            embedder,
            top_k,
        }
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    #[instrument(level = "debug", skip_all, fields(top_k = self.top_k))]
    pub async fn retrieve(&self, query: &str) -> anyhow::Result<Vec<DocumentChunk>> {
        if self.index.is_empty() {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed(query).await?;
        Ok(self.index.search(&vector, self.top_k))
    }
}
