use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::anyhow;
use async_trait::async_trait;

use super::embed::EmbeddingsProvider;

const DIMS: usize = 1024;

/// Deterministic bag-of-words embeddings: each token bumps one of `DIMS`
/// buckets chosen by its blake3 digest. Records every batch it receives.
#[derive(Default)]
pub struct HashEmbeddings {
    batches: Mutex<Vec<usize>>,
    calls: AtomicUsize,
    fail_after: Option<usize>,
}

impl HashEmbeddings {
    /// Succeeds for the first `calls` requests, then errors.
    pub fn failing_after(calls: usize) -> Self {
        Self {
            fail_after: Some(calls),
            ..Self::default()
        }
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().expect("lock poisoned").clone()
    }

    pub fn vector_for(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; DIMS];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = blake3::hash(token.as_bytes());
            let bytes = digest.as_bytes();
            let bucket = u16::from_le_bytes([bytes[0], bytes[1]]) as usize % DIMS;
            vector[bucket] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingsProvider for HashEmbeddings {
    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_after.is_some_and(|limit| call >= limit) {
            return Err(anyhow!("quota exceeded"));
        }

        self.batches
            .lock()
            .map_err(|_| anyhow!("mock embeddings lock poisoned"))?
            .push(texts.len());
        Ok(texts.iter().map(|text| Self::vector_for(text)).collect())
    }
}
