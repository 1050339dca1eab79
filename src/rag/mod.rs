pub mod embed;
pub mod index;
pub mod indexer;
pub mod loader;
#[cfg(test)]
pub mod mock;
pub mod splitter;

pub use embed::{OpenAiEmbeddingsClient, SharedEmbeddings};
pub use index::Retriever;
pub use indexer::Indexer;
