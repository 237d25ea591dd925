//! Collaborator seams for text generation and document retrieval. The
//! engine depends only on these traits; concrete HTTP clients live in the
//! tutela-ai crate and tests plug in deterministic fakes.

use anyhow::Result;
use async_trait::async_trait;

use crate::types::Passage;

/// LLM text generation behind a single prompt-in/text-out call.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Semantic search over the indexed legal corpus.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Passage>>;
}
