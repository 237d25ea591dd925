//! HTTP-backed implementations of the generation and retrieval seams.

pub mod ollama;
pub mod retriever;

pub use ollama::OllamaGenerator;
pub use retriever::HttpRetriever;
