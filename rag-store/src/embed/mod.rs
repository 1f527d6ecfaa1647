//! Embedding seam between the store and whatever model backend is in use.

use std::{future::Future, pin::Pin};

use crate::errors::RagError;

pub mod llm;

/// Boxed future returned by [`EmbeddingsProvider::embed`].
pub type EmbedFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<f32>, RagError>> + Send + 'a>>;

/// Asynchronous embedding provider.
///
/// Async is required because real providers (Bedrock, Ollama, OpenAI-compatible
/// servers) perform HTTP requests.
pub trait EmbeddingsProvider: Send + Sync {
    fn embed<'a>(&'a self, text: &'a str) -> EmbedFuture<'a>;
}
