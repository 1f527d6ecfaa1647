//! Embedding provider backed by the shared model service.

use std::sync::Arc;

use ai_llm_service::LlmServiceProfiles;
use tracing::warn;

use crate::embed::{EmbedFuture, EmbeddingsProvider};
use crate::errors::RagError;

/// Wraps [`LlmServiceProfiles::embed`] and enforces the index dimension.
#[derive(Clone)]
pub struct LlmEmbedder {
    svc: Arc<LlmServiceProfiles>,
    dim: usize,
}

impl LlmEmbedder {
    pub fn new(svc: Arc<LlmServiceProfiles>, dim: usize) -> Self {
        Self { svc, dim }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }
}

impl EmbeddingsProvider for LlmEmbedder {
    fn embed<'a>(&'a self, text: &'a str) -> EmbedFuture<'a> {
        Box::pin(async move {
            let vector = self
                .svc
                .embed(text)
                .await
                .map_err(|e| RagError::Embedding(e.to_string()))?;
            check_dim(vector, self.dim)
        })
    }
}

/// Rejects vectors whose length differs from `want`.
pub fn check_dim(vector: Vec<f32>, want: usize) -> Result<Vec<f32>, RagError> {
    if vector.len() != want {
        warn!(got = vector.len(), want, "embedding dimension mismatch");
        return Err(RagError::VectorSizeMismatch {
            got: vector.len(),
            want,
        });
    }
    Ok(vector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_is_enforced() {
        assert!(check_dim(vec![0.0; 4], 4).is_ok());
        assert!(matches!(
            check_dim(vec![0.0; 3], 4),
            Err(RagError::VectorSizeMismatch { got: 3, want: 4 })
        ));
    }
}
