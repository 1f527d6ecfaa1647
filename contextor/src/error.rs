//! Typed error for the contextor crate and its outward-facing taxonomy.

use ai_llm_service::AiLlmError;
use rag_store::RagError;
use serde::Serialize;
use thiserror::Error;

/// Coarse failure class shared by the HTTP surface and the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorClass {
    ValidationError,
    UpstreamUnavailable,
    NotFound,
    /// Some items of a batch failed, the rest went through.
    PartialBatchFailure,
}

#[derive(Debug, Error)]
pub enum ContextorError {
    /// Request carried no usable query text.
    #[error("missing query parameter")]
    MissingQuery,

    #[error("embedding failed: {0}")]
    Embedding(#[source] RagError),

    #[error("search failed: {0}")]
    Search(#[source] RagError),

    #[error("generation failed: {0}")]
    Generation(#[source] AiLlmError),
}

impl ContextorError {
    /// Stable machine-readable category for response bodies.
    pub fn category(&self) -> &'static str {
        match self {
            ContextorError::MissingQuery => "missing_query",
            ContextorError::Embedding(_) => "embedding_failed",
            ContextorError::Search(_) => "search_failed",
            ContextorError::Generation(_) => "generation_failed",
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            ContextorError::MissingQuery => ErrorClass::ValidationError,
            ContextorError::Search(e) if e.is_not_found() => ErrorClass::NotFound,
            ContextorError::Embedding(_) | ContextorError::Search(_) | ContextorError::Generation(_) => {
                ErrorClass::UpstreamUnavailable
            }
        }
    }

    /// HTTP status for this failure.
    pub fn status_code(&self) -> u16 {
        match self.class() {
            ErrorClass::ValidationError => 400,
            ErrorClass::NotFound => 503,
            ErrorClass::UpstreamUnavailable | ErrorClass::PartialBatchFailure => 502,
        }
    }

    /// One-line message safe to return to clients: no upstream URLs or bodies.
    pub fn public_message(&self) -> &'static str {
        match self {
            ContextorError::MissingQuery => "Missing query parameter",
            ContextorError::Embedding(_) => "Failed to generate embedding",
            ContextorError::Search(e) if e.is_not_found() => "Vector index is not available",
            ContextorError::Search(_) => "Failed to perform vector search",
            ContextorError::Generation(_) => "Failed to generate answer",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_table() {
        let cases = [
            (ContextorError::MissingQuery, "missing_query", ErrorClass::ValidationError, 400),
            (
                ContextorError::Embedding(RagError::Embedding("throttled".into())),
                "embedding_failed",
                ErrorClass::UpstreamUnavailable,
                502,
            ),
            (
                ContextorError::Search(RagError::InvalidQuery("bad".into())),
                "search_failed",
                ErrorClass::UpstreamUnavailable,
                502,
            ),
            (
                ContextorError::Search(RagError::NotFound("error-logs-mock".into())),
                "search_failed",
                ErrorClass::NotFound,
                503,
            ),
            (
                ContextorError::Generation(AiLlmError::EmptyInput),
                "generation_failed",
                ErrorClass::UpstreamUnavailable,
                502,
            ),
        ];
        for (err, category, class, status) in cases {
            assert_eq!(err.category(), category);
            assert_eq!(err.class(), class);
            assert_eq!(err.status_code(), status, "{err}");
        }
    }

    #[test]
    fn request_errors_use_the_public_categories_only() {
        let errs = [
            ContextorError::MissingQuery,
            ContextorError::Embedding(RagError::Embedding("x".into())),
            ContextorError::Search(RagError::NotFound("x".into())),
            ContextorError::Generation(AiLlmError::EmptyInput),
        ];
        let known = ["missing_query", "embedding_failed", "search_failed", "generation_failed"];
        for err in errs {
            assert!(known.contains(&err.category()), "{}", err.category());
            assert!(err.status_code() != 500, "{err}");
        }
    }

    #[test]
    fn public_message_hides_upstream_detail() {
        let err = ContextorError::Search(RagError::Decode("https://secret.aoss/_search: junk".into()));
        assert!(!err.public_message().contains("secret"));
    }
}
