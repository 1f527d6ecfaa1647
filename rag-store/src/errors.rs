//! Unified error types for the crate.

use reqwest::StatusCode;
use services::{AwsError, http_policy::Transient};
use thiserror::Error;

/// Top-level error for rag-store operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// I/O or filesystem errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing / serialization errors.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Invalid or missing configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Vector length differs from the index dimension.
    #[error("vector size mismatch: got {got}, want {want}")]
    VectorSizeMismatch { got: usize, want: usize },

    /// Index, collection or other resource is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Create call hit an existing resource.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// 401/403 from the backend.
    #[error("access denied (HTTP {status}): {snippet}")]
    Auth { status: StatusCode, snippet: String },

    /// 400 from the backend for a search or mapping body.
    #[error("invalid request: {0}")]
    InvalidQuery(String),

    /// Any other non-2xx answer.
    #[error("HTTP {status} from {url}: {snippet}")]
    Http {
        status: StatusCode,
        url: String,
        snippet: String,
    },

    /// Network failure before an answer arrived.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Credentials or signing failed.
    #[error("aws: {0}")]
    Aws(#[from] AwsError),

    /// Embedding provider failed for one text.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// Response did not have the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
}

impl RagError {
    /// True when the backend reported a missing index or collection.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RagError::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, RagError::AlreadyExists(_))
    }
}

impl Transient for RagError {
    fn is_transient(&self) -> bool {
        match self {
            RagError::Transport(e) => e.is_transient(),
            RagError::Aws(e) => e.is_transient(),
            _ => false,
        }
    }

    fn is_connect(&self) -> bool {
        match self {
            RagError::Transport(e) => e.is_connect(),
            RagError::Aws(e) => Transient::is_connect(e),
            _ => false,
        }
    }
}
