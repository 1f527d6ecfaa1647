//! Error type shared by the AWS helpers.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors produced while resolving credentials, signing, or talking to AWS.
#[derive(Debug, Error)]
pub enum AwsError {
    /// A required credential variable is absent.
    #[error("missing AWS credential: {0}")]
    MissingCredentials(&'static str),

    /// The credential endpoint answered with something unusable.
    #[error("failed to fetch credentials: {0}")]
    CredentialsFetch(String),

    /// Request could not be signed (non-UTF8 header, missing host, ...).
    #[error("failed to sign request: {0}")]
    Signing(String),

    /// Underlying HTTP transport error.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-successful HTTP status from an AWS endpoint.
    #[error("HTTP {status} from {url}: {snippet}")]
    HttpStatus {
        status: StatusCode,
        url: String,
        snippet: String,
    },

    /// Response payload did not have the expected shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// Local file access failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Required configuration is absent or invalid.
    #[error("config error: {0}")]
    Config(String),
}

/// Keeps the first 240 characters of an upstream body for logs and errors.
pub fn make_snippet(body: &str) -> String {
    body.trim().chars().take(240).collect()
}
