//! Unified error handling for `ai-llm-service`.
//!
//! A single top-level [`AiLlmError`] wraps domain enums ([`ConfigError`],
//! [`HealthError`], [`ProviderError`]). Environment helpers return the crate
//! [`Result`] alias so config loaders can use `?` throughout.
//!
//! All messages carry the `[AI LLM Service]` prefix for attribution in logs.

use std::{fmt, time::Duration};

use reqwest::StatusCode;
use services::{AwsError, http_policy::Transient};
use thiserror::Error;

pub use services::errors::make_snippet;

/* ------------------------------------------------------------------------- */
/* Public result alias                                                       */
/* ------------------------------------------------------------------------- */

pub type Result<T> = std::result::Result<T, AiLlmError>;

/* ------------------------------------------------------------------------- */
/* Top-level error                                                           */
/* ------------------------------------------------------------------------- */

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum AiLlmError {
    /// Configuration/validation errors (startup only).
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Health(#[from] HealthError),

    /// Upstream provider answered badly or not at all.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Credential resolution or request signing failed.
    #[error("[AI LLM Service] aws: {0}")]
    Aws(#[from] AwsError),

    #[error("[AI LLM Service] transport error: {0}")]
    HttpTransport(#[from] reqwest::Error),

    #[error("[AI LLM Service] operation timed out after {0:?}")]
    Timeout(Duration),

    /// Input text was empty or whitespace only; nothing was sent.
    #[error("[AI LLM Service] input text must not be empty")]
    EmptyInput,
}

impl Transient for AiLlmError {
    fn is_transient(&self) -> bool {
        match self {
            AiLlmError::HttpTransport(e) => e.is_transient(),
            AiLlmError::Aws(e) => e.is_transient(),
            AiLlmError::Timeout(_) => true,
            _ => false,
        }
    }

    fn is_connect(&self) -> bool {
        match self {
            AiLlmError::HttpTransport(e) => e.is_connect(),
            AiLlmError::Aws(e) => Transient::is_connect(e),
            _ => false,
        }
    }
}

/* ------------------------------------------------------------------------- */
/* Config errors                                                             */
/* ------------------------------------------------------------------------- */

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("[AI LLM Service] missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("[AI LLM Service] invalid number in {var}: {reason}")]
    InvalidNumber {
        var: &'static str,
        reason: &'static str,
    },

    #[error("[AI LLM Service] unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("[AI LLM Service] invalid format in {var}: {reason}")]
    InvalidFormat {
        var: &'static str,
        reason: &'static str,
    },

    #[error("[AI LLM Service] {field} is out of range: {detail}")]
    OutOfRange {
        field: &'static str,
        detail: &'static str,
    },

    #[error("[AI LLM Service] model name must not be empty")]
    EmptyModel,

    #[error("[AI LLM Service] no {0} profile configured")]
    MissingProfile(&'static str),
}

/* ------------------------------------------------------------------------- */
/* Provider errors                                                           */
/* ------------------------------------------------------------------------- */

/// Which backend produced a [`ProviderError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Bedrock,
    Ollama,
    OpenAI,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Provider::Bedrock => "Bedrock",
            Provider::Ollama => "Ollama",
            Provider::OpenAI => "OpenAI",
        };
        f.write_str(s)
    }
}

/// Non-2xx response details. The snippet is for logs, never for clients.
#[derive(Debug, Clone)]
pub struct HttpError {
    pub status: StatusCode,
    pub url: String,
    pub snippet: String,
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {} from {}: {}", self.status, self.url, self.snippet)
    }
}

#[derive(Debug, Error)]
pub enum ProviderErrorKind {
    #[error("config does not target this provider")]
    InvalidProvider,

    #[error("missing API key")]
    MissingApiKey,

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("{0}")]
    HttpStatus(HttpError),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("response contained no completion text")]
    EmptyChoices,

    #[error("response contained an empty embedding")]
    EmptyEmbedding,

    /// Stream broke off or carried an error frame.
    #[error("stream error: {0}")]
    Stream(String),
}

#[derive(Debug, Error)]
#[error("[AI LLM Service] {provider}: {kind}")]
pub struct ProviderError {
    pub provider: Provider,
    pub kind: ProviderErrorKind,
}

impl ProviderError {
    pub fn new(provider: Provider, kind: ProviderErrorKind) -> Self {
        Self { provider, kind }
    }

    /// Upstream HTTP status, when the failure was a non-2xx reply.
    pub fn status(&self) -> Option<StatusCode> {
        match &self.kind {
            ProviderErrorKind::HttpStatus(h) => Some(h.status),
            _ => None,
        }
    }
}

/* ------------------------------------------------------------------------- */
/* Health errors                                                             */
/* ------------------------------------------------------------------------- */

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum HealthError {
    #[error("[AI LLM Service] invalid provider for health check")]
    InvalidProvider,

    #[error("[AI LLM Service] invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("[AI LLM Service] {0}")]
    HttpStatus(HttpError),

    #[error("[AI LLM Service] decode error: {0}")]
    Decode(String),
}

/* ------------------------------------------------------------------------- */
/* Env helpers                                                               */
/* ------------------------------------------------------------------------- */

/// Fetches a required, non-empty environment variable.
pub fn must_env(name: &'static str) -> Result<String> {
    require(name, std::env::var(name).ok())
}

/// Parses an optional `u32` from env (`Ok(None)` if unset/empty).
pub fn env_opt_u32(name: &'static str) -> Result<Option<u32>> {
    parse_opt(name, std::env::var(name).ok(), "expected u32")
}

/// Returns `value` when it is present and non-blank.
pub fn require(name: &'static str, value: Option<String>) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ConfigError::MissingVar(name).into()),
    }
}

/// Parses an optional value; blank counts as unset.
pub fn parse_opt<T: std::str::FromStr>(
    name: &'static str,
    value: Option<String>,
    reason: &'static str,
) -> Result<Option<T>> {
    match value {
        Some(v) if !v.trim().is_empty() => v
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { var: name, reason }.into()),
        _ => Ok(None),
    }
}

/* ------------------------------------------------------------------------- */
/* Validation helpers                                                        */
/* ------------------------------------------------------------------------- */

/// Validates that an HTTP endpoint starts with `http://` or `https://`.
pub fn validate_http_endpoint(var: &'static str, value: &str) -> Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidFormat {
            var,
            reason: "must start with http:// or https://",
        }
        .into())
    }
}

/// Validates that a floating-point value lies within an inclusive range.
pub fn validate_range_f32(field: &'static str, value: f32, min: f32, max: f32) -> Result<()> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            detail: "expected value in inclusive range",
        }
        .into())
    }
}

/// Rejects empty or whitespace-only input before any network call.
pub fn ensure_input(input: &str) -> Result<()> {
    if input.trim().is_empty() {
        Err(AiLlmError::EmptyInput)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_trims_and_rejects_blank() {
        assert_eq!(require("X", Some(" v ".into())).unwrap(), "v");
        assert!(matches!(
            require("X", Some("   ".into())),
            Err(AiLlmError::Config(ConfigError::MissingVar("X")))
        ));
        assert!(require("X", None).is_err());
    }

    #[test]
    fn parse_opt_distinguishes_unset_from_invalid() {
        assert_eq!(parse_opt::<u32>("N", None, "u32").unwrap(), None);
        assert_eq!(parse_opt::<u32>("N", Some("".into()), "u32").unwrap(), None);
        assert_eq!(parse_opt::<u32>("N", Some("42".into()), "u32").unwrap(), Some(42));
        assert!(parse_opt::<u32>("N", Some("-1".into()), "u32").is_err());
    }

    #[test]
    fn endpoint_and_range_validation() {
        assert!(validate_http_endpoint("E", "https://x").is_ok());
        assert!(validate_http_endpoint("E", "x:80").is_err());
        assert!(validate_range_f32("t", 0.5, 0.0, 1.0).is_ok());
        assert!(validate_range_f32("t", f32::NAN, 0.0, 1.0).is_err());
    }

    #[test]
    fn blank_input_is_rejected() {
        assert!(matches!(ensure_input(" \n\t"), Err(AiLlmError::EmptyInput)));
        assert!(ensure_input("timeout").is_ok());
    }
}
