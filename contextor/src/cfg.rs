//! Runtime configuration loaded from environment variables.

use ai_llm_service::{
    AiLlmError,
    error_handler::{ConfigError, parse_opt},
};
use tracing::warn;

pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_CONTEXT_DOCS: usize = 3;
pub const DEFAULT_MAX_CTX_CHARS: usize = 8000;
pub const DEFAULT_MAX_TOP_K: usize = 50;

/// Orchestrator knobs. All fields have defaults via `from_env`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextorConfig {
    /// Neighbours fetched from the index (`RAG_TOP_K`).
    pub top_k: usize,
    /// Ceiling for a per-request `k` (`RAG_MAX_TOP_K`).
    pub max_top_k: usize,
    /// Hits returned to the caller as `similar_documents` (`RAG_CONTEXT_DOCS`).
    pub context_docs: usize,
    /// Forward context to the LLM (`RAG_GENERATION`); off yields a digest.
    pub generation: bool,
    /// Character budget of the context block (`RAG_MAX_CTX_CHARS`).
    pub max_ctx_chars: usize,
}

impl Default for ContextorConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            max_top_k: DEFAULT_MAX_TOP_K,
            context_docs: DEFAULT_CONTEXT_DOCS,
            generation: true,
            max_ctx_chars: DEFAULT_MAX_CTX_CHARS,
        }
    }
}

impl ContextorConfig {
    pub fn from_env() -> Result<Self, AiLlmError> {
        Self::from_lookup(&|k| std::env::var(k).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup(get: &dyn Fn(&str) -> Option<String>) -> Result<Self, AiLlmError> {
        let d = Self::default();
        let cfg = Self {
            top_k: parse_opt("RAG_TOP_K", get("RAG_TOP_K"), "expected positive integer")?
                .unwrap_or(d.top_k),
            max_top_k: parse_opt("RAG_MAX_TOP_K", get("RAG_MAX_TOP_K"), "expected positive integer")?
                .unwrap_or(d.max_top_k),
            context_docs: parse_opt("RAG_CONTEXT_DOCS", get("RAG_CONTEXT_DOCS"), "expected integer")?
                .unwrap_or(d.context_docs),
            generation: match get("RAG_GENERATION") {
                Some(v) if !v.trim().is_empty() => parse_bool("RAG_GENERATION", &v)?,
                _ => d.generation,
            },
            max_ctx_chars: parse_opt("RAG_MAX_CTX_CHARS", get("RAG_MAX_CTX_CHARS"), "expected integer")?
                .unwrap_or(d.max_ctx_chars),
        };
        if cfg.top_k == 0 {
            return Err(ConfigError::OutOfRange {
                field: "RAG_TOP_K",
                detail: "must be at least 1",
            }
            .into());
        }
        if cfg.max_top_k < cfg.top_k {
            return Err(ConfigError::OutOfRange {
                field: "RAG_MAX_TOP_K",
                detail: "must not be below RAG_TOP_K",
            }
            .into());
        }
        Ok(cfg)
    }

    /// `requested` when given and non-zero, the configured default otherwise;
    /// never above `max_top_k`.
    pub fn effective_k(&self, requested: Option<usize>) -> usize {
        let k = requested.filter(|k| *k > 0).unwrap_or(self.top_k);
        if k > self.max_top_k {
            warn!(requested = k, max = self.max_top_k, "k clamped");
        }
        k.min(self.max_top_k)
    }
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, AiLlmError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFormat {
            var,
            reason: "expected true or false",
        }
        .into()),
    }
}
