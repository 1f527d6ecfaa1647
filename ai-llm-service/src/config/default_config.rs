//! Profile configs loaded from environment variables.
//!
//! # Embedding profile
//! - `EMBEDDING_PROVIDER` = `bedrock` (default), `ollama` or `openai`
//! - `EMBEDDING_MODEL` (required)
//! - `EMBEDDING_ENDPOINT` = base URL; defaults to the regional Bedrock runtime
//!   for `bedrock`, to `OLLAMA_URL`/`OLLAMA_PORT` for `ollama`
//! - `EMBEDDING_API_KEY` (optional, `openai` only)
//! - `AWS_REGION` / `AWS_DEFAULT_REGION` for `bedrock`
//!
//! # Generation profile
//! - `LLM_PROVIDER` = `openai` (default) or `ollama`
//! - `LLM_ENDPOINT`, or `LLM_HOST` + `LLM_PORT` → `http://{host}:{port}`
//! - `LLM_MODEL` (required)
//! - `LLM_API_KEY`, `LLM_MAX_TOKENS`, `LLM_TEMPERATURE`, `LLM_TIMEOUT_SECS`

use services::aws::DEFAULT_REGION;

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{
        AiLlmError, ConfigError, parse_opt, require, validate_http_endpoint, validate_range_f32,
    },
};

/// Default vector dimension (`cohere.embed-english-v3`).
pub const DEFAULT_EMBEDDING_DIM: usize = 1024;

const EMBEDDING_TIMEOUT_SECS: u64 = 30;
const GENERATION_TIMEOUT_SECS: u64 = 120;

/// Embedding profile from the process environment.
pub fn config_embedding() -> Result<LlmModelConfig, AiLlmError> {
    embedding_config_from(&|k| std::env::var(k).ok())
}

/// Generation profile from the process environment.
pub fn config_generation() -> Result<LlmModelConfig, AiLlmError> {
    generation_config_from(&|k| std::env::var(k).ok())
}

/// `EMBEDDING_DIM`, default 1024.
pub fn embedding_dim() -> Result<usize, AiLlmError> {
    embedding_dim_from(&|k| std::env::var(k).ok())
}

pub fn embedding_dim_from(get: &dyn Fn(&str) -> Option<String>) -> Result<usize, AiLlmError> {
    let dim = parse_opt::<usize>("EMBEDDING_DIM", get("EMBEDDING_DIM"), "expected usize")?
        .unwrap_or(DEFAULT_EMBEDDING_DIM);
    if dim == 0 {
        return Err(ConfigError::OutOfRange {
            field: "EMBEDDING_DIM",
            detail: "must be > 0",
        }
        .into());
    }
    Ok(dim)
}

/// Builds the embedding profile from an arbitrary variable lookup.
pub fn embedding_config_from(
    get: &dyn Fn(&str) -> Option<String>,
) -> Result<LlmModelConfig, AiLlmError> {
    let provider = match non_blank(get("EMBEDDING_PROVIDER")) {
        Some(p) => p.parse::<LlmProvider>()?,
        None => LlmProvider::Bedrock,
    };
    let model = require("EMBEDDING_MODEL", get("EMBEDDING_MODEL"))?;
    let region = region_from(get);

    let endpoint = match non_blank(get("EMBEDDING_ENDPOINT")) {
        Some(ep) => ep,
        None => match provider {
            LlmProvider::Bedrock => format!("https://bedrock-runtime.{region}.amazonaws.com"),
            LlmProvider::Ollama => ollama_endpoint(get)?,
            LlmProvider::OpenAI => {
                return Err(ConfigError::MissingVar("EMBEDDING_ENDPOINT").into());
            }
        },
    };
    validate_http_endpoint("EMBEDDING_ENDPOINT", &endpoint)?;

    Ok(LlmModelConfig {
        provider,
        model,
        endpoint,
        region: Some(region),
        api_key: non_blank(get("EMBEDDING_API_KEY")),
        max_tokens: None,
        temperature: None,
        top_p: None,
        timeout_secs: Some(EMBEDDING_TIMEOUT_SECS),
    })
}

/// Builds the generation profile from an arbitrary variable lookup.
pub fn generation_config_from(
    get: &dyn Fn(&str) -> Option<String>,
) -> Result<LlmModelConfig, AiLlmError> {
    let provider = match non_blank(get("LLM_PROVIDER")) {
        Some(p) => p.parse::<LlmProvider>()?,
        None => LlmProvider::OpenAI,
    };
    if provider == LlmProvider::Bedrock {
        return Err(ConfigError::UnsupportedProvider("bedrock (generation)".into()).into());
    }

    let endpoint = match non_blank(get("LLM_ENDPOINT")) {
        Some(ep) => ep,
        None => {
            let host = require("LLM_HOST", get("LLM_HOST"))?;
            let port = require("LLM_PORT", get("LLM_PORT"))?;
            port.parse::<u16>().map_err(|_| ConfigError::InvalidNumber {
                var: "LLM_PORT",
                reason: "expected u16 (1..=65535)",
            })?;
            format!("http://{host}:{port}")
        }
    };
    validate_http_endpoint("LLM_ENDPOINT", &endpoint)?;

    let model = require("LLM_MODEL", get("LLM_MODEL"))?;
    let temperature = parse_opt::<f32>("LLM_TEMPERATURE", get("LLM_TEMPERATURE"), "expected f32")?;
    if let Some(t) = temperature {
        validate_range_f32("LLM_TEMPERATURE", t, 0.0, 2.0)?;
    }
    let timeout_secs =
        parse_opt::<u64>("LLM_TIMEOUT_SECS", get("LLM_TIMEOUT_SECS"), "expected u64")?
            .unwrap_or(GENERATION_TIMEOUT_SECS);

    Ok(LlmModelConfig {
        provider,
        model,
        endpoint,
        region: None,
        api_key: non_blank(get("LLM_API_KEY")),
        max_tokens: parse_opt("LLM_MAX_TOKENS", get("LLM_MAX_TOKENS"), "expected u32")?,
        temperature,
        top_p: None,
        timeout_secs: Some(timeout_secs),
    })
}

/// `OLLAMA_URL`, else `OLLAMA_PORT` on localhost.
fn ollama_endpoint(get: &dyn Fn(&str) -> Option<String>) -> Result<String, AiLlmError> {
    if let Some(url) = non_blank(get("OLLAMA_URL")) {
        return Ok(url);
    }
    if let Some(port) = non_blank(get("OLLAMA_PORT")) {
        port.parse::<u16>().map_err(|_| ConfigError::InvalidNumber {
            var: "OLLAMA_PORT",
            reason: "expected u16 (1..=65535)",
        })?;
        return Ok(format!("http://localhost:{port}"));
    }
    Err(ConfigError::MissingVar("EMBEDDING_ENDPOINT, OLLAMA_URL or OLLAMA_PORT").into())
}

fn region_from(get: &dyn Fn(&str) -> Option<String>) -> String {
    non_blank(get("AWS_REGION"))
        .or_else(|| non_blank(get("AWS_DEFAULT_REGION")))
        .unwrap_or_else(|| DEFAULT_REGION.to_string())
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn embedding_defaults_to_regional_bedrock() {
        let env = lookup(&[
            ("EMBEDDING_MODEL", "cohere.embed-english-v3"),
            ("AWS_REGION", "eu-central-1"),
        ]);
        let cfg = embedding_config_from(&env).unwrap();
        assert_eq!(cfg.provider, LlmProvider::Bedrock);
        assert_eq!(cfg.endpoint, "https://bedrock-runtime.eu-central-1.amazonaws.com");
        assert_eq!(cfg.region.as_deref(), Some("eu-central-1"));
        assert_eq!(cfg.timeout_secs, Some(30));
    }

    #[test]
    fn embedding_model_is_required() {
        let err = embedding_config_from(&lookup(&[])).unwrap_err();
        assert!(matches!(
            err,
            AiLlmError::Config(ConfigError::MissingVar("EMBEDDING_MODEL"))
        ));
    }

    #[test]
    fn ollama_embedding_uses_port_fallback() {
        let env = lookup(&[
            ("EMBEDDING_PROVIDER", "ollama"),
            ("EMBEDDING_MODEL", "nomic-embed-text"),
            ("OLLAMA_PORT", "11434"),
        ]);
        let cfg = embedding_config_from(&env).unwrap();
        assert_eq!(cfg.endpoint, "http://localhost:11434");
    }

    #[test]
    fn generation_builds_endpoint_from_host_and_port() {
        let env = lookup(&[
            ("LLM_HOST", "vllm.default.svc"),
            ("LLM_PORT", "8000"),
            ("LLM_MODEL", "mistral-7b"),
            ("LLM_MAX_TOKENS", "512"),
        ]);
        let cfg = generation_config_from(&env).unwrap();
        assert_eq!(cfg.provider, LlmProvider::OpenAI);
        assert_eq!(cfg.endpoint, "http://vllm.default.svc:8000");
        assert_eq!(cfg.max_tokens, Some(512));
        assert_eq!(cfg.timeout_secs, Some(120));
    }

    #[test]
    fn generation_rejects_bad_port_and_bedrock() {
        let env = lookup(&[("LLM_HOST", "h"), ("LLM_PORT", "http"), ("LLM_MODEL", "m")]);
        assert!(generation_config_from(&env).is_err());

        let env = lookup(&[("LLM_PROVIDER", "bedrock"), ("LLM_ENDPOINT", "http://x")]);
        assert!(matches!(
            generation_config_from(&env),
            Err(AiLlmError::Config(ConfigError::UnsupportedProvider(_)))
        ));
    }

    #[test]
    fn dimension_defaults_and_rejects_zero() {
        assert_eq!(embedding_dim_from(&lookup(&[])).unwrap(), 1024);
        assert_eq!(embedding_dim_from(&lookup(&[("EMBEDDING_DIM", "384")])).unwrap(), 384);
        assert!(embedding_dim_from(&lookup(&[("EMBEDDING_DIM", "0")])).is_err());
    }
}
