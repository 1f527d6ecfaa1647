use std::{fmt, str::FromStr};

use crate::error_handler::ConfigError;

/// Backend used for a model profile.
///
/// Bedrock is embedding-only here; generation goes to an OpenAI-compatible
/// server or Ollama.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LlmProvider {
    /// AWS Bedrock runtime (`InvokeModel`), SigV4-signed.
    Bedrock,
    /// Local or in-cluster Ollama runtime.
    Ollama,
    /// OpenAI or any compatible server (vLLM, llama.cpp server, ...).
    OpenAI,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::Bedrock => "bedrock",
            LlmProvider::Ollama => "ollama",
            LlmProvider::OpenAI => "openai",
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bedrock" => Ok(LlmProvider::Bedrock),
            "ollama" => Ok(LlmProvider::Ollama),
            "openai" | "vllm" => Ok(LlmProvider::OpenAI),
            other => Err(ConfigError::UnsupportedProvider(other.to_string())),
        }
    }
}
