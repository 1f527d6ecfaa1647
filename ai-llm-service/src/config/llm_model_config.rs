use crate::config::llm_provider::LlmProvider;

/// Settings for one model profile.
///
/// # Examples
///
/// ```
/// use ai_llm_service::{LlmModelConfig, LlmProvider};
///
/// let cfg = LlmModelConfig {
///     provider: LlmProvider::Bedrock,
///     model: "cohere.embed-english-v3".to_string(),
///     endpoint: "https://bedrock-runtime.us-west-2.amazonaws.com".to_string(),
///     region: Some("us-west-2".to_string()),
///     api_key: None,
///     max_tokens: None,
///     temperature: None,
///     top_p: None,
///     timeout_secs: Some(30),
/// };
/// assert_eq!(cfg.base_url(), "https://bedrock-runtime.us-west-2.amazonaws.com");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LlmModelConfig {
    /// Backend serving this profile.
    pub provider: LlmProvider,

    /// Model identifier (`cohere.embed-english-v3`, `llama3.1:8b`, ...).
    pub model: String,

    /// Base URL of the inference API, without a trailing path.
    pub endpoint: String,

    /// AWS region for signed providers.
    pub region: Option<String>,

    /// Bearer token for OpenAI-compatible servers that require one.
    pub api_key: Option<String>,

    /// Upper bound on generated tokens.
    pub max_tokens: Option<u32>,

    pub temperature: Option<f32>,

    pub top_p: Option<f32>,

    /// Longest wait for any single read (headers or a body chunk), in seconds.
    /// A streamed answer may take longer overall.
    pub timeout_secs: Option<u64>,
}

impl LlmModelConfig {
    /// Endpoint with any trailing slash removed.
    pub fn base_url(&self) -> &str {
        self.endpoint.trim().trim_end_matches('/')
    }
}
