//! Health probes for model backends.
//!
//! - Ollama: `GET {endpoint}/api/tags`, model looked up in `models[].name`
//! - OpenAI-compatible: `GET {endpoint}/v1/models`, model looked up in `data[].id`
//! - Bedrock: not probed. The runtime has no read-only endpoint and every
//!   `InvokeModel` is billed, so the status reports the probe as skipped.
//!
//! [`HealthService::check`] never fails; errors become `ok=false`.

use std::time::{Duration, Instant};

use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::llm_model_config::LlmModelConfig;
use crate::config::llm_provider::LlmProvider;
use crate::error_handler::{AiLlmError, HealthError, HttpError, make_snippet};

const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 10;

/// Serializable health snapshot for one profile.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// Backend name (`bedrock`, `ollama`, `openai`).
    pub provider: String,
    pub endpoint: String,
    pub model: Option<String>,
    pub ok: bool,
    /// Latency of the probe request; 0 when nothing was sent.
    pub latency_ms: u128,
    pub message: String,
}

impl HealthStatus {
    fn new(cfg: &LlmModelConfig, ok: bool, latency_ms: u128, message: impl Into<String>) -> Self {
        Self {
            provider: cfg.provider.to_string(),
            endpoint: cfg.endpoint.trim().to_string(),
            model: Some(cfg.model.clone()),
            ok,
            latency_ms,
            message: message.into(),
        }
    }
}

/// Health checker reusing a single HTTP client.
pub struct HealthService {
    client: reqwest::Client,
    default_timeout: Duration,
}

impl HealthService {
    /// Creates a health service with an optional probe timeout (seconds, default 10).
    pub fn new(timeout_secs: Option<u64>) -> Result<Self, AiLlmError> {
        let timeout = Duration::from_secs(timeout_secs.unwrap_or(DEFAULT_PROBE_TIMEOUT_SECS));
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        debug!(timeout_secs = timeout.as_secs(), "HealthService initialized");
        Ok(Self {
            client,
            default_timeout: timeout,
        })
    }

    /// Checks one profile. Never returns an error.
    pub async fn check(&self, cfg: &LlmModelConfig) -> HealthStatus {
        let endpoint = cfg.endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            warn!(provider = %cfg.provider, endpoint = %cfg.endpoint, "invalid endpoint");
            return HealthStatus::new(cfg, false, 0, "endpoint is empty or missing http/https");
        }

        let started = Instant::now();
        let result = match cfg.provider {
            LlmProvider::Bedrock => Ok(HealthStatus::new(
                cfg,
                true,
                0,
                "probe skipped; Bedrock is checked on first use",
            )),
            LlmProvider::Ollama => self.probe_ollama(cfg).await,
            LlmProvider::OpenAI => self.probe_openai(cfg).await,
        };

        match result {
            Ok(status) => {
                info!(
                    provider = %status.provider,
                    model = %cfg.model,
                    ok = status.ok,
                    latency_ms = status.latency_ms,
                    "health probe completed"
                );
                status
            }
            Err(err) => {
                let status =
                    HealthStatus::new(cfg, false, started.elapsed().as_millis(), err.to_string());
                warn!(
                    provider = %status.provider,
                    endpoint = %status.endpoint,
                    message = %status.message,
                    "health probe failed"
                );
                status
            }
        }
    }

    /// Checks several profiles sequentially.
    pub async fn check_many(&self, configs: &[LlmModelConfig]) -> Vec<HealthStatus> {
        let mut out = Vec::with_capacity(configs.len());
        for cfg in configs {
            out.push(self.check(cfg).await);
        }
        out
    }

    async fn probe_ollama(&self, cfg: &LlmModelConfig) -> Result<HealthStatus, AiLlmError> {
        #[derive(Deserialize)]
        struct Tag {
            name: String,
        }
        #[derive(Deserialize)]
        struct Tags {
            models: Option<Vec<Tag>>,
        }

        let url = format!("{}/api/tags", cfg.base_url());
        let (resp, latency) = self.get(&url, None, cfg).await?;
        Ok(match resp.json::<Tags>().await {
            Ok(Tags { models: Some(models) }) => {
                model_status(cfg, latency, models.iter().any(|m| m.name == cfg.model))
            }
            Ok(Tags { models: None }) => {
                HealthStatus::new(cfg, true, latency, "reachable; tags without `models` field")
            }
            Err(e) => HealthStatus::new(cfg, true, latency, format!("reachable; bad tags: {e}")),
        })
    }

    async fn probe_openai(&self, cfg: &LlmModelConfig) -> Result<HealthStatus, AiLlmError> {
        #[derive(Deserialize)]
        struct ModelItem {
            id: String,
        }
        #[derive(Deserialize)]
        struct Models {
            data: Vec<ModelItem>,
        }

        let url = format!("{}/v1/models", cfg.base_url());
        let (resp, latency) = self.get(&url, cfg.api_key.as_deref(), cfg).await?;
        Ok(match resp.json::<Models>().await {
            Ok(models) => model_status(cfg, latency, models.data.iter().any(|m| m.id == cfg.model)),
            Err(e) => HealthStatus::new(cfg, true, latency, format!("reachable; bad model list: {e}")),
        })
    }

    /// GET with optional Bearer auth; non-2xx becomes [`HealthError::HttpStatus`].
    async fn get(
        &self,
        url: &str,
        bearer: Option<&str>,
        cfg: &LlmModelConfig,
    ) -> Result<(reqwest::Response, u128), AiLlmError> {
        debug!(provider = %cfg.provider, "GET {url}");
        let mut req = self.client.get(url).timeout(self.probe_timeout(cfg));
        if let Some(key) = bearer {
            let auth = header::HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| HealthError::Decode(format!("invalid API key header: {e}")))?;
            req = req.header(header::AUTHORIZATION, auth);
        }

        let started = Instant::now();
        let resp = req.send().await?;
        let latency = started.elapsed().as_millis();

        if !resp.status().is_success() {
            let status = resp.status();
            let snippet = make_snippet(&resp.text().await.unwrap_or_default());
            return Err(HealthError::HttpStatus(HttpError {
                status,
                url: url.to_string(),
                snippet,
            })
            .into());
        }
        Ok((resp, latency))
    }

    /// Probes never wait longer than the service default.
    fn probe_timeout(&self, cfg: &LlmModelConfig) -> Duration {
        cfg.timeout_secs
            .map(Duration::from_secs)
            .map_or(self.default_timeout, |t| t.min(self.default_timeout))
    }
}

fn model_status(cfg: &LlmModelConfig, latency: u128, found: bool) -> HealthStatus {
    if found {
        HealthStatus::new(cfg, true, latency, "healthy; model is available")
    } else {
        HealthStatus::new(cfg, false, latency, "server is up, but model is not listed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cfg(provider: LlmProvider, endpoint: &str, api_key: Option<&str>) -> LlmModelConfig {
        LlmModelConfig {
            provider,
            model: "mistral".into(),
            endpoint: endpoint.into(),
            region: None,
            api_key: api_key.map(str::to_string),
            max_tokens: None,
            temperature: None,
            top_p: None,
            timeout_secs: Some(5),
        }
    }

    #[tokio::test]
    async fn openai_probe_sends_bearer_and_finds_model() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .and(header("authorization", "Bearer k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{ "id": "mistral" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let svc = HealthService::new(Some(5)).unwrap();
        let st = svc.check(&cfg(LlmProvider::OpenAI, &server.uri(), Some("k"))).await;
        assert!(st.ok, "{}", st.message);
        assert_eq!(st.provider, "openai");
    }

    #[tokio::test]
    async fn ollama_missing_model_is_not_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "models": [{ "name": "llama3" }]
            })))
            .mount(&server)
            .await;

        let svc = HealthService::new(None).unwrap();
        let st = svc.check(&cfg(LlmProvider::Ollama, &server.uri(), None)).await;
        assert!(!st.ok);
    }

    #[tokio::test]
    async fn server_error_becomes_failed_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let svc = HealthService::new(None).unwrap();
        let st = svc.check(&cfg(LlmProvider::OpenAI, &server.uri(), None)).await;
        assert!(!st.ok);
        assert!(st.message.contains("500"), "{}", st.message);
    }

    #[tokio::test]
    async fn bedrock_is_skipped_and_bad_endpoint_fails() {
        let svc = HealthService::new(None).unwrap();
        let st = svc
            .check(&cfg(LlmProvider::Bedrock, "https://bedrock-runtime.us-west-2.amazonaws.com", None))
            .await;
        assert!(st.ok);
        assert_eq!(st.latency_ms, 0);

        let st = svc.check(&cfg(LlmProvider::Ollama, "localhost:11434", None)).await;
        assert!(!st.ok);
    }
}
