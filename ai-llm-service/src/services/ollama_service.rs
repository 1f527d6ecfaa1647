//! Lightweight Ollama client for chat and embeddings.
//!
//! - `POST {endpoint}/api/chat`       — chat completion, plain or NDJSON stream
//! - `POST {endpoint}/api/embeddings` — single embedding vector
//!
//! # Examples
//!
//! ```no_run
//! use ai_llm_service::{LlmModelConfig, LlmProvider};
//! use ai_llm_service::services::ollama_service::OllamaService;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = LlmModelConfig {
//!     provider: LlmProvider::Ollama,
//!     model: "llama3.1:8b".into(),
//!     endpoint: "http://localhost:11434".into(),
//!     region: None,
//!     api_key: None,
//!     max_tokens: Some(256),
//!     temperature: Some(0.2),
//!     top_p: None,
//!     timeout_secs: Some(120),
//! };
//!
//! let svc = OllamaService::new(cfg)?;
//! let text = svc.chat("List the timeout errors.", Some("Be brief.")).await?;
//! println!("{text}");
//! # Ok(()) }
//! ```

use std::time::{Duration, Instant};

use futures::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use services::{
    http_policy::{HttpPolicy, send_with_retry},
    sse::ndjson_lines,
};
use tracing::{debug, error, info, instrument};

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{
        AiLlmError, HttpError, Provider, ProviderError, ProviderErrorKind, ensure_input,
        make_snippet,
    },
    services::{Frame, TextStream, text_stream},
};

/// Thin client for Ollama.
pub struct OllamaService {
    client: reqwest::Client,
    cfg: LlmModelConfig,
    policy: HttpPolicy,
    url_chat: String,
    url_embeddings: String,
}

impl OllamaService {
    /// # Errors
    /// - `InvalidProvider` if `cfg.provider` is not Ollama
    /// - `InvalidEndpoint` if `cfg.endpoint` is empty or lacks http(s)
    pub fn new(cfg: LlmModelConfig) -> Result<Self, AiLlmError> {
        if cfg.provider != LlmProvider::Ollama {
            return Err(
                ProviderError::new(Provider::Ollama, ProviderErrorKind::InvalidProvider).into(),
            );
        }

        let base = cfg.base_url().to_string();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ProviderError::new(
                Provider::Ollama,
                ProviderErrorKind::InvalidEndpoint(cfg.endpoint.clone()),
            )
            .into());
        }

        let timeout = cfg
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(60));
        let policy = HttpPolicy::default().with_read_timeout(timeout);

        Ok(Self {
            client: policy.build_client()?,
            url_chat: format!("{base}/api/chat"),
            url_embeddings: format!("{base}/api/embeddings"),
            policy,
            cfg,
        })
    }

    /// Non-streaming chat via `/api/chat`.
    ///
    /// # Errors
    /// `HttpStatus` for non-2xx, `Decode` for unexpected JSON and
    /// `EmptyChoices` when the reply carries no text.
    #[instrument(skip_all, fields(model = %self.cfg.model))]
    pub async fn chat(&self, prompt: &str, system: Option<&str>) -> Result<String, AiLlmError> {
        let started = Instant::now();
        let body = ChatRequest::from_cfg(&self.cfg, prompt, system, false);
        let resp = self.post(&self.url_chat, &body, "ollama.chat").await?;

        let out: ChatChunk = resp.json().await.map_err(|e| {
            ProviderError::new(
                Provider::Ollama,
                ProviderErrorKind::Decode(format!("serde error: {e}; expected `message.content`")),
            )
        })?;

        let content = out
            .message
            .map(|m| m.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ProviderError::new(Provider::Ollama, ProviderErrorKind::EmptyChoices))?;

        info!(latency_ms = started.elapsed().as_millis(), "chat completed");
        Ok(content)
    }

    /// Streaming chat via `/api/chat` with `stream=true`.
    ///
    /// Each NDJSON line carries `message.content`; the line with
    /// `"done": true` ends the stream.
    #[instrument(skip_all, fields(model = %self.cfg.model))]
    pub async fn chat_stream(
        &self,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<TextStream, AiLlmError> {
        let body = ChatRequest::from_cfg(&self.cfg, prompt, system, true);
        let resp = self.post(&self.url_chat, &body, "ollama.chat_stream").await?;

        let lines = ndjson_lines(resp.bytes_stream()).map_err(AiLlmError::from);
        Ok(text_stream(Provider::Ollama, lines.boxed(), parse_chat_line))
    }

    /// Single embedding via `/api/embeddings`.
    #[instrument(skip_all, fields(model = %self.cfg.model))]
    pub async fn embeddings(&self, input: &str) -> Result<Vec<f32>, AiLlmError> {
        ensure_input(input)?;
        let body = EmbeddingsRequest {
            model: &self.cfg.model,
            prompt: input,
        };
        let resp = self
            .post(&self.url_embeddings, &body, "ollama.embeddings")
            .await?;

        let out: EmbeddingsResponse = resp.json().await.map_err(|e| {
            ProviderError::new(
                Provider::Ollama,
                ProviderErrorKind::Decode(format!(
                    "serde error: {e}; expected `{{ embedding: number[] }}`"
                )),
            )
        })?;
        if out.embedding.is_empty() {
            return Err(
                ProviderError::new(Provider::Ollama, ProviderErrorKind::EmptyEmbedding).into(),
            );
        }
        Ok(out.embedding)
    }

    /// POSTs JSON with the retry policy and maps non-2xx to `HttpStatus`.
    async fn post<B: Serialize + Sync>(
        &self,
        url: &str,
        body: &B,
        label: &str,
    ) -> Result<reqwest::Response, AiLlmError> {
        debug!("POST {url}");
        let resp = send_with_retry(&self.policy, label, |_| async move {
            Ok::<_, AiLlmError>(self.client.post(url).json(body).send().await?)
        })
        .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            let snippet = make_snippet(&text);
            error!(%status, %url, %snippet, "Ollama returned non-success status");
            return Err(ProviderError::new(
                Provider::Ollama,
                ProviderErrorKind::HttpStatus(HttpError {
                    status,
                    url: url.to_string(),
                    snippet,
                }),
            )
            .into());
        }
        Ok(resp)
    }
}

fn parse_chat_line(line: String) -> Result<Frame, AiLlmError> {
    let chunk: ChatChunk = serde_json::from_str(&line).map_err(|e| {
        ProviderError::new(
            Provider::Ollama,
            ProviderErrorKind::Decode(format!("bad stream line: {e}")),
        )
    })?;
    if let Some(err) = chunk.error {
        return Err(ProviderError::new(Provider::Ollama, ProviderErrorKind::Stream(err)).into());
    }
    let text = chunk.message.map(|m| m.content).unwrap_or_default();
    if chunk.done {
        // The final line may still carry a tail fragment.
        return Ok(Frame::Last(text));
    }
    Ok(Frame::Text(text))
}

/* ==========================
HTTP payloads & options
========================== */

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
}

impl<'a> ChatRequest<'a> {
    fn from_cfg(
        cfg: &'a LlmModelConfig,
        prompt: &'a str,
        system: Option<&'a str>,
        stream: bool,
    ) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(sys) = system {
            messages.push(ChatMessage {
                role: "system",
                content: sys,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        Self {
            model: &cfg.model,
            messages,
            stream,
            options: Some(ChatOptions {
                temperature: cfg.temperature,
                top_p: cfg.top_p,
                num_predict: cfg.max_tokens,
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Subset of Ollama `options`.
#[derive(Debug, Default, Serialize)]
struct ChatOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Both the plain reply and each stream line.
#[derive(Debug, Deserialize)]
struct ChatChunk {
    message: Option<ChatMessageOut>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessageOut {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(endpoint: &str) -> OllamaService {
        OllamaService::new(LlmModelConfig {
            provider: LlmProvider::Ollama,
            model: "llama3".into(),
            endpoint: endpoint.into(),
            region: None,
            api_key: None,
            max_tokens: None,
            temperature: None,
            top_p: None,
            timeout_secs: Some(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn streams_ndjson_until_done() {
        let server = MockServer::start().await;
        let body = concat!(
            "{\"message\":{\"role\":\"assistant\",\"content\":\"Two \"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"errors.\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true}\n",
        );
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({ "stream": true })))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let stream = service(&server.uri()).chat_stream("q", None).await.unwrap();
        let parts: Vec<String> = stream.try_collect().await.unwrap();
        assert_eq!(parts.concat(), "Two errors.");
    }

    #[tokio::test]
    async fn plain_chat_returns_message_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": { "role": "assistant", "content": "answer" },
                "done": true
            })))
            .mount(&server)
            .await;

        let out = service(&server.uri()).chat("q", Some("sys")).await.unwrap();
        assert_eq!(out, "answer");
    }

    #[tokio::test]
    async fn embeddings_send_prompt_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .and(body_partial_json(serde_json::json!({ "model": "llama3", "prompt": "x" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "embedding": [0.5] })),
            )
            .mount(&server)
            .await;

        assert_eq!(service(&server.uri()).embeddings("x").await.unwrap(), vec![0.5]);
    }
}
