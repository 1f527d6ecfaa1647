//! OpenAI-compatible client for chat completions and embeddings.
//!
//! Works against OpenAI itself and self-hosted compatible servers (vLLM,
//! llama.cpp server). Endpoints are derived from `LlmModelConfig::endpoint`:
//! - POST {endpoint}/v1/chat/completions — plain or SSE-streamed completion
//! - POST {endpoint}/v1/embeddings       — embeddings retrieval
//!
//! The API key is optional: self-hosted servers usually run without one.

use std::time::{Duration, Instant};

use futures::{StreamExt, TryStreamExt};
use reqwest::header;
use serde::{Deserialize, Serialize};
use services::{
    http_policy::{HttpPolicy, send_with_retry},
    sse::{SseEvent, sse_events},
};
use tracing::{debug, error, info};

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{
        AiLlmError, HttpError, Provider, ProviderError, ProviderErrorKind, ensure_input,
        make_snippet,
    },
    services::{Frame, TextStream, text_stream},
};

/// Thin client for an OpenAI-compatible API.
#[derive(Debug)]
pub struct OpenAiService {
    client: reqwest::Client,
    cfg: LlmModelConfig,
    policy: HttpPolicy,
    url_chat: String,
    url_embeddings: String,
}

impl OpenAiService {
    /// Validates the provider and endpoint scheme and builds an HTTP client
    /// with default headers and the configured timeout.
    ///
    /// # Errors
    /// - `InvalidProvider` if `cfg.provider` is not OpenAI
    /// - `InvalidEndpoint` if `cfg.endpoint` is invalid
    /// - `Decode` if the API key cannot be used as a header value
    pub fn new(cfg: LlmModelConfig) -> Result<Self, AiLlmError> {
        if cfg.provider != LlmProvider::OpenAI {
            return Err(
                ProviderError::new(Provider::OpenAI, ProviderErrorKind::InvalidProvider).into(),
            );
        }

        let base = cfg.base_url().to_string();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ProviderError::new(
                Provider::OpenAI,
                ProviderErrorKind::InvalidEndpoint(cfg.endpoint.clone()),
            )
            .into());
        }

        let timeout = cfg
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(60));
        let policy = HttpPolicy::default().with_read_timeout(timeout);

        let mut headers = header::HeaderMap::new();
        if let Some(key) = cfg.api_key.as_deref() {
            let value = header::HeaderValue::from_str(&format!("Bearer {key}")).map_err(|e| {
                ProviderError::new(
                    Provider::OpenAI,
                    ProviderErrorKind::Decode(format!("invalid API key header: {e}")),
                )
            })?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = policy.client_builder().default_headers(headers).build()?;

        info!(
            provider = %cfg.provider,
            model = %cfg.model,
            endpoint = %cfg.endpoint,
            timeout_secs = timeout.as_secs(),
            authenticated = cfg.api_key.is_some(),
            "OpenAiService initialized"
        );

        Ok(Self {
            client,
            policy,
            url_chat: format!("{base}/v1/chat/completions"),
            url_embeddings: format!("{base}/v1/embeddings"),
            cfg,
        })
    }

    /// Non-streaming chat completion.
    ///
    /// # Errors
    /// `HttpStatus` for non-2xx, `Decode` if the JSON cannot be parsed and
    /// `EmptyChoices` if no non-empty `choices[].message.content` exists.
    pub async fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String, AiLlmError> {
        let started = Instant::now();
        let body = ChatCompletionRequest::from_cfg(&self.cfg, prompt, system, false);

        debug!(
            model = %self.cfg.model,
            prompt_len = prompt.len(),
            has_system = system.is_some(),
            "POST {}", self.url_chat
        );
        let resp = self.post(&self.url_chat, &body, "openai.chat").await?;

        let out: ChatCompletionResponse = resp.json().await.map_err(|e| {
            error!(error = %e, model = %self.cfg.model, "failed to decode chat completion");
            ProviderError::new(
                Provider::OpenAI,
                ProviderErrorKind::Decode(format!(
                    "serde error: {e}; expected `choices[0].message.content`"
                )),
            )
        })?;

        let content = out
            .choices
            .into_iter()
            .filter_map(|c| c.message.content)
            .find(|c| !c.trim().is_empty())
            .ok_or_else(|| ProviderError::new(Provider::OpenAI, ProviderErrorKind::EmptyChoices))?;

        info!(
            model = %self.cfg.model,
            latency_ms = started.elapsed().as_millis(),
            "chat completion completed"
        );
        Ok(content)
    }

    /// Streaming chat completion (`"stream": true`).
    ///
    /// Yields `choices[0].delta.content` fragments and ends at `data: [DONE]`.
    pub async fn generate_stream(
        &self,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<TextStream, AiLlmError> {
        let body = ChatCompletionRequest::from_cfg(&self.cfg, prompt, system, true);
        debug!(model = %self.cfg.model, "POST {} (stream)", self.url_chat);
        let resp = self.post(&self.url_chat, &body, "openai.chat_stream").await?;

        let frames = sse_events(resp.bytes_stream()).map_err(AiLlmError::from);
        Ok(text_stream(Provider::OpenAI, frames.boxed(), parse_event))
    }

    /// Single embeddings vector via `/v1/embeddings`.
    pub async fn embeddings(&self, input: &str) -> Result<Vec<f32>, AiLlmError> {
        ensure_input(input)?;
        let started = Instant::now();
        let body = EmbeddingsRequest {
            model: &self.cfg.model,
            input,
        };

        let resp = self
            .post(&self.url_embeddings, &body, "openai.embeddings")
            .await?;

        let out: EmbeddingsResponse = resp.json().await.map_err(|e| {
            ProviderError::new(
                Provider::OpenAI,
                ProviderErrorKind::Decode(format!("serde error: {e}; expected `data[0].embedding`")),
            )
        })?;

        let first = out.data.into_iter().next().ok_or_else(|| {
            ProviderError::new(
                Provider::OpenAI,
                ProviderErrorKind::Decode("empty `data` in embeddings response".into()),
            )
        })?;
        if first.embedding.is_empty() {
            return Err(
                ProviderError::new(Provider::OpenAI, ProviderErrorKind::EmptyEmbedding).into(),
            );
        }

        info!(
            model = %self.cfg.model,
            latency_ms = started.elapsed().as_millis(),
            "embeddings completed"
        );
        Ok(first.embedding)
    }

    async fn post<B: Serialize + Sync>(
        &self,
        url: &str,
        body: &B,
        label: &str,
    ) -> Result<reqwest::Response, AiLlmError> {
        let started = Instant::now();
        let resp = send_with_retry(&self.policy, label, |_| async move {
            Ok::<_, AiLlmError>(self.client.post(url).json(body).send().await?)
        })
        .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            let snippet = make_snippet(&text);
            error!(
                %status,
                %url,
                %snippet,
                model = %self.cfg.model,
                latency_ms = started.elapsed().as_millis(),
                "OpenAI-compatible endpoint returned non-success status"
            );
            return Err(ProviderError::new(
                Provider::OpenAI,
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

fn parse_event(ev: SseEvent) -> Result<Frame, AiLlmError> {
    if ev.event.as_deref() == Some("error") {
        return Err(ProviderError::new(Provider::OpenAI, ProviderErrorKind::Stream(ev.data)).into());
    }
    if ev.is_done() {
        return Ok(Frame::Done);
    }
    let data = ev.data.trim();
    if data.is_empty() {
        return Ok(Frame::Skip);
    }

    let chunk: StreamChunk = serde_json::from_str(data).map_err(|e| {
        ProviderError::new(
            Provider::OpenAI,
            ProviderErrorKind::Decode(format!("bad stream chunk: {e}")),
        )
    })?;
    if let Some(err) = chunk.error {
        return Err(ProviderError::new(
            Provider::OpenAI,
            ProviderErrorKind::Stream(err.message.unwrap_or_else(|| "unknown error".into())),
        )
        .into());
    }

    let text = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta)
        .and_then(|d| d.content);
    Ok(match text {
        Some(t) => Frame::Text(t),
        None => Frame::Skip,
    })
}

/* ===========================================================================
HTTP payloads & options
======================================================================== */

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

impl<'a> ChatCompletionRequest<'a> {
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
            temperature: cfg.temperature,
            top_p: cfg.top_p,
            max_tokens: cfg.max_tokens,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageOut,
}

#[derive(Debug, Deserialize)]
struct ChatMessageOut {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}
