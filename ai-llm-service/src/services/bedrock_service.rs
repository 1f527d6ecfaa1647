//! Bedrock runtime client for text embeddings.
//!
//! `POST {endpoint}/model/{model}/invoke`, SigV4-signed for service
//! `bedrock` with credentials fetched on every call.
//!
//! Request/response shapes depend on the model family:
//! - Cohere (`cohere.embed-*`): `{"texts":[..],"input_type":"search_query"}`
//!   → `{"embeddings":[[..]]}`
//! - Titan (`amazon.titan-embed-*`): `{"inputText":..}` → `{"embedding":[..]}`

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use services::{
    aws::{CredentialsProvider, SigV4Signer, sigv4::uri_encode},
    http_policy::{HttpPolicy, send_with_retry},
};
use tracing::{debug, error, info};

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{
        AiLlmError, HttpError, Provider, ProviderError, ProviderErrorKind, ensure_input,
        make_snippet,
    },
};

/// Cohere `input_type` used for query-time embeddings.
pub const COHERE_INPUT_TYPE: &str = "search_query";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModelFamily {
    Cohere,
    Titan,
}

impl ModelFamily {
    fn of(model: &str) -> Self {
        if model.starts_with("amazon.titan-embed") {
            ModelFamily::Titan
        } else {
            ModelFamily::Cohere
        }
    }
}

/// Embedding client for Bedrock `InvokeModel`.
pub struct BedrockService {
    client: reqwest::Client,
    cfg: LlmModelConfig,
    signer: SigV4Signer,
    policy: HttpPolicy,
    url_invoke: String,
    family: ModelFamily,
}

impl BedrockService {
    /// Builds the client; credentials are resolved per call through `credentials`.
    ///
    /// # Errors
    /// - `InvalidProvider` if `cfg.provider` is not Bedrock
    /// - `InvalidEndpoint` if `cfg.endpoint` has no http(s) scheme
    pub fn new(
        cfg: LlmModelConfig,
        credentials: Arc<dyn CredentialsProvider>,
    ) -> Result<Self, AiLlmError> {
        if cfg.provider != LlmProvider::Bedrock {
            return Err(
                ProviderError::new(Provider::Bedrock, ProviderErrorKind::InvalidProvider).into(),
            );
        }
        let base = cfg.base_url();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ProviderError::new(
                Provider::Bedrock,
                ProviderErrorKind::InvalidEndpoint(cfg.endpoint.clone()),
            )
            .into());
        }

        let region = cfg
            .region
            .clone()
            .unwrap_or_else(services::aws::region_from_env);
        let mut policy = HttpPolicy::default();
        if let Some(secs) = cfg.timeout_secs {
            policy = policy.with_read_timeout(Duration::from_secs(secs));
        }

        let url_invoke = format!(
            "{base}/model/{}/invoke",
            uri_encode(cfg.model.as_bytes())
        );
        let family = ModelFamily::of(&cfg.model);

        info!(
            model = %cfg.model,
            endpoint = %cfg.endpoint,
            region = %region,
            "BedrockService initialized"
        );

        Ok(Self {
            client: policy.build_client()?,
            signer: SigV4Signer::new(region, "bedrock", credentials),
            policy,
            url_invoke,
            family,
            cfg,
        })
    }

    /// Embeds a single non-empty text.
    ///
    /// # Errors
    /// - [`AiLlmError::EmptyInput`] before any network call
    /// - `HttpStatus` for non-2xx (after the retry budget for 429/5xx)
    /// - `Decode` / `EmptyEmbedding` when the vector is missing
    pub async fn embeddings(&self, input: &str) -> Result<Vec<f32>, AiLlmError> {
        ensure_input(input)?;
        let started = Instant::now();
        let body = match self.family {
            ModelFamily::Cohere => serde_json::to_vec(&CohereRequest {
                texts: [input],
                input_type: COHERE_INPUT_TYPE,
            }),
            ModelFamily::Titan => serde_json::to_vec(&TitanRequest { input_text: input }),
        }
        .map_err(|e| {
            ProviderError::new(Provider::Bedrock, ProviderErrorKind::Decode(e.to_string()))
        })?;

        debug!(model = %self.cfg.model, input_len = input.len(), "POST {}", self.url_invoke);

        let resp = send_with_retry(&self.policy, "bedrock.invoke_model", |_| {
            let body = body.clone();
            async move {
                let mut req = self
                    .client
                    .post(&self.url_invoke)
                    .header(CONTENT_TYPE, "application/json")
                    .header(ACCEPT, "application/json")
                    .body(body)
                    .build()?;
                self.signer.sign(&mut req).await?;
                Ok::<_, AiLlmError>(self.client.execute(req).await?)
            }
        })
        .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let url = self.url_invoke.clone();
            let text = resp.text().await.unwrap_or_default();
            let snippet = make_snippet(&text);
            error!(
                %status,
                %url,
                %snippet,
                model = %self.cfg.model,
                latency_ms = started.elapsed().as_millis(),
                "Bedrock InvokeModel returned non-success status"
            );
            return Err(ProviderError::new(
                Provider::Bedrock,
                ProviderErrorKind::HttpStatus(HttpError {
                    status,
                    url,
                    snippet,
                }),
            )
            .into());
        }

        let bytes = resp.bytes().await?;
        let vector = self.decode(&bytes)?;

        info!(
            model = %self.cfg.model,
            dim = vector.len(),
            latency_ms = started.elapsed().as_millis(),
            "embeddings completed"
        );
        Ok(vector)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<f32>, AiLlmError> {
        let decode_err = |msg: String| ProviderError::new(Provider::Bedrock, ProviderErrorKind::Decode(msg));
        let vector = match self.family {
            ModelFamily::Cohere => {
                let out: CohereResponse = serde_json::from_slice(bytes).map_err(|e| {
                    decode_err(format!("serde error: {e}; expected `embeddings[0]`"))
                })?;
                out.embeddings
                    .into_iter()
                    .next()
                    .ok_or_else(|| decode_err("empty `embeddings` array".into()))?
            }
            ModelFamily::Titan => {
                let out: TitanResponse = serde_json::from_slice(bytes).map_err(|e| {
                    decode_err(format!("serde error: {e}; expected `embedding`"))
                })?;
                out.embedding
            }
        };
        if vector.is_empty() {
            return Err(
                ProviderError::new(Provider::Bedrock, ProviderErrorKind::EmptyEmbedding).into(),
            );
        }
        Ok(vector)
    }
}

#[derive(Serialize)]
struct CohereRequest<'a> {
    texts: [&'a str; 1],
    input_type: &'a str,
}

#[derive(Deserialize)]
struct CohereResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TitanRequest<'a> {
    input_text: &'a str,
}

#[derive(Deserialize)]
struct TitanResponse {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use services::aws::{Credentials, StaticCredentialsProvider};
    use wiremock::matchers::{body_json, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(endpoint: &str, model: &str) -> BedrockService {
        let cfg = LlmModelConfig {
            provider: LlmProvider::Bedrock,
            model: model.into(),
            endpoint: endpoint.into(),
            region: Some("us-west-2".into()),
            api_key: None,
            max_tokens: None,
            temperature: None,
            top_p: None,
            timeout_secs: Some(5),
        };
        let creds = Arc::new(StaticCredentialsProvider(
            Credentials::new("AKID", "SECRET").with_session_token("TOKEN"),
        ));
        BedrockService::new(cfg, creds).unwrap()
    }

    #[tokio::test]
    async fn cohere_request_is_signed_and_first_vector_returned() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/model/cohere.embed-english-v3/invoke"))
            .and(header_exists("authorization"))
            .and(header_exists("x-amz-security-token"))
            .and(body_json(serde_json::json!({
                "texts": ["payment failed"],
                "input_type": "search_query"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embeddings": [[0.1, 0.2, 0.3]],
                "id": "x"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let svc = service(&server.uri(), "cohere.embed-english-v3");
        let v = svc.embeddings("payment failed").await.unwrap();
        assert_eq!(v, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn titan_shape_is_supported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(serde_json::json!({ "inputText": "hi" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "embedding": [1.0, 2.0] })),
            )
            .mount(&server)
            .await;

        let svc = service(&server.uri(), "amazon.titan-embed-text-v2:0");
        assert_eq!(svc.embeddings("hi").await.unwrap(), vec![1.0, 2.0]);
    }

    #[tokio::test]
    async fn empty_input_makes_no_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let svc = service(&server.uri(), "cohere.embed-english-v3");
        assert!(matches!(svc.embeddings("   ").await, Err(AiLlmError::EmptyInput)));
    }

    #[tokio::test]
    async fn access_denied_maps_to_http_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("{\"message\":\"denied\"}"))
            .expect(1)
            .mount(&server)
            .await;

        let svc = service(&server.uri(), "cohere.embed-english-v3");
        match svc.embeddings("q").await {
            Err(AiLlmError::Provider(p)) => assert_eq!(p.status().map(|s| s.as_u16()), Some(403)),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_vector_field_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "embeddings": [] })))
            .mount(&server)
            .await;

        let svc = service(&server.uri(), "cohere.embed-english-v3");
        assert!(matches!(
            svc.embeddings("q").await,
            Err(AiLlmError::Provider(ProviderError { kind: ProviderErrorKind::Decode(_), .. }))
        ));
    }

    #[test]
    fn model_id_is_escaped_in_path() {
        let svc = service("https://bedrock-runtime.us-west-2.amazonaws.com", "amazon.titan-embed-text-v2:0");
        assert!(svc.url_invoke.ends_with("/model/amazon.titan-embed-text-v2%3A0/invoke"));
    }
}
