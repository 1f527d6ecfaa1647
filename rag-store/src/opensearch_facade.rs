//! Thin adapter around the OpenSearch Serverless data plane.
//!
//! All index interactions go through this facade: k-NN search, document
//! indexing, index creation and counting. Every request is SigV4-signed for
//! service `aoss` with credentials fetched at signing time.

use std::sync::Arc;

use reqwest::{
    Method, StatusCode,
    header::{ACCEPT, CONTENT_TYPE},
};
use serde::Deserialize;
use serde_json::{Value, json};
use services::{
    aws::{CredentialsProvider, SigV4Signer},
    errors::make_snippet,
    http_policy::{HttpPolicy, send_with_retry},
};
use tracing::{debug, info, warn};

use crate::config::{RagConfig, VectorSpace};
use crate::errors::RagError;
use crate::record::{EMBEDDING_FIELD, LogDocument, SEARCH_PROJECTION, SearchHit, rank_hits};

/// Facade over one index of one collection.
pub struct OpenSearchFacade {
    client: reqwest::Client,
    signer: SigV4Signer,
    policy: HttpPolicy,
    endpoint: String,
    index: String,
    space: VectorSpace,
}

impl OpenSearchFacade {
    /// Creates a facade for `cfg.index` on an already resolved `endpoint`.
    pub fn new(
        cfg: &RagConfig,
        endpoint: impl Into<String>,
        credentials: Arc<dyn CredentialsProvider>,
    ) -> Result<Self, RagError> {
        cfg.validate()?;
        let policy = HttpPolicy::default().with_max_attempts(3);
        let endpoint = crate::config::normalize_endpoint(&endpoint.into());
        info!(endpoint = %endpoint, index = %cfg.index, "OpenSearch facade ready");
        Ok(Self {
            client: policy.build_client()?,
            signer: SigV4Signer::new(cfg.region.clone(), "aoss", credentials)
                .with_content_sha256_header(true),
            policy,
            endpoint,
            index: cfg.index.clone(),
            space: cfg.space,
        })
    }

    /// Replaces the retry and timeout policy.
    pub fn with_policy(mut self, policy: HttpPolicy) -> Result<Self, RagError> {
        self.client = policy.build_client()?;
        self.policy = policy;
        Ok(self)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn space(&self) -> VectorSpace {
        self.space
    }

    /// k-nearest-neighbour search on [`EMBEDDING_FIELD`].
    ///
    /// Returns at most `k` projected hits sorted by descending score.
    ///
    /// # Errors
    /// - [`RagError::InvalidQuery`] for `k == 0` (no request is sent)
    /// - [`RagError::VectorSizeMismatch`] when `vector` does not fit the index
    /// - `NotFound`, `Auth`, `InvalidQuery`, `Http`, `Transport` from the backend
    pub async fn search_knn(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>, RagError> {
        if k == 0 {
            return Err(RagError::InvalidQuery("k must be >= 1".into()));
        }
        self.check_dim(vector.len())?;

        let body = json!({
            "size": k,
            "_source": SEARCH_PROJECTION,
            "query": { "knn": { EMBEDDING_FIELD: { "vector": vector, "k": k } } }
        });
        let url = format!("{}/{}/_search", self.endpoint, self.index);
        let resp = self
            .send(&self.policy, Method::POST, &url, Some(serde_json::to_vec(&body)?), "aoss.search")
            .await?;

        let parsed: SearchResponse = decode(resp).await?;
        let total = parsed.hits.hits.len();
        let hits = parsed
            .hits
            .hits
            .into_iter()
            .map(|h| SearchHit {
                score: h.score.unwrap_or(0.0),
                message: h.source.message,
                service: h.source.service,
                error_code: h.source.error_code,
            })
            .collect();
        let ranked = rank_hits(hits, k);
        debug!(k, returned = total, kept = ranked.len(), "knn search completed");
        Ok(ranked)
    }

    /// Indexes one document and returns the id the index assigned.
    ///
    /// The id is assigned server side, so the call is only repeated when the
    /// connection could not be opened.
    pub async fn index_document(&self, doc: &LogDocument) -> Result<String, RagError> {
        match &doc.message_embedding {
            Some(v) => self.check_dim(v.len())?,
            None => return Err(RagError::Embedding("document has no embedding".into())),
        }
        let url = format!("{}/{}/_doc", self.endpoint, self.index);
        let resp = self
            .send(
                &self.policy.for_writes(),
                Method::POST,
                &url,
                Some(serde_json::to_vec(doc)?),
                "aoss.index",
            )
            .await?;

        #[derive(Deserialize)]
        struct Indexed {
            #[serde(rename = "_id", default)]
            id: String,
        }
        Ok(decode::<Indexed>(resp).await?.id)
    }

    /// `PUT`s the index with `mapping`.
    ///
    /// # Errors
    /// [`RagError::AlreadyExists`] when the index is already there.
    pub async fn create_index(&self, mapping: &Value) -> Result<(), RagError> {
        let url = format!("{}/{}", self.endpoint, self.index);
        self.send(
            &self.policy,
            Method::PUT,
            &url,
            Some(serde_json::to_vec(mapping)?),
            "aoss.create_index",
        )
        .await?;
        info!(index = %self.index, "index created");
        Ok(())
    }

    /// Number of documents in the index.
    pub async fn count(&self) -> Result<u64, RagError> {
        let url = format!("{}/{}/_count", self.endpoint, self.index);
        let resp = self.send(&self.policy, Method::GET, &url, None, "aoss.count").await?;

        #[derive(Deserialize)]
        struct Count {
            count: u64,
        }
        Ok(decode::<Count>(resp).await?.count)
    }

    fn check_dim(&self, got: usize) -> Result<(), RagError> {
        if got != self.space.size {
            return Err(RagError::VectorSizeMismatch {
                got,
                want: self.space.size,
            });
        }
        Ok(())
    }

    /// Signs, sends with retry and maps non-2xx answers.
    async fn send(
        &self,
        policy: &HttpPolicy,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
        label: &str,
    ) -> Result<reqwest::Response, RagError> {
        debug!(%method, %url, "aoss request");
        let resp = send_with_retry(policy, label, |_| {
            let method = method.clone();
            let body = body.clone();
            async move {
                let mut builder = self
                    .client
                    .request(method, url)
                    .header(ACCEPT, "application/json");
                if let Some(body) = body {
                    builder = builder.header(CONTENT_TYPE, "application/json").body(body);
                }
                let mut req = builder.build()?;
                self.signer.sign(&mut req).await?;
                Ok::<_, RagError>(self.client.execute(req).await?)
            }
        })
        .await?;

        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        let err = classify(status, url, &text);
        warn!(%status, %url, error = %err, "aoss request failed");
        Err(err)
    }
}

/// Maps an OpenSearch error answer onto [`RagError`].
pub(crate) fn classify(status: StatusCode, url: &str, body: &str) -> RagError {
    let snippet = make_snippet(body);
    let kind = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/type").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_default();

    if kind == "resource_already_exists_exception" {
        return RagError::AlreadyExists(snippet);
    }
    match status {
        StatusCode::NOT_FOUND => RagError::NotFound(snippet),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RagError::Auth { status, snippet },
        StatusCode::BAD_REQUEST => RagError::InvalidQuery(snippet),
        _ => RagError::Http {
            status,
            url: url.to_string(),
            snippet,
        },
    }
}

async fn decode<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T, RagError> {
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| RagError::Decode(e.to_string()))
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: HitsEnvelope,
}

#[derive(Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    hits: Vec<RawHit>,
}

#[derive(Deserialize)]
struct RawHit {
    #[serde(rename = "_score")]
    score: Option<f32>,
    #[serde(rename = "_source")]
    source: ProjectedSource,
}

#[derive(Deserialize)]
struct ProjectedSource {
    message: String,
    service: String,
    error_code: String,
}
