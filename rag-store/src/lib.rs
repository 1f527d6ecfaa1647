//! Error-log vector store on OpenSearch Serverless.
//!
//! This crate provides:
//! - k-NN retrieval of log documents for a textual query
//! - Corpus loading (embed → index) with per-document failure accounting
//! - Collection provisioning and endpoint discovery on the control plane
//! - A reproducible synthetic error-log generator
//!
//! [`RagStore`] is the entry point for application code; the lower-level
//! modules stay public for tools that need a single piece.

pub mod admin;
pub mod config;
pub mod discovery;
pub mod embed;
pub mod errors;
pub mod ingest;
pub mod io_json;
pub mod mapping;
pub mod opensearch_facade;
pub mod provision;
pub mod record;
pub mod synth;

use std::sync::Arc;

pub use config::{DistanceKind, RagConfig, VectorSpace};
pub use embed::{EmbeddingsProvider, llm::LlmEmbedder};
pub use errors::RagError;
pub use ingest::{LoadReport, load_documents};
pub use opensearch_facade::OpenSearchFacade;
pub use provision::{ProvisionError, ProvisionReport, Provisioner, StepOutcome};
pub use record::{LogDocument, LogMetadata, RagQuery, SearchHit};
pub use synth::{LogGenerator, SynthOptions};

use services::aws::CredentialsProvider;
use tracing::{debug, info, trace};

/// Configuration plus a data-plane client bound to one index.
pub struct RagStore {
    cfg: RagConfig,
    facade: OpenSearchFacade,
}

impl RagStore {
    /// Builds a store against a known endpoint.
    pub fn new(
        cfg: RagConfig,
        endpoint: impl Into<String>,
        credentials: Arc<dyn CredentialsProvider>,
    ) -> Result<Self, RagError> {
        cfg.validate()?;
        let facade = OpenSearchFacade::new(&cfg, endpoint, credentials)?;
        trace!(collection = %cfg.collection, endpoint = %facade.endpoint(), "RagStore::new");
        Ok(Self { cfg, facade })
    }

    /// Builds a store, discovering the endpoint from the collection name when
    /// the configuration does not carry one.
    pub async fn connect(cfg: RagConfig, credentials: Arc<dyn CredentialsProvider>) -> Result<Self, RagError> {
        cfg.validate()?;
        let endpoint = match &cfg.endpoint {
            Some(ep) => ep.clone(),
            None => {
                let admin = admin::ServerlessAdmin::new(&cfg, credentials.clone())?;
                discovery::resolve_endpoint(&cfg, &admin).await?
            }
        };
        info!(collection = %cfg.collection, %endpoint, index = %cfg.index, "vector store connected");
        Self::new(cfg, endpoint, credentials)
    }

    pub fn config(&self) -> &RagConfig {
        &self.cfg
    }

    pub fn facade(&self) -> &OpenSearchFacade {
        &self.facade
    }

    /// k-NN search with a ready query vector.
    pub async fn search_by_vector(&self, vector: &[f32], top_k: usize) -> Result<Vec<SearchHit>, RagError> {
        self.facade.search_knn(vector, top_k).await
    }

    /// Embeds the query text and returns ranked hits.
    pub async fn rag_context(
        &self,
        query: RagQuery<'_>,
        provider: &dyn EmbeddingsProvider,
    ) -> Result<Vec<SearchHit>, RagError> {
        let vector = provider.embed(query.text).await?;
        self.facade.search_knn(&vector, query.top_k).await
    }

    /// Embeds and indexes `docs`, continuing past individual failures.
    pub async fn load(
        &self,
        docs: Vec<LogDocument>,
        provider: &dyn EmbeddingsProvider,
        show_progress: bool,
    ) -> LoadReport {
        ingest::load_documents(&self.facade, provider, docs, show_progress).await
    }

    /// Creates the index with the k-NN mapping; an existing index is not an error.
    pub async fn ensure_index(&self) -> Result<StepOutcome, RagError> {
        match self.facade.create_index(&mapping::index_mapping(self.cfg.space)).await {
            Ok(()) => Ok(StepOutcome::Created),
            Err(e) if e.is_already_exists() => {
                debug!(index = %self.cfg.index, "index already exists");
                Ok(StepOutcome::AlreadyExisted)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn count(&self) -> Result<u64, RagError> {
        self.facade.count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use services::aws::{Credentials, StaticCredentialsProvider};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn creds() -> Arc<dyn CredentialsProvider> {
        Arc::new(StaticCredentialsProvider(Credentials::new("AKID", "SECRET")))
    }

    #[tokio::test]
    async fn connect_discovers_endpoint_then_ensures_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(wiremock::matchers::header("x-amz-target", "OpenSearchServerless.ListCollections"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "collectionSummaries": [{ "id": "c1", "name": "error-logs-mock", "status": "ACTIVE" }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(wiremock::matchers::header("x-amz-target", "OpenSearchServerless.BatchGetCollection"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "collectionDetails": [{
                    "id": "c1", "name": "error-logs-mock", "status": "ACTIVE",
                    "collectionEndpoint": server.uri()
                }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/error-logs-mock"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "type": "resource_already_exists_exception" }
            })))
            .mount(&server)
            .await;

        let mut cfg = RagConfig::new_default("error-logs-mock", "us-west-2");
        cfg.admin_endpoint = server.uri();
        let store = RagStore::connect(cfg, creds()).await.unwrap();
        assert_eq!(store.facade().endpoint(), server.uri());
        assert_eq!(store.ensure_index().await.unwrap(), StepOutcome::AlreadyExisted);
    }
}
