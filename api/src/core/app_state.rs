use std::sync::Arc;

use ai_llm_service::LlmServiceProfiles;
use contextor::{ContextorConfig, RagPipeline};
use rag_store::{LlmEmbedder, RagConfig, RagStore};
use services::aws::default_provider;
use tracing::info;

use crate::error_handler::AppError;

/// Shared state for all HTTP handlers. Built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RagPipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<RagPipeline>) -> Self {
        Self { pipeline }
    }

    /// Builds every client from the environment.
    ///
    /// Fails on missing required configuration or when the collection
    /// endpoint cannot be resolved.
    pub async fn from_env() -> Result<Self, AppError> {
        let credentials = default_provider()?;
        let llm = Arc::new(LlmServiceProfiles::new(
            ai_llm_service::config::default_config::config_generation()?,
            ai_llm_service::config::default_config::config_embedding()?,
            credentials.clone(),
            None,
        )?);

        let rag_cfg = RagConfig::from_env()?;
        let embedder = Arc::new(LlmEmbedder::new(llm.clone(), rag_cfg.space.size));
        let store = Arc::new(RagStore::connect(rag_cfg, credentials).await?);
        let cfg = ContextorConfig::from_env()?;
        info!(
            top_k = cfg.top_k,
            context_docs = cfg.context_docs,
            generation = cfg.generation,
            "query pipeline ready"
        );

        Ok(Self::new(Arc::new(RagPipeline::new(cfg, store, embedder, llm))))
    }
}
