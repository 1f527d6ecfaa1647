use std::sync::Arc;

use ai_llm_service::{LlmServiceProfiles, config::default_config::config_embedding};
use anyhow::{Context, bail};
use rag_store::{LlmEmbedder, RagConfig, RagQuery, RagStore};
use services::aws::default_provider;

/// Retrieval only: prints the `k` nearest error logs as pretty JSON.
pub async fn run(query: &str, k: usize) -> anyhow::Result<()> {
    let query = query.trim();
    if query.is_empty() {
        bail!("query must not be empty");
    }
    if k == 0 {
        bail!("-k must be at least 1");
    }

    let cfg = RagConfig::from_env().context("invalid index configuration")?;
    let creds = default_provider().context("no AWS credentials available")?;
    let llm = Arc::new(LlmServiceProfiles::embedding_only(
        config_embedding()?,
        creds.clone(),
        None,
    )?);
    let embedder = LlmEmbedder::new(llm, cfg.space.size);
    let store = RagStore::connect(cfg, creds).await?;

    let hits = store
        .rag_context(RagQuery { text: query, top_k: k }, &embedder)
        .await?;
    println!("{}", serde_json::to_string_pretty(&hits)?);
    Ok(())
}
