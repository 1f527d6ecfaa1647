//! Resolves the data-plane endpoint of a collection.
//!
//! An explicit endpoint wins; otherwise the control plane is asked:
//! `ListCollections` (by name) → `BatchGetCollection` → `collectionEndpoint`.

use tracing::{debug, info};

use crate::admin::ServerlessAdmin;
use crate::config::{RagConfig, normalize_endpoint};
use crate::errors::RagError;

/// Configured endpoint, or the discovered one.
pub async fn resolve_endpoint(cfg: &RagConfig, admin: &ServerlessAdmin) -> Result<String, RagError> {
    if let Some(ep) = &cfg.endpoint {
        debug!(endpoint = %ep, "using configured collection endpoint");
        return Ok(ep.clone());
    }
    discover_endpoint(admin, &cfg.collection).await
}

/// Looks the collection up by name and returns its endpoint with scheme.
///
/// # Errors
/// [`RagError::NotFound`] when no collection has that name or the control
/// plane reports no endpoint for it.
pub async fn discover_endpoint(admin: &ServerlessAdmin, collection: &str) -> Result<String, RagError> {
    let summaries = admin.list_collections(collection).await?;
    let Some(first) = summaries.into_iter().find(|c| c.name == collection) else {
        return Err(RagError::NotFound(format!("collection {collection}")));
    };

    let details = admin.batch_get_collection(&[first.id.clone()]).await?;
    let endpoint = details
        .into_iter()
        .find_map(|d| d.collection_endpoint)
        .ok_or_else(|| RagError::NotFound(format!("endpoint of collection {collection}")))?;

    let endpoint = normalize_endpoint(&endpoint);
    info!(%collection, %endpoint, "discovered collection endpoint");
    Ok(endpoint)
}
