//! Runtime and collection configuration.

use std::time::Duration;

use ai_llm_service::config::default_config::{DEFAULT_EMBEDDING_DIM, embedding_dim_from};
use services::aws::DEFAULT_REGION;

use crate::errors::RagError;

/// Similarity space of the `knn_vector` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DistanceKind {
    /// Cosine similarity (recommended for most embeddings).
    Cosine,
    /// Inner product (useful for normalized vectors).
    Dot,
    /// Euclidean distance (L2).
    Euclid,
}

impl DistanceKind {
    /// `space_type` value understood by the k-NN plugin.
    pub fn space_type(self) -> &'static str {
        match self {
            DistanceKind::Cosine => "cosinesimil",
            DistanceKind::Dot => "innerproduct",
            DistanceKind::Euclid => "l2",
        }
    }
}

/// Describes the vector space of the index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VectorSpace {
    /// Dimensionality of vectors.
    pub size: usize,
    pub distance: DistanceKind,
}

/// Configuration for the collection, its index and the AWS endpoints around it.
#[derive(Clone, Debug)]
pub struct RagConfig {
    /// Serverless collection name.
    pub collection: String,
    /// Index inside the collection; defaults to the collection name.
    pub index: String,
    /// Data-plane endpoint. Discovered through the control plane when `None`.
    pub endpoint: Option<String>,
    /// Control-plane endpoint, `https://aoss.{region}.amazonaws.com` by default.
    pub admin_endpoint: String,
    /// STS endpoint for caller identity lookups.
    pub sts_endpoint: String,
    pub region: String,
    pub space: VectorSpace,
    /// Wait between collection status checks while provisioning.
    pub poll_interval: Duration,
    /// Principal for the data access policy; STS is asked when unset.
    pub principal_arn: Option<String>,
}

impl RagConfig {
    /// Defaults for `collection` in `region`.
    pub fn new_default(collection: impl Into<String>, region: impl Into<String>) -> Self {
        let collection = collection.into();
        let region = region.into();
        Self {
            index: collection.clone(),
            collection,
            endpoint: None,
            admin_endpoint: format!("https://aoss.{region}.amazonaws.com"),
            sts_endpoint: format!("https://sts.{region}.amazonaws.com"),
            space: VectorSpace {
                size: DEFAULT_EMBEDDING_DIM,
                distance: DistanceKind::Cosine,
            },
            poll_interval: Duration::from_secs(30),
            principal_arn: None,
            region,
        }
    }

    /// Reads `OPENSEARCH_COLLECTION` (required), `OPENSEARCH_INDEX`,
    /// `OPENSEARCH_ENDPOINT`, `AOSS_ADMIN_ENDPOINT`, `STS_ENDPOINT`,
    /// `PROVISION_PRINCIPAL_ARN`, `EMBEDDING_DIM` and the AWS region.
    pub fn from_env() -> Result<Self, RagError> {
        Self::from_lookup(&|k| std::env::var(k).ok())
    }

    pub fn from_lookup(get: &dyn Fn(&str) -> Option<String>) -> Result<Self, RagError> {
        let var = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let collection = var("OPENSEARCH_COLLECTION")
            .ok_or_else(|| RagError::Config("OPENSEARCH_COLLECTION is not set".into()))?;
        let region = var("AWS_REGION")
            .or_else(|| var("AWS_DEFAULT_REGION"))
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let mut cfg = Self::new_default(collection, region);
        if let Some(index) = var("OPENSEARCH_INDEX") {
            cfg.index = index;
        }
        cfg.endpoint = var("OPENSEARCH_ENDPOINT").map(|e| normalize_endpoint(&e));
        if let Some(ep) = var("AOSS_ADMIN_ENDPOINT") {
            cfg.admin_endpoint = normalize_endpoint(&ep);
        }
        if let Some(ep) = var("STS_ENDPOINT") {
            cfg.sts_endpoint = normalize_endpoint(&ep);
        }
        cfg.principal_arn = var("PROVISION_PRINCIPAL_ARN");
        cfg.space.size = embedding_dim_from(get).map_err(|e| RagError::Config(e.to_string()))?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates config values.
    pub fn validate(&self) -> Result<(), RagError> {
        if self.collection.trim().is_empty() {
            return Err(RagError::Config("collection is empty".into()));
        }
        if self.index.trim().is_empty() {
            return Err(RagError::Config("index is empty".into()));
        }
        if self.space.size == 0 {
            return Err(RagError::Config("embedding dimension must be > 0".into()));
        }
        Ok(())
    }
}

/// Adds `https://` to bare hosts (the control plane returns full URLs, older
/// tooling passes hosts) and drops a trailing slash.
pub fn normalize_endpoint(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn collection_is_required() {
        assert!(matches!(
            RagConfig::from_lookup(&lookup(&[])),
            Err(RagError::Config(_))
        ));
    }

    #[test]
    fn index_defaults_to_collection_and_endpoints_are_regional() {
        let cfg = RagConfig::from_lookup(&lookup(&[
            ("OPENSEARCH_COLLECTION", "error-logs-mock"),
            ("AWS_REGION", "eu-west-1"),
        ]))
        .unwrap();
        assert_eq!(cfg.index, "error-logs-mock");
        assert_eq!(cfg.endpoint, None);
        assert_eq!(cfg.admin_endpoint, "https://aoss.eu-west-1.amazonaws.com");
        assert_eq!(cfg.space.size, 1024);
    }

    #[test]
    fn bare_endpoint_host_gets_scheme() {
        let cfg = RagConfig::from_lookup(&lookup(&[
            ("OPENSEARCH_COLLECTION", "c"),
            ("OPENSEARCH_ENDPOINT", "abc123.us-west-2.aoss.amazonaws.com/"),
            ("EMBEDDING_DIM", "384"),
        ]))
        .unwrap();
        assert_eq!(
            cfg.endpoint.as_deref(),
            Some("https://abc123.us-west-2.aoss.amazonaws.com")
        );
        assert_eq!(cfg.space.size, 384);
    }
}
