//! Core data models used by the library.

use serde::{Deserialize, Serialize};

/// Name of the `knn_vector` field holding the message embedding.
pub const EMBEDDING_FIELD: &str = "message_embedding";

/// Fields returned by k-NN search. The vector itself is never projected.
pub const SEARCH_PROJECTION: [&str; 3] = ["message", "service", "error_code"];

/// One error-log document as stored in the index.
///
/// The index assigns document identity; nothing here carries an id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogDocument {
    /// RFC 3339 with a `Z` suffix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    pub service: String,
    pub error_code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<LogMetadata>,
    /// Attached by the loader right before indexing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_embedding: Option<Vec<f32>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMetadata {
    pub environment: String,
    pub region: String,
    pub version: String,
}

/// Projection of a matched document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub score: f32,
    pub message: String,
    pub service: String,
    pub error_code: String,
}

/// Query parameters for RAG retrieval.
#[derive(Clone, Copy, Debug)]
pub struct RagQuery<'a> {
    pub text: &'a str,
    pub top_k: usize,
}

/// Sorts by descending score (NaN last) and keeps at most `k`.
pub fn rank_hits(mut hits: Vec<SearchHit>, k: usize) -> Vec<SearchHit> {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or_else(|| a.score.is_nan().cmp(&b.score.is_nan()))
    });
    hits.truncate(k);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(score: f32, code: &str) -> SearchHit {
        SearchHit {
            score,
            message: "m".into(),
            service: "s".into(),
            error_code: code.into(),
        }
    }

    #[test]
    fn ranking_is_descending_and_bounded() {
        let out = rank_hits(
            vec![hit(0.2, "a"), hit(0.9, "b"), hit(f32::NAN, "n"), hit(0.5, "c")],
            3,
        );
        let codes: Vec<_> = out.iter().map(|h| h.error_code.as_str()).collect();
        assert_eq!(codes, vec!["b", "c", "a"]);
    }

    #[test]
    fn document_without_optionals_round_trips_minimal_json() {
        let doc: LogDocument = serde_json::from_value(serde_json::json!({
            "service": "auth-service",
            "error_code": "AUTH_002",
            "message": "Session expired"
        }))
        .unwrap();
        let back = serde_json::to_value(&doc).unwrap();
        assert_eq!(back.as_object().map(|o| o.len()), Some(3));
    }
}
