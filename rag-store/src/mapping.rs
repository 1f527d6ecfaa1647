//! Field mapping of the error-log index.

use serde_json::{Value, json};

use crate::config::VectorSpace;
use crate::record::EMBEDDING_FIELD;

/// Engine backing the HNSW graph.
pub const KNN_ENGINE: &str = "nmslib";

/// Keyword/text/date fields of a log document plus the `knn_vector` field
/// sized to `space`.
pub fn index_mapping(space: VectorSpace) -> Value {
    let mut properties = json!({
        "timestamp": { "type": "date" },
        "level": { "type": "keyword" },
        "service": { "type": "keyword" },
        "error_code": { "type": "keyword" },
        "message": { "type": "text" },
        "stack_trace": { "type": "text" },
        "correlation_id": { "type": "keyword" },
        "user_id": { "type": "keyword" },
        "metadata": {
            "properties": {
                "environment": { "type": "keyword" },
                "region": { "type": "keyword" },
                "version": { "type": "keyword" }
            }
        }
    });
    properties[EMBEDDING_FIELD] = json!({
        "type": "knn_vector",
        "dimension": space.size,
        "method": {
            "name": "hnsw",
            "space_type": space.distance.space_type(),
            "engine": KNN_ENGINE
        }
    });

    json!({
        "settings": { "index.knn": true },
        "mappings": { "properties": properties }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DistanceKind;

    #[test]
    fn vector_field_follows_space() {
        let m = index_mapping(VectorSpace {
            size: 1024,
            distance: DistanceKind::Cosine,
        });
        let v = &m["mappings"]["properties"]["message_embedding"];
        assert_eq!(v["dimension"], 1024);
        assert_eq!(v["method"]["space_type"], "cosinesimil");
        assert_eq!(v["method"]["engine"], "nmslib");
        assert_eq!(m["mappings"]["properties"]["service"]["type"], "keyword");
    }
}
