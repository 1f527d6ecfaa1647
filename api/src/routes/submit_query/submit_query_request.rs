use axum::http::{HeaderMap, header::ACCEPT};
use contextor::ContextorError;
use serde_json::Value;

/// Parsed payload of `POST /submit_query`.
///
/// Parsing is lenient about everything except `query`: malformed JSON, a
/// missing or non-string `query` and a blank one all count as a missing query.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitQueryRequest {
    pub query: String,
    pub stream: bool,
    /// Neighbour count override.
    pub k: Option<usize>,
}

impl SubmitQueryRequest {
    pub fn parse(body: &[u8]) -> Result<Self, ContextorError> {
        let v: Value = serde_json::from_slice(body).map_err(|_| ContextorError::MissingQuery)?;
        let query = v
            .get("query")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or(ContextorError::MissingQuery)?;
        Ok(Self {
            query: query.to_string(),
            stream: v.get("stream").and_then(Value::as_bool).unwrap_or(false),
            // Clamped to the configured ceiling by the pipeline.
            k: v
                .get("k")
                .and_then(Value::as_u64)
                .map(|k| usize::try_from(k).unwrap_or(usize::MAX)),
        })
    }

    /// Streaming was asked for in the body or through `Accept`.
    pub fn wants_stream(&self, headers: &HeaderMap) -> bool {
        self.stream
            || headers
                .get_all(ACCEPT)
                .iter()
                .filter_map(|h| h.to_str().ok())
                .any(|h| h.contains("text/event-stream"))
    }
}
