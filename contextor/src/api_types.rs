//! Public API types re-used by external crates (e.g., the HTTP API layer).

use std::pin::Pin;

use futures::Stream;
use rag_store::SearchHit;
use serde::{Deserialize, Serialize};

use crate::error::ContextorError;

/// Per-request overrides.
///
/// # Example
/// ```
/// use contextor::AskOptions;
/// let opts = AskOptions { top_k: Some(8) };
/// assert_eq!(opts.top_k, Some(8));
/// ```
#[derive(Clone, Debug, Default)]
pub struct AskOptions {
    /// Neighbours to fetch; `None` or `0` falls back to `RAG_TOP_K`.
    pub top_k: Option<usize>,
}

/// Successful answer as returned by `/submit_query`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QaAnswer {
    pub query: String,
    /// Never empty.
    pub answer: String,
    pub similar_documents: Vec<SearchHit>,
    pub processing_time_seconds: f64,
}

/// Answer fragments in arrival order.
pub type AnswerStream = Pin<Box<dyn Stream<Item = Result<String, ContextorError>> + Send>>;

/// Retrieval is done; the answer is still being produced.
pub struct StreamingAnswer {
    pub similar_documents: Vec<SearchHit>,
    pub fragments: AnswerStream,
}
