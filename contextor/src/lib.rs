//! RAG + LLM gateway over the error-log index.
//!
//! Public API: [`RagPipeline`]. It embeds the question, retrieves the nearest
//! error logs from `rag-store`, builds a compact prompt and asks the
//! generation model, either for a complete answer ([`RagPipeline::ask`]) or
//! for a stream of fragments ([`RagPipeline::ask_stream`]).

pub mod cfg;
pub mod error;
pub mod prompt;

mod api_types;

use std::{fmt, sync::Arc, time::Instant};

use ai_llm_service::LlmServiceProfiles;
use futures::{StreamExt, TryStreamExt, stream};
use rag_store::{EmbeddingsProvider, RagStore, SearchHit};
use tracing::{debug, info, warn};

pub use api_types::{AnswerStream, AskOptions, QaAnswer, StreamingAnswer};
pub use cfg::ContextorConfig;
pub use error::{ContextorError, ErrorClass};

/// Per-request stages, logged as the request moves through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Embedding,
    Searching,
    Generating,
    Responding,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Received => "received",
            Stage::Embedding => "embedding",
            Stage::Searching => "searching",
            Stage::Generating => "generating",
            Stage::Responding => "responding",
        })
    }
}

/// Trimmed query text, or [`ContextorError::MissingQuery`].
pub fn validate_query(query: &str) -> Result<&str, ContextorError> {
    let q = query.trim();
    if q.is_empty() {
        Err(ContextorError::MissingQuery)
    } else {
        Ok(q)
    }
}

/// Stateless orchestrator; clients are shared and built once.
pub struct RagPipeline {
    cfg: ContextorConfig,
    store: Arc<RagStore>,
    embedder: Arc<dyn EmbeddingsProvider>,
    llm: Arc<LlmServiceProfiles>,
}

impl RagPipeline {
    pub fn new(
        cfg: ContextorConfig,
        store: Arc<RagStore>,
        embedder: Arc<dyn EmbeddingsProvider>,
        llm: Arc<LlmServiceProfiles>,
    ) -> Self {
        Self {
            cfg,
            store,
            embedder,
            llm,
        }
    }

    pub fn config(&self) -> &ContextorConfig {
        &self.cfg
    }

    pub fn store(&self) -> &RagStore {
        &self.store
    }

    pub fn llm(&self) -> &LlmServiceProfiles {
        &self.llm
    }

    /// Complete answer plus the top documents it was grounded on.
    ///
    /// # Errors
    /// `MissingQuery` before any collaborator is called; otherwise the
    /// failing stage (`Embedding`, `Search`, `Generation`).
    pub async fn ask(&self, query: &str, opts: AskOptions) -> Result<QaAnswer, ContextorError> {
        let started = Instant::now();
        let query = validate_query(query)?;
        let hits = self.retrieve(query, &opts).await?;

        let answer = if self.cfg.generation {
            stage(Stage::Generating);
            let user = prompt::build_user_prompt(query, &prompt::build_context(&hits, self.cfg.max_ctx_chars));
            self.llm
                .generate(&user, Some(prompt::DEFAULT_SYSTEM.trim()))
                .await
                .map_err(|e| failed(ContextorError::Generation(e)))?
        } else {
            prompt::digest(&hits)
        };

        stage(Stage::Responding);
        let elapsed = started.elapsed().as_secs_f64();
        info!(hits = hits.len(), answer_len = answer.len(), elapsed_s = elapsed, "query answered");
        Ok(QaAnswer {
            query: query.to_string(),
            answer,
            similar_documents: self.top_documents(hits),
            processing_time_seconds: elapsed,
        })
    }

    /// Retrieval runs eagerly; the returned stream yields answer fragments.
    ///
    /// Errors before the stream exists are returned directly; a generation
    /// failure after the first fragment arrives as the last stream item.
    pub async fn ask_stream(&self, query: &str, opts: AskOptions) -> Result<StreamingAnswer, ContextorError> {
        let query = validate_query(query)?;
        let hits = self.retrieve(query, &opts).await?;

        let fragments: AnswerStream = if self.cfg.generation {
            stage(Stage::Generating);
            let user = prompt::build_user_prompt(query, &prompt::build_context(&hits, self.cfg.max_ctx_chars));
            let text = self
                .llm
                .generate_stream(&user, Some(prompt::DEFAULT_SYSTEM.trim()))
                .await
                .map_err(|e| failed(ContextorError::Generation(e)))?;
            text.map_err(|e| failed(ContextorError::Generation(e))).boxed()
        } else {
            stream::once(futures::future::ready(Ok(prompt::digest(&hits)))).boxed()
        };

        stage(Stage::Responding);
        Ok(StreamingAnswer {
            similar_documents: self.top_documents(hits),
            fragments,
        })
    }

    async fn retrieve(&self, query: &str, opts: &AskOptions) -> Result<Vec<SearchHit>, ContextorError> {
        stage(Stage::Received);
        let k = self.cfg.effective_k(opts.top_k);
        debug!(query = %prompt::safe_truncate(query, 50), k, "processing query");

        stage(Stage::Embedding);
        let vector = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| failed(ContextorError::Embedding(e)))?;

        stage(Stage::Searching);
        let hits = self
            .store
            .search_by_vector(&vector, k)
            .await
            .map_err(|e| failed(ContextorError::Search(e)))?;
        debug!(hits = hits.len(), "search finished");
        Ok(hits)
    }

    fn top_documents(&self, mut hits: Vec<SearchHit>) -> Vec<SearchHit> {
        hits.truncate(self.cfg.context_docs);
        hits
    }
}

fn stage(s: Stage) {
    debug!(stage = %s, "pipeline stage");
}

fn failed(e: ContextorError) -> ContextorError {
    warn!(category = e.category(), error = %e, "query failed");
    e
}
