//! Corpus loader: embed each message → attach vector → index the document.
//!
//! Documents are processed one at a time. A failed embedding skips the
//! document; a failed index call is recorded; neither stops the batch.

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::embed::EmbeddingsProvider;
use crate::opensearch_facade::OpenSearchFacade;
use crate::record::LogDocument;

/// Log a progress line every this many indexed documents.
pub const PROGRESS_EVERY: usize = 10;

/// Why one document did not make it into the index.
#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    /// Position in the input.
    pub position: usize,
    pub error_code: String,
    pub reason: String,
}

/// Outcome of a load run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub attempted: usize,
    pub indexed: usize,
    pub embedding_failures: Vec<ItemFailure>,
    pub indexing_failures: Vec<ItemFailure>,
}

impl LoadReport {
    /// Some documents were attempted but not indexed.
    pub fn is_partial(&self) -> bool {
        self.indexed < self.attempted
    }
}

/// Embeds and indexes `docs` sequentially.
///
/// When `show_progress` is set a terminal progress bar tracks the run;
/// structured progress is logged either way.
pub async fn load_documents(
    facade: &OpenSearchFacade,
    provider: &dyn EmbeddingsProvider,
    docs: Vec<LogDocument>,
    show_progress: bool,
) -> LoadReport {
    let mut report = LoadReport {
        attempted: docs.len(),
        ..LoadReport::default()
    };
    info!(documents = docs.len(), index = %facade.index(), "loading corpus");

    let pb = progress_bar(docs.len() as u64, show_progress);

    for (position, mut doc) in docs.into_iter().enumerate() {
        pb.inc(1);
        let vector = match provider.embed(&doc.message).await {
            Ok(v) => v,
            Err(e) => {
                warn!(position, error = %e, "embedding failed, skipping document");
                report.embedding_failures.push(failure(position, &doc, e.to_string()));
                continue;
            }
        };
        doc.message_embedding = Some(vector);

        match facade.index_document(&doc).await {
            Ok(id) => {
                report.indexed += 1;
                debug!(position, %id, "document indexed");
                if report.indexed % PROGRESS_EVERY == 0 {
                    info!(indexed = report.indexed, "indexing progress");
                }
            }
            Err(e) => {
                warn!(position, error = %e, "indexing failed");
                report.indexing_failures.push(failure(position, &doc, e.to_string()));
            }
        }
    }

    pb.finish_with_message("load complete");
    info!(
        attempted = report.attempted,
        indexed = report.indexed,
        embedding_failures = report.embedding_failures.len(),
        indexing_failures = report.indexing_failures.len(),
        "load finished"
    );
    report
}

fn failure(position: usize, doc: &LogDocument, reason: String) -> ItemFailure {
    ItemFailure {
        position,
        error_code: doc.error_code.clone(),
        reason,
    }
}

fn progress_bar(len: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
    ) {
        pb.set_style(style.progress_chars("##-"));
    }
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RagConfig;
    use crate::embed::EmbedFuture;
    use crate::errors::RagError;
    use services::aws::{Credentials, StaticCredentialsProvider};
    use std::sync::Arc;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Fails for messages containing "timeout", embeds the rest as `[len, 1]`.
    struct PickyEmbedder;

    impl EmbeddingsProvider for PickyEmbedder {
        fn embed<'a>(&'a self, text: &'a str) -> EmbedFuture<'a> {
            Box::pin(async move {
                if text.contains("timeout") {
                    Err(RagError::Embedding("throttled".into()))
                } else {
                    Ok(vec![text.len() as f32, 1.0])
                }
            })
        }
    }

    fn doc(code: &str, message: &str) -> LogDocument {
        LogDocument {
            timestamp: Some("2025-01-01T00:00:00Z".into()),
            level: Some("ERROR".into()),
            service: "order-service".into(),
            error_code: code.into(),
            message: message.into(),
            stack_trace: None,
            correlation_id: None,
            user_id: None,
            metadata: None,
            message_embedding: None,
        }
    }

    #[tokio::test]
    async fn embedding_and_indexing_failures_do_not_abort() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/error-logs-mock/_doc"))
            .and(body_partial_json(serde_json::json!({ "error_code": "ORD_002" })))
            .respond_with(ResponseTemplate::new(400).set_body_string("{\"error\":{\"type\":\"mapper_parsing_exception\"}}"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/error-logs-mock/_doc"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({ "_id": "x" })))
            .mount(&server)
            .await;

        let mut cfg = RagConfig::new_default("error-logs-mock", "us-west-2");
        cfg.space.size = 2;
        let creds = Arc::new(StaticCredentialsProvider(Credentials::new("AKID", "SECRET")));
        let facade = OpenSearchFacade::new(&cfg, server.uri(), creds).unwrap();

        let docs = vec![
            doc("ORD_001", "Order validation failed"),
            doc("ORD_003", "Order processing timeout"),
            doc("ORD_002", "Inventory not available"),
            doc("ORD_001", "Order validation failed"),
        ];
        let report = load_documents(&facade, &PickyEmbedder, docs, false).await;

        assert_eq!(report.attempted, 4);
        assert_eq!(report.indexed, 2);
        assert_eq!(report.embedding_failures.len(), 1);
        assert_eq!(report.embedding_failures[0].position, 1);
        assert_eq!(report.indexing_failures.len(), 1);
        assert_eq!(report.indexing_failures[0].error_code, "ORD_002");
        assert!(report.is_partial());
    }
}
