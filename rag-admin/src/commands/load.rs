use std::{path::PathBuf, sync::Arc};

use ai_llm_service::{LlmServiceProfiles, config::default_config::config_embedding};
use anyhow::{Context, bail};
use contextor::ErrorClass;
use rag_store::{
    LlmEmbedder, LoadReport, LogGenerator, RagConfig, RagStore, StepOutcome, SynthOptions,
    io_json::read_documents,
};
use services::aws::default_provider;
use tracing::{info, warn};

/// Where the documents come from.
#[derive(Debug, Clone)]
pub enum Source {
    File(PathBuf),
    /// Seven days of synthetic logs, generated in memory.
    Generated { seed: Option<u64> },
}

pub async fn run(source: Source, show_progress: bool) -> anyhow::Result<()> {
    let docs = match &source {
        Source::File(path) => {
            read_documents(path).with_context(|| format!("cannot read {}", path.display()))?
        }
        Source::Generated { seed } => LogGenerator::new(*seed).generate(&SynthOptions::default()),
    };
    if docs.is_empty() {
        println!("nothing to load");
        return Ok(());
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

    if store.ensure_index().await? == StepOutcome::Created {
        info!(index = %store.config().index, "index created");
    }

    let report = store.load(docs, &embedder, show_progress).await;
    print!("{}", summarize(&report));
    if report.attempted > 0 && report.indexed == 0 {
        bail!("no document was indexed");
    }
    if report.is_partial() {
        warn!(class = ?ErrorClass::PartialBatchFailure, "load finished with failures");
    }
    Ok(())
}

/// Human-readable outcome of a load, one failure per line.
pub fn summarize(report: &LoadReport) -> String {
    let mut out = format!(
        "indexed {}/{} documents ({} embedding failures, {} indexing failures)\n",
        report.indexed,
        report.attempted,
        report.embedding_failures.len(),
        report.indexing_failures.len(),
    );
    let failures = report
        .embedding_failures
        .iter()
        .map(|f| ("embed", f))
        .chain(report.indexing_failures.iter().map(|f| ("index", f)));
    for (stage, f) in failures {
        out.push_str(&format!(
            "  #{} {} [{stage}] {}\n",
            f.position, f.error_code, f.reason
        ));
    }
    if report.is_partial() {
        out.push_str(&format!("status: {:?}\n", ErrorClass::PartialBatchFailure));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_store::ingest::ItemFailure;

    #[test]
    fn clean_load_has_one_line() {
        let report = LoadReport {
            attempted: 3,
            indexed: 3,
            ..LoadReport::default()
        };
        assert_eq!(
            summarize(&report),
            "indexed 3/3 documents (0 embedding failures, 0 indexing failures)\n"
        );
    }

    #[test]
    fn partial_load_lists_failures() {
        let report = LoadReport {
            attempted: 3,
            indexed: 1,
            embedding_failures: vec![ItemFailure {
                position: 0,
                error_code: "AUTH_001".into(),
                reason: "timeout".into(),
            }],
            indexing_failures: vec![ItemFailure {
                position: 2,
                error_code: "ORD_002".into(),
                reason: "status 400".into(),
            }],
        };
        let text = summarize(&report);
        assert!(text.contains("#0 AUTH_001 [embed] timeout"));
        assert!(text.contains("#2 ORD_002 [index] status 400"));
        assert!(text.ends_with("status: PartialBatchFailure\n"));
    }
}
