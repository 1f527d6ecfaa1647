use std::path::Path;

use anyhow::{Context, bail};
use chrono::{Duration, Utc};
use rag_store::{LogGenerator, SynthOptions, io_json::write_documents};
use tracing::info;

pub fn run(out: &Path, seed: Option<u64>, days: i64, probability: f64) -> anyhow::Result<()> {
    let count = generate_to(out, seed, options(days, probability)?)?;
    println!("wrote {count} error logs to {}", out.display());
    Ok(())
}

/// Longest window accepted by `--days`.
pub const MAX_DAYS: i64 = 365;

fn options(days: i64, probability: f64) -> anyhow::Result<SynthOptions> {
    if !(1..=MAX_DAYS).contains(&days) {
        bail!("--days must be within [1, {MAX_DAYS}]");
    }
    if !(0.0..=1.0).contains(&probability) {
        bail!("--probability must be within [0, 1]");
    }
    let window = Duration::try_days(days).context("--days is out of range")?;
    Ok(SynthOptions {
        end: Utc::now(),
        window,
        probability,
        ..SynthOptions::default()
    })
}

/// Generates a corpus and writes it as a JSON array; returns the count.
pub fn generate_to(out: &Path, seed: Option<u64>, opts: SynthOptions) -> anyhow::Result<usize> {
    let docs = LogGenerator::new(seed).generate(&opts);
    write_documents(out, &docs).with_context(|| format!("cannot write {}", out.display()))?;
    info!(count = docs.len(), path = %out.display(), "synthetic corpus written");
    Ok(docs.len())
}
