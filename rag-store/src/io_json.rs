//! Corpus files: a JSON array of documents or JSON Lines.
//!
//! - [`read_documents`] → strict parsing into [`LogDocument`]; the format is
//!   picked from the first non-blank character (`[` means array).
//! - [`write_documents`] → pretty-printed JSON array.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::errors::RagError;
use crate::record::LogDocument;

/// Reads every document from `path`.
///
/// # Errors
/// - [`RagError::Io`] if the file cannot be read.
/// - [`RagError::Parse`] / [`RagError::Decode`] if any document is malformed;
///   JSONL errors carry the line number.
pub fn read_documents(path: impl AsRef<Path>) -> Result<Vec<LogDocument>, RagError> {
    let path = path.as_ref();
    info!("Reading corpus: {:?}", path);
    let text = std::fs::read_to_string(path)?;

    let docs = if text.trim_start().starts_with('[') {
        serde_json::from_str::<Vec<LogDocument>>(&text)?
    } else {
        parse_jsonl(&text)?
    };
    debug!("Loaded {} documents", docs.len());
    Ok(docs)
}

fn parse_jsonl(text: &str) -> Result<Vec<LogDocument>, RagError> {
    let mut out = Vec::new();
    for (i, line) in BufReader::new(text.as_bytes()).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let doc = serde_json::from_str(&line)
            .map_err(|e| RagError::Decode(format!("line {} parse error: {}", i + 1, e)))?;
        out.push(doc);
    }
    Ok(out)
}

/// Writes `docs` as a pretty JSON array (two-space indent).
pub fn write_documents(path: impl AsRef<Path>, docs: &[LogDocument]) -> Result<(), RagError> {
    let mut w = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer_pretty(&mut w, docs)?;
    w.write_all(b"\n")?;
    w.flush()?;
    info!("Wrote {} documents to {:?}", docs.len(), path.as_ref());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str =
        r#"{"service":"order-service","error_code":"ORD_002","message":"Inventory not available"}"#;

    #[test]
    fn reads_array_and_jsonl() {
        let dir = tempfile::tempdir().unwrap();

        let array = dir.path().join("logs.json");
        std::fs::write(&array, format!("  [{DOC},{DOC}]")).unwrap();
        assert_eq!(read_documents(&array).unwrap().len(), 2);

        let lines = dir.path().join("logs.jsonl");
        std::fs::write(&lines, format!("{DOC}\n\n{DOC}\n")).unwrap();
        assert_eq!(read_documents(&lines).unwrap().len(), 2);
    }

    #[test]
    fn bad_jsonl_line_is_reported_with_number() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("bad.jsonl");
        std::fs::write(&p, format!("{DOC}\n{{\"service\":1}}\n")).unwrap();
        match read_documents(&p) {
            Err(RagError::Decode(msg)) => assert!(msg.starts_with("line 2"), "{msg}"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn written_file_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("out.json");
        let docs = read_documents_from_str(DOC);
        write_documents(&p, &docs).unwrap();
        assert_eq!(read_documents(&p).unwrap(), docs);
    }

    fn read_documents_from_str(line: &str) -> Vec<LogDocument> {
        parse_jsonl(line).unwrap()
    }
}
