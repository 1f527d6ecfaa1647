//! Prompt builder: short system message + compact context block.

use rag_store::SearchHit;

/// Separator between documents in the context block.
pub const CONTEXT_DELIMITER: &str = "\n\n---\n\n";

/// Answer used when retrieval found nothing and generation is off.
pub const NO_MATCHES: &str = "No matching documents were found for this query.";

/// Default system instructions for log analysis.
pub const DEFAULT_SYSTEM: &str = r#"
You are a site reliability assistant analysing application error logs.
Use the provided log context as ground truth; if it is insufficient, say so.
Be concise and name the services and error codes you rely on.
"#;

/// Renders one hit as a context document.
fn render_hit(hit: &SearchHit) -> String {
    format!(
        "service: {}\nerror_code: {}\nmessage: {}",
        hit.service, hit.error_code, hit.message
    )
}

/// Joins hits in retrieval order with [`CONTEXT_DELIMITER`] within `max_chars`.
///
/// A document that does not fit is cut at a char boundary and nothing after
/// it is included.
pub fn build_context(hits: &[SearchHit], max_chars: usize) -> String {
    let mut out = String::new();
    for (i, hit) in hits.iter().enumerate() {
        let sep = if i == 0 { "" } else { CONTEXT_DELIMITER };
        let doc = render_hit(hit);
        let room = max_chars.saturating_sub(out.len() + sep.len());
        if room == 0 {
            break;
        }
        out.push_str(sep);
        if doc.len() > room {
            out.push_str(safe_truncate(&doc, room));
            break;
        }
        out.push_str(&doc);
    }
    out
}

/// Final user prompt with a labeled context section.
pub fn build_user_prompt(question: &str, context: &str) -> String {
    let mut out = String::new();
    out.push_str("Question:\n");
    out.push_str(question.trim());
    out.push_str("\n\n");
    if context.is_empty() {
        out.push_str("No related error logs were retrieved.\n");
    } else {
        out.push_str("Context (most similar error logs first):\n");
        out.push_str(context);
        out.push_str("\n\nAnswer using only the context above when possible.\n");
    }
    out
}

/// Deterministic summary of the hits used when generation is disabled.
pub fn digest(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return NO_MATCHES.to_string();
    }
    let mut out = format!("Found {} related error log(s):", hits.len());
    for (i, h) in hits.iter().enumerate() {
        out.push_str(&format!(
            "\n{}. [{}] {}: {} (score {:.3})",
            i + 1,
            h.service,
            h.error_code,
            h.message,
            h.score
        ));
    }
    out
}

pub fn safe_truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        s
    } else {
        let mut end = max;
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        &s[..end]
    }
}
