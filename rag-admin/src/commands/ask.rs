//! Client for `POST /submit_query`, one-shot or interactive.

use std::io::{self, Write};

use anyhow::{Context, anyhow, bail};
use contextor::QaAnswer;
use dialoguer::Input;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{Value, json};
use services::sse::sse_events;
use tracing::debug;

/// Offered in interactive mode; typing the number sends the prompt.
pub const DEFAULT_PROMPTS: [&str; 3] = [
    "What are the user authentication failed errors?",
    "Show me the payment transaction failed errors",
    "Show me the timeout errors",
];

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    category: Option<String>,
}

pub struct AskClient {
    http: reqwest::Client,
    url: String,
}

impl AskClient {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("cannot build HTTP client")?;
        Ok(Self { http, url: url.into() })
    }

    /// Sends one question and writes the answer to `out` as it arrives.
    pub async fn ask<W: Write>(&self, query: &str, stream: bool, out: &mut W) -> anyhow::Result<()> {
        let accept = if stream { "text/event-stream" } else { "application/json" };
        let resp = self
            .http
            .post(&self.url)
            .header(ACCEPT, accept)
            .json(&json!({ "query": query }))
            .send()
            .await
            .with_context(|| format!("cannot reach {}", self.url))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<ErrorBody>(&text) {
                Ok(body) => anyhow!(
                    "{} ({}): {}",
                    status,
                    body.category.as_deref().unwrap_or("unknown"),
                    body.error
                ),
                Err(_) => anyhow!("{status}: {text}"),
            });
        }

        let is_sse = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/event-stream"));
        if is_sse {
            write_stream(resp, out).await
        } else {
            let answer: QaAnswer = resp.json().await.context("malformed answer")?;
            out.write_all(render_answer(&answer).as_bytes())?;
            Ok(())
        }
    }
}

async fn write_stream<W: Write>(resp: reqwest::Response, out: &mut W) -> anyhow::Result<()> {
    let mut events = Box::pin(sse_events(resp.bytes_stream()));
    while let Some(event) = events.next().await {
        let event = event.context("answer stream interrupted")?;
        if event.event.as_deref() == Some("error") {
            writeln!(out)?;
            let body: ErrorBody = serde_json::from_str(&event.data)
                .unwrap_or(ErrorBody { error: event.data.clone(), category: None });
            bail!(
                "server aborted the answer ({}): {}",
                body.category.as_deref().unwrap_or("unknown"),
                body.error
            );
        }
        if event.is_done() {
            writeln!(out)?;
            return Ok(());
        }
        match delta_content(&event.data) {
            Some(text) => {
                out.write_all(text.as_bytes())?;
                out.flush()?;
            }
            None => debug!(data = %event.data, "ignoring frame without content"),
        }
    }
    bail!("answer stream ended before completion")
}

fn delta_content(data: &str) -> Option<String> {
    let v: Value = serde_json::from_str(data).ok()?;
    v["choices"][0]["delta"]["content"].as_str().map(str::to_string)
}

pub fn render_answer(answer: &QaAnswer) -> String {
    let mut out = format!("{}\n", answer.answer.trim_end());
    if !answer.similar_documents.is_empty() {
        out.push_str("\nsimilar documents:\n");
        for hit in &answer.similar_documents {
            out.push_str(&format!(
                "  [{}] {} {} (score {:.3})\n",
                hit.service, hit.error_code, hit.message, hit.score
            ));
        }
    }
    out.push_str(&format!("({:.2}s)\n", answer.processing_time_seconds));
    out
}

/// `"1"`..`"3"` pick a default prompt; anything else is sent as typed.
pub fn resolve_input(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    let picked = input
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| DEFAULT_PROMPTS.get(i));
    Some(picked.map_or_else(|| input.to_string(), |p| p.to_string()))
}

pub async fn run(url: &str, query: Option<String>, stream: bool) -> anyhow::Result<()> {
    let client = AskClient::new(url)?;
    let mut stdout = io::stdout();

    if let Some(q) = query {
        let q = resolve_input(&q).context("query must not be empty")?;
        return client.ask(&q, stream, &mut stdout).await;
    }

    println!("Ask about the error logs. Empty input exits.");
    for (i, p) in DEFAULT_PROMPTS.iter().enumerate() {
        println!("  {}. {p}", i + 1);
    }
    loop {
        let line: String = Input::new()
            .with_prompt("question")
            .allow_empty(true)
            .interact_text()?;
        let Some(q) = resolve_input(&line) else {
            return Ok(());
        };
        println!("> {q}");
        if let Err(e) = client.ask(&q, stream, &mut stdout).await {
            eprintln!("error: {e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sse(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/event-stream")
    }

    #[test]
    fn numbers_pick_default_prompts() {
        assert_eq!(resolve_input("2").as_deref(), Some(DEFAULT_PROMPTS[1]));
        assert_eq!(resolve_input(" 4 ").as_deref(), Some("4"));
        assert_eq!(resolve_input("0").as_deref(), Some("0"));
        assert_eq!(resolve_input("why?").as_deref(), Some("why?"));
        assert_eq!(resolve_input("   "), None);
    }

    #[tokio::test]
    async fn streams_deltas_until_done() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/submit_query"))
            .and(header("accept", "text/event-stream"))
            .and(body_json(json!({ "query": "timeouts" })))
            .respond_with(sse(concat!(
                "data: {\"choices\":[{\"delta\":{\"content\":\"Pay\"}}]}\n\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"ments\"}}]}\n\n",
                "data: [DONE]\n\n",
            )))
            .mount(&server)
            .await;

        let client = AskClient::new(format!("{}/submit_query", server.uri())).unwrap();
        let mut out = Vec::new();
        client.ask("timeouts", true, &mut out).await.unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Payments\n");
    }

    #[tokio::test]
    async fn error_event_fails_the_question() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(sse(concat!(
                "data: {\"choices\":[{\"delta\":{\"content\":\"Pa\"}}]}\n\n",
                "event: error\n",
                "data: {\"error\":\"upstream unavailable\",\"category\":\"generation_failed\"}\n\n",
            )))
            .mount(&server)
            .await;

        let client = AskClient::new(server.uri()).unwrap();
        let mut out = Vec::new();
        let err = client.ask("q", true, &mut out).await.unwrap_err();
        assert!(err.to_string().contains("generation_failed"), "{err}");
        assert!(String::from_utf8(out).unwrap().starts_with("Pa"));
    }

    #[tokio::test]
    async fn stream_without_done_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(sse("data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n\n"))
            .mount(&server)
            .await;

        let client = AskClient::new(server.uri()).unwrap();
        let err = client.ask("q", true, &mut Vec::new()).await.unwrap_err();
        assert!(err.to_string().contains("before completion"));
    }

    #[tokio::test]
    async fn error_status_reports_category() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "missing query parameter",
                "category": "missing_query"
            })))
            .mount(&server)
            .await;

        let client = AskClient::new(server.uri()).unwrap();
        let err = client.ask("q", false, &mut Vec::new()).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("400") && msg.contains("missing_query"), "{msg}");
    }

    #[tokio::test]
    async fn json_answer_lists_documents() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": "q",
                "answer": "Payments time out.",
                "similar_documents": [
                    { "score": 0.9, "message": "Payment timeout", "service": "payment-service", "error_code": "PAY_003" }
                ],
                "processing_time_seconds": 0.25
            })))
            .mount(&server)
            .await;

        let client = AskClient::new(server.uri()).unwrap();
        let mut out = Vec::new();
        client.ask("q", false, &mut out).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Payments time out.\n"));
        assert!(text.contains("[payment-service] PAY_003 Payment timeout (score 0.900)"));
        assert!(text.ends_with("(0.25s)\n"));
    }
}
