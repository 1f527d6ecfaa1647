//! POST /submit_query — answers a question from the error-log index.

use std::{convert::Infallible, sync::Arc};

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{
        IntoResponse, Response,
        sse::{Event, Sse},
    },
};
use contextor::{AnswerStream, AskOptions, ContextorError};
use futures::{Stream, StreamExt, stream};
use serde_json::json;
use services::sse::DONE_MARKER;
use tracing::{info, warn};

use crate::{
    core::app_state::AppState, error_handler::AppResult,
    routes::submit_query::submit_query_request::SubmitQueryRequest,
};

/// Handler: POST /submit_query
///
/// # Example
/// ```bash
/// curl -N -X POST http://127.0.0.1:5000/submit_query \
///   -H 'content-type: application/json' -H 'accept: text/event-stream' \
///   -d '{"query":"Show me the timeout errors"}'
/// ```
pub async fn submit_query(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Response> {
    let req = SubmitQueryRequest::parse(&body)?;
    let opts = AskOptions { top_k: req.k };

    if req.wants_stream(&headers) {
        let answer = state.pipeline.ask_stream(&req.query, opts).await?;
        info!(documents = answer.similar_documents.len(), "streaming answer");
        return Ok(Sse::new(sse_frames(answer.fragments)).into_response());
    }

    let qa = state.pipeline.ask(&req.query, opts).await?;
    Ok(Json(qa).into_response())
}

/// Delta frames, then `[DONE]`; a failure becomes one `error` event and
/// ends the stream without `[DONE]`.
fn sse_frames(fragments: AnswerStream) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(Some(fragments), |state| async move {
        let mut fragments = state?;
        let event = match fragments.next().await {
            Some(Ok(text)) => return Some((Ok(delta_event(&text)), Some(fragments))),
            Some(Err(e)) => error_event(&e),
            None => Event::default().data(DONE_MARKER),
        };
        Some((Ok(event), None))
    })
}

fn delta_event(text: &str) -> Event {
    Event::default().data(json!({ "choices": [{ "delta": { "content": text } }] }).to_string())
}

fn error_event(e: &ContextorError) -> Event {
    warn!(category = e.category(), error = %e, "stream aborted");
    Event::default()
        .event("error")
        .data(json!({ "error": e.public_message(), "category": e.category() }).to_string())
}
