use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::{Instrument, info_span};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request id carried in request extensions for handlers.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Non-blank inbound id, or a fresh `req-{nanos}`.
fn ensure_request_id(req: &Request<Body>) -> String {
    if let Some(v) = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return v.to_string();
    }
    let nanos = Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_else(|| Utc::now().timestamp_micros() * 1000);
    format!("req-{nanos}")
}

/// Propagates or assigns `X-Request-Id` and scopes the handler's logs to it.
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let id = ensure_request_id(&req);
    req.extensions_mut().insert(RequestId(id.clone()));

    let span = info_span!("request", request_id = %id, method = %req.method(), path = %req.uri().path());
    let mut res = next.run(req).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&id) {
        res.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    res
}
