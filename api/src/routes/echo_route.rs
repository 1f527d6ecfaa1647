use axum::Json;
use serde_json::{Value, json};

pub const ECHO_MESSAGE: &str = "Hello from the future RAG service!";

/// GET /echo
pub async fn echo() -> Json<Value> {
    Json(json!({ "message": ECHO_MESSAGE }))
}
