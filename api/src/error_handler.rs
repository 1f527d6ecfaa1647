use ai_llm_service::AiLlmError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use contextor::ContextorError;
use rag_store::RagError;
use serde::Serialize;
use services::AwsError;
use thiserror::Error;
use tracing::error;

/// Public application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // --- Boot / config ---
    #[error(transparent)]
    Llm(#[from] AiLlmError),

    #[error(transparent)]
    Store(#[from] RagError),

    #[error(transparent)]
    Aws(#[from] AwsError),

    // --- IO / network / server ---
    #[error("failed to bind listener on {addr}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error")]
    Server(#[source] std::io::Error),

    // --- Request ---
    #[error(transparent)]
    Query(#[from] ContextorError),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Query(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            // startup-only
            AppError::Llm(_) | AppError::Store(_) | AppError::Aws(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Bind { .. } | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            AppError::Query(e) => e.category(),
            _ => "internal_error",
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            AppError::Query(e) => e.public_message(),
            _ => "Internal server error",
        }
    }
}

/// Error body: a one-line message and its category, nothing from upstream.
#[derive(Serialize)]
pub struct ErrorBody<'a> {
    pub error: &'a str,
    pub category: &'a str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(%status, category = self.category(), error = %self, "request failed");
        }
        let body = ErrorBody {
            error: self.public_message(),
            category: self.category(),
        };
        (status, Json(body)).into_response()
    }
}

/// Handy result alias used across handlers.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn body_carries_category_only() {
        let err = AppError::from(ContextorError::Search(RagError::Http {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            url: "https://abc.us-west-2.aoss.amazonaws.com/error-logs-mock/_search".into(),
            snippet: "boom".into(),
        }));
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["category"], "search_failed");
        assert!(!v.to_string().contains("aoss.amazonaws.com"));
    }
}
