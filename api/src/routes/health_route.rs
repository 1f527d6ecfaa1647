//! GET /health — model probes plus the index document count.

use std::{sync::Arc, time::Instant};

use axum::{Json, extract::State};
use serde::Serialize;
use tracing::warn;

use crate::core::app_state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthCheck {
    pub component: String,
    pub ok: bool,
    pub latency_ms: u128,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    /// `healthy` when every check passed, `degraded` otherwise.
    pub status: &'static str,
    pub checks: Vec<HealthCheck>,
}

/// Always answers 200; failures only degrade the status.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthReport> {
    let mut checks: Vec<HealthCheck> = state
        .pipeline
        .llm()
        .health_all()
        .await
        .into_iter()
        .map(|s| HealthCheck {
            component: match &s.model {
                Some(m) => format!("{}:{m}", s.provider),
                None => s.provider.clone(),
            },
            ok: s.ok,
            latency_ms: s.latency_ms,
            message: s.message,
        })
        .collect();

    let started = Instant::now();
    let store = state.pipeline.store();
    let index_check = match store.count().await {
        Ok(n) => HealthCheck {
            component: format!("index:{}", store.config().index),
            ok: true,
            latency_ms: started.elapsed().as_millis(),
            message: format!("{n} documents"),
        },
        Err(e) => {
            warn!(error = %e, "index health check failed");
            HealthCheck {
                component: format!("index:{}", store.config().index),
                ok: false,
                latency_ms: started.elapsed().as_millis(),
                message: if e.is_not_found() {
                    "index not found".into()
                } else {
                    "index unreachable".into()
                },
            }
        }
    };
    checks.push(index_check);

    let status = if checks.iter().all(|c| c.ok) { "healthy" } else { "degraded" };
    Json(HealthReport { status, checks })
}
