//! Process-wide `tracing` subscriber shared by every binary in the workspace.
//!
//! - RFC 3339 UTC timestamps (`2025-09-12T10:20:30Z`)
//! - `RUST_LOG` filter, falling back to the caller's default
//! - `LOG_FORMAT=json` switches to one JSON object per line
//! - ANSI colours only when stdout is a terminal

use std::io::{self, IsTerminal};

use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt};

/// Output flavour selected by `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// Anything other than `json` (case-insensitive) is plain text.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }

    pub fn from_env() -> Self {
        Self::parse(std::env::var("LOG_FORMAT").ok().as_deref())
    }
}

#[derive(Clone, Debug, Default)]
struct ChronoRfc3339Utc;

impl FormatTime for ChronoRfc3339Utc {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = chrono::Utc::now();
        w.write_str(&now.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
    }
}

/// Installs the global subscriber. Call once, early in `main`.
///
/// `default_filter` is used when `RUST_LOG` is unset or invalid, e.g.
/// `"info,ai_llm_service=debug"`.
pub fn init(default_filter: &str) -> Result<(), TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let (text, json) = match LogFormat::from_env() {
        LogFormat::Json => (
            None,
            Some(
                fmt::layer()
                    .json()
                    .with_timer(ChronoRfc3339Utc)
                    .with_current_span(true)
                    .with_target(true),
            ),
        ),
        LogFormat::Text => (
            Some(
                fmt::layer()
                    .compact()
                    .with_timer(ChronoRfc3339Utc)
                    .with_target(true)
                    .with_ansi(io::stdout().is_terminal()),
            ),
            None,
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .try_init()
}
