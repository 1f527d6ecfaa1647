//! Timeouts and the bounded retry loop shared by every outbound client.

use std::{fmt::Display, future::Future, time::Duration};

use reqwest::StatusCode;
use tracing::warn;

use crate::errors::AwsError;

/// Connect/read budget plus the number of attempts per call.
///
/// There is no overall deadline: `read_timeout` bounds each read, so a
/// streamed body may run as long as chunks keep arriving.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HttpPolicy {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Linear back-off unit between attempts.
    pub backoff: Duration,
    pub replay: Replay,
}

/// When a failed attempt may be sent again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Replay {
    /// Reads and idempotent writes: transient transport errors and
    /// retryable statuses.
    Safe,
    /// Non-idempotent writes: only when the connection was never
    /// established, so the server cannot have seen the request.
    ConnectOnly,
}

impl Default for HttpPolicy {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(30),
            max_attempts: 2,
            backoff: Duration::from_millis(250),
            replay: Replay::Safe,
        }
    }
}

impl HttpPolicy {
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Same budget, replayed only on connect failures.
    pub fn for_writes(mut self) -> Self {
        self.replay = Replay::ConnectOnly;
        self
    }

    fn may_retry<E: Transient>(&self, err: &E) -> bool {
        match self.replay {
            Replay::Safe => err.is_transient(),
            Replay::ConnectOnly => err.is_connect(),
        }
    }

    /// Client builder preloaded with this policy's timeouts.
    pub fn client_builder(&self) -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .read_timeout(self.read_timeout)
    }

    pub fn build_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        self.client_builder().build()
    }
}

/// Errors that may succeed on a second attempt.
pub trait Transient {
    fn is_transient(&self) -> bool;

    /// The request never reached the server.
    fn is_connect(&self) -> bool {
        false
    }
}

impl Transient for reqwest::Error {
    fn is_transient(&self) -> bool {
        self.is_timeout() || self.is_connect()
    }

    fn is_connect(&self) -> bool {
        reqwest::Error::is_connect(self)
    }
}

impl Transient for AwsError {
    fn is_transient(&self) -> bool {
        match self {
            AwsError::Transport(e) => e.is_transient(),
            _ => false,
        }
    }

    fn is_connect(&self) -> bool {
        matches!(self, AwsError::Transport(e) if Transient::is_connect(e))
    }
}

/// Throttling and gateway-side failures.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::INTERNAL_SERVER_ERROR
        || status == StatusCode::BAD_GATEWAY
        || status == StatusCode::SERVICE_UNAVAILABLE
        || status == StatusCode::GATEWAY_TIMEOUT
}

/// Runs `op` up to `policy.max_attempts` times.
///
/// `op` receives the 1-based attempt number and must build (and sign) a fresh
/// request each time. A retryable status on the last attempt is returned to
/// the caller as-is so it can report the upstream error. Under
/// [`Replay::ConnectOnly`] statuses and timeouts are never retried.
pub async fn send_with_retry<F, Fut, E>(
    policy: &HttpPolicy,
    label: &str,
    mut op: F,
) -> Result<reqwest::Response, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<reqwest::Response, E>>,
    E: Transient + Display,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(resp)
                if attempt < attempts
                    && policy.replay == Replay::Safe
                    && is_retryable_status(resp.status()) =>
            {
                warn!(
                    call = label,
                    attempt,
                    status = %resp.status(),
                    "retryable upstream status"
                );
            }
            Ok(resp) => return Ok(resp),
            Err(err) if attempt < attempts && policy.may_retry(&err) => {
                warn!(call = label, attempt, error = %err, "transient transport error");
            }
            Err(err) => return Err(err),
        }
        tokio::time::sleep(policy.backoff * attempt).await;
        attempt += 1;
    }
}
