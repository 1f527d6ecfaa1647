//! Synthetic error-log corpus.
//!
//! Walks a time window minute by minute and emits an `ERROR` log for a
//! random service with a fixed probability. Seeded generators are fully
//! reproducible for the same options.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use tracing::{info, warn};

use crate::record::{LogDocument, LogMetadata};

/// Services and the error codes each one can raise.
pub const SERVICES: [(&str, &[&str]); 4] = [
    ("payment-service", &["PAY_001", "PAY_002", "PAY_003"]),
    ("auth-service", &["AUTH_001", "AUTH_002"]),
    ("order-service", &["ORD_001", "ORD_002", "ORD_003"]),
    ("user-service", &["USR_001", "USR_002"]),
];

/// Fixed message for an error code.
pub fn message_for(code: &str) -> Option<&'static str> {
    Some(match code {
        "PAY_001" => "Failed to process payment transaction",
        "PAY_002" => "Invalid payment method",
        "PAY_003" => "Payment timeout",
        "AUTH_001" => "Invalid credentials",
        "AUTH_002" => "Session expired",
        "ORD_001" => "Order validation failed",
        "ORD_002" => "Inventory not available",
        "ORD_003" => "Order processing timeout",
        "USR_001" => "User not found",
        "USR_002" => "Invalid user data",
        _ => return None,
    })
}

/// Window and density of a generation run.
#[derive(Debug, Clone)]
pub struct SynthOptions {
    /// Exclusive end of the window.
    pub end: DateTime<Utc>,
    pub window: Duration,
    pub step: Duration,
    /// Chance of one log per step.
    pub probability: f64,
}

impl Default for SynthOptions {
    fn default() -> Self {
        Self {
            end: Utc::now(),
            window: Duration::days(7),
            step: Duration::minutes(1),
            probability: 0.1,
        }
    }
}

pub struct LogGenerator {
    rng: fastrand::Rng,
}

impl LogGenerator {
    /// Seeded when `seed` is set, otherwise seeded from the OS.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => fastrand::Rng::with_seed(s),
            None => fastrand::Rng::new(),
        };
        Self { rng }
    }

    /// Logs for every step of `[end - window, end)` that passes the dice roll.
    pub fn generate(&mut self, opts: &SynthOptions) -> Vec<LogDocument> {
        let mut out = Vec::new();
        if opts.step <= Duration::zero() {
            return out;
        }
        let Some(mut t) = opts.end.checked_sub_signed(opts.window) else {
            warn!("synthetic window reaches before the representable range");
            return out;
        };
        while t < opts.end {
            if self.rng.f64() < opts.probability {
                out.push(self.log_at(t));
            }
            t += opts.step;
        }
        info!(count = out.len(), "generated synthetic error logs");
        out
    }

    /// One random log stamped `at`.
    pub fn log_at(&mut self, at: DateTime<Utc>) -> LogDocument {
        let (service, codes) = SERVICES[self.rng.usize(..SERVICES.len())];
        let code = codes[self.rng.usize(..codes.len())];
        LogDocument {
            timestamp: Some(at.to_rfc3339_opts(SecondsFormat::Micros, true)),
            level: Some("ERROR".into()),
            service: service.into(),
            error_code: code.into(),
            message: message_for(code).unwrap_or_default().into(),
            stack_trace: Some(format!(
                "Exception in thread main at {service}.java:{}",
                self.rng.u32(100..=999)
            )),
            correlation_id: Some(format!("txn-{}", self.rng.u32(1000..=9999))),
            user_id: Some(format!("user-{}", self.rng.u32(100..=999))),
            metadata: Some(LogMetadata {
                environment: "production".into(),
                region: "us-west-2".into(),
                version: format!("1.{}.{}", self.rng.u8(0..=9), self.rng.u8(0..=9)),
            }),
            message_embedding: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn opts() -> SynthOptions {
        SynthOptions {
            end: Utc.with_ymd_and_hms(2025, 1, 8, 0, 0, 0).unwrap(),
            ..SynthOptions::default()
        }
    }

    #[test]
    fn same_seed_same_corpus() {
        let a = LogGenerator::new(Some(7)).generate(&opts());
        let b = LogGenerator::new(Some(7)).generate(&opts());
        assert_eq!(a, b);
        // 10080 minutes at p = 0.1
        assert!((700..1400).contains(&a.len()), "{}", a.len());
    }

    #[test]
    fn logs_are_consistent() {
        let end = opts().end;
        for doc in LogGenerator::new(Some(1)).generate(&opts()) {
            assert_eq!(message_for(&doc.error_code), Some(doc.message.as_str()));
            assert!(SERVICES.iter().any(|(s, codes)| *s == doc.service && codes.contains(&doc.error_code.as_str())));
            let ts = doc.timestamp.unwrap();
            assert!(ts.ends_with('Z'));
            let parsed = DateTime::parse_from_rfc3339(&ts).unwrap().with_timezone(&Utc);
            assert!(parsed < end && parsed >= end - Duration::days(7));
            assert!(doc.correlation_id.unwrap().starts_with("txn-"));
        }
    }

    #[test]
    fn zero_probability_yields_nothing() {
        let o = SynthOptions {
            probability: 0.0,
            ..opts()
        };
        assert!(LogGenerator::new(Some(3)).generate(&o).is_empty());
    }

    #[test]
    fn window_past_the_calendar_start_yields_nothing() {
        let o = SynthOptions {
            window: Duration::try_days(200_000_000).unwrap(),
            ..opts()
        };
        assert!(LogGenerator::new(Some(3)).generate(&o).is_empty());
    }
}
