//! Upstream call outcomes and the bounded-retry policy.
//!
//! Both LLM-backed capabilities (summarizer, embedder) talk to
//! request/response HTTP services that fail in two distinct ways: transient
//! (timeout, 429, 5xx) and fatal (malformed request, unsupported input).
//! Modeling the distinction as a tagged error lets the retry policy be a
//! pure decision function instead of status-code checks scattered through
//! provider code.
//!
//! Retry strategy (shared by all providers):
//! - transient errors retry with exponential backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped)
//! - fatal errors fail immediately, no retry
//! - an exhausted retry budget becomes [`UpstreamError::Exhausted`]

use std::time::Duration;

use thiserror::Error;

/// Outcome of an upstream request, tagged for the retry policy.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Timeout, rate limit, or 5xx-class response. Eligible for retry.
    #[error("transient upstream error: {0}")]
    Transient(String),
    /// Malformed request or non-retryable rejection. Never retried.
    #[error("upstream request rejected: {0}")]
    Fatal(String),
    /// The bounded retry budget ran out; carries the last transient failure.
    #[error("upstream unavailable after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

impl UpstreamError {
    pub fn is_transient(&self) -> bool {
        matches!(self, UpstreamError::Transient(_))
    }

    /// Classify an HTTP error response. 429 and 5xx are transient; any
    /// other non-success status is fatal.
    pub fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        if status.as_u16() == 429 || status.is_server_error() {
            UpstreamError::Transient(format!("HTTP {}: {}", status, body))
        } else {
            UpstreamError::Fatal(format!("HTTP {}: {}", status, body))
        }
    }

    /// Classify a request-level failure (connect error, timeout). These are
    /// always worth retrying.
    pub fn from_request_error(err: reqwest::Error) -> Self {
        UpstreamError::Transient(err.to_string())
    }
}

/// Decide whether another attempt should be made after a failure.
/// `attempts_made` counts attempts already performed (>= 1).
pub fn should_retry(err: &UpstreamError, attempts_made: u32, max_retries: u32) -> bool {
    err.is_transient() && attempts_made <= max_retries
}

/// Delay before retry attempt `attempt` (1-based): 1s, 2s, 4s, ... capped
/// at 2^5 seconds.
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.saturating_sub(1).min(5))
}

/// Fold the final failure of a retry loop into the surfaced error: transient
/// failures become [`UpstreamError::Exhausted`], fatal ones pass through.
pub fn exhausted(err: UpstreamError, attempts: u32) -> UpstreamError {
    match err {
        UpstreamError::Transient(last) => UpstreamError::Exhausted { attempts, last },
        other => other,
    }
}
