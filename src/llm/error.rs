//! Error taxonomy for generation calls and the retry policy built on it.

use std::time::Duration;

use thiserror::Error;

/// How an HTTP status from the provider should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    /// 429 / 503: the provider is busy, try again later.
    Busy,
    /// Anything else that is not a success. Never retried.
    Terminal,
}

/// Classify a provider HTTP status code.
pub fn classify_http_status(status: u16) -> StatusClass {
    match status {
        200..=299 => StatusClass::Success,
        429 | 503 => StatusClass::Busy,
        _ => StatusClass::Terminal,
    }
}

/// Failure of a single generation call.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Transport-level failure (connect, timeout, reset).
    #[error("network error calling the generation API: {0}")]
    Network(String),

    /// Provider answered 429 or 503.
    #[error("generation API is overloaded (status {status}): {body}")]
    Overloaded { status: u16, body: String },

    /// Provider answered with any other non-success status.
    #[error("generation API error (status {status}): {body}")]
    Remote { status: u16, body: String },

    /// Generation ended for a reason other than a normal stop or the length
    /// limit, and produced no text.
    #[error("text generation was stopped early by the API. Reason: {0}")]
    StoppedAbnormally(String),

    #[error("no content found in the generation API response")]
    EmptyResponse,

    /// A 2xx body that is not the provider's response wrapper.
    #[error("could not decode the generation API response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    /// Whether another attempt may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, LlmError::Network(_) | LlmError::Overloaded { .. })
    }

    /// Build the error for a non-success status.
    pub fn from_status(status: u16, body: String) -> Self {
        match classify_http_status(status) {
            StatusClass::Busy => LlmError::Overloaded { status, body },
            _ => LlmError::Remote { status, body },
        }
    }
}

/// Bounded exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles after each further one.
    pub initial_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryConfig {
    /// Delay to wait after the given failed attempt (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1u32 << exp)
    }

    /// Whether `error` on `attempt` (1-based) warrants another attempt.
    pub fn should_retry(&self, error: &LlmError, attempt: u32) -> bool {
        error.is_transient() && attempt < self.max_attempts
    }
}
