//! Model-proxy error types with retry classification.
//!
//! Only rate limits (429) are transient here: any other non-2xx response from
//! the proxy is an upstream failure surfaced verbatim, never retried.

use std::time::Duration;

/// Error from model-proxy calls.
#[derive(Debug)]
pub struct LlmError {
    /// The kind of error
    pub kind: LlmErrorKind,
    /// HTTP status code, if applicable
    pub status_code: Option<u16>,
    /// Error message
    pub message: String,
    /// Suggested retry delay (from Retry-After header, when present)
    pub retry_after: Option<Duration>,
}

impl LlmError {
    /// Create a rate limit error.
    pub fn rate_limited(message: String, retry_after: Option<Duration>) -> Self {
        Self {
            kind: LlmErrorKind::RateLimited,
            status_code: Some(429),
            message,
            retry_after,
        }
    }

    /// Create an upstream failure (non-2xx, non-429).
    pub fn upstream(status_code: u16, message: String) -> Self {
        Self {
            kind: LlmErrorKind::Upstream,
            status_code: Some(status_code),
            message,
            retry_after: None,
        }
    }

    /// Create a network error.
    pub fn network_error(message: String) -> Self {
        Self {
            kind: LlmErrorKind::NetworkError,
            status_code: None,
            message,
            retry_after: None,
        }
    }

    /// Create a parse error.
    pub fn parse_error(message: String) -> Self {
        Self {
            kind: LlmErrorKind::ParseError,
            status_code: None,
            message,
            retry_after: None,
        }
    }

    /// Check if this error is transient and should be retried.
    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }

    /// Get the suggested delay before retry.
    ///
    /// Returns the `retry_after` if set, otherwise an exponential backoff based
    /// on the attempt number.
    pub fn suggested_delay(&self, attempt: u32) -> Duration {
        if let Some(retry_after) = self.retry_after {
            return retry_after;
        }

        // Exponential backoff: base * 2^attempt, capped at 60 seconds
        let base_delay = Duration::from_secs(1);
        let multiplier = 2u64.saturating_pow(attempt);
        let delay_secs = base_delay.as_secs().saturating_mul(multiplier).min(60);

        Duration::from_secs(delay_secs)
    }
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} (HTTP {}): {}", self.kind, code, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for LlmError {}

/// Classification of model-proxy errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Rate limited (429) - transient, retried with backoff up to the attempt ceiling
    RateLimited,
    /// Any other non-2xx response - permanent, surfaced verbatim
    Upstream,
    /// Network error (connection failed, timeout) - permanent here; the user retries the action
    NetworkError,
    /// Response parsing error - permanent
    ParseError,
}

impl LlmErrorKind {
    /// Check if this error kind is transient (should retry).
    pub fn is_transient(&self) -> bool {
        matches!(self, LlmErrorKind::RateLimited)
    }
}

impl std::fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmErrorKind::RateLimited => write!(f, "Rate limited"),
            LlmErrorKind::Upstream => write!(f, "Upstream failure"),
            LlmErrorKind::NetworkError => write!(f, "Network error"),
            LlmErrorKind::ParseError => write!(f, "Parse error"),
        }
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts for rate-limited requests
    pub max_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries: 3 }
    }
}

impl RetryConfig {
    /// Check if the given error should be retried at the given attempt number.
    pub fn should_retry(&self, error: &LlmError, attempt: u32) -> bool {
        error.is_transient() && attempt < self.max_retries
    }
}

/// Parse HTTP status code into error kind.
pub fn classify_http_status(status: u16) -> LlmErrorKind {
    match status {
        429 => LlmErrorKind::RateLimited,
        _ => LlmErrorKind::Upstream,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_rate_limits_are_transient() {
        assert!(LlmErrorKind::RateLimited.is_transient());
        assert!(!LlmErrorKind::Upstream.is_transient());
        assert!(!LlmErrorKind::NetworkError.is_transient());
        assert!(!LlmErrorKind::ParseError.is_transient());
    }

    #[test]
    fn http_status_classification() {
        assert_eq!(classify_http_status(429), LlmErrorKind::RateLimited);
        assert_eq!(classify_http_status(500), LlmErrorKind::Upstream);
        assert_eq!(classify_http_status(400), LlmErrorKind::Upstream);
        assert_eq!(classify_http_status(401), LlmErrorKind::Upstream);
    }

    #[test]
    fn exponential_backoff_doubles_and_caps() {
        let error = LlmError::rate_limited("test".to_string(), None);

        assert!(error.suggested_delay(1) > error.suggested_delay(0));
        assert!(error.suggested_delay(2) > error.suggested_delay(1));
        assert!(error.suggested_delay(10).as_secs() <= 60);
    }

    #[test]
    fn retry_after_respected() {
        let error = LlmError::rate_limited("test".to_string(), Some(Duration::from_secs(30)));

        assert_eq!(error.suggested_delay(0), Duration::from_secs(30));
        assert_eq!(error.suggested_delay(5), Duration::from_secs(30));
    }

    #[test]
    fn retry_ceiling_enforced() {
        let config = RetryConfig { max_retries: 2 };
        let rate_limited = LlmError::rate_limited("test".to_string(), None);
        let upstream = LlmError::upstream(500, "boom".to_string());

        assert!(config.should_retry(&rate_limited, 0));
        assert!(config.should_retry(&rate_limited, 1));
        assert!(!config.should_retry(&rate_limited, 2));
        assert!(!config.should_retry(&upstream, 0));
    }
}
