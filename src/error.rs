//! Error taxonomy shared by the gateway, the paginator and the analytics layer.
//!
//! Every upstream failure is reduced to one of five [`ErrorSignal`]s. The signal decides
//! how the failure travels: whether the gateway retries it, whether it opens the circuit,
//! whether the paginator skips the affected resource and whether the analytics surface
//! can degrade gracefully or has to ask the user to sign in again.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Classification of an upstream failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorSignal {
    /// HTTP 429. Retried once, opens the circuit.
    RateLimited,
    /// HTTP 403. Never retried, the caller skips the resource.
    Forbidden,
    /// HTTP 401 or no usable session token. Never retried, requires a new sign in.
    Unauthorized,
    /// Network failures, timeouts and 5xx answers. Retried once.
    Transient,
    /// Malformed responses and requests the upstream will never accept.
    Fatal,
}

impl ErrorSignal {
    /// Maps a numeric HTTP status onto a signal. Unknown codes are treated as transient.
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => ErrorSignal::RateLimited,
            403 => ErrorSignal::Forbidden,
            401 => ErrorSignal::Unauthorized,
            408 => ErrorSignal::Transient,
            400..=499 => ErrorSignal::Fatal,
            _ => ErrorSignal::Transient,
        }
    }

    /// Whether the gateway may spend its single bounded retry on this signal.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorSignal::RateLimited | ErrorSignal::Transient)
    }
}

/// Failure raised by an [`Upstream`](crate::gateway::Upstream) before an HTTP status exists.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no usable session token: {0}")]
    MissingCredentials(String),
    #[error("network failure: {0}")]
    Network(String),
}

impl TransportError {
    pub fn signal(&self) -> ErrorSignal {
        match self {
            TransportError::MissingCredentials(_) => ErrorSignal::Unauthorized,
            TransportError::Network(_) => ErrorSignal::Transient,
        }
    }
}

/// Failure returned by [`Gateway::execute`](crate::gateway::Gateway::execute).
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("upstream call failed ({signal:?}): {message}")]
    Upstream {
        signal: ErrorSignal,
        status: Option<u16>,
        message: String,
    },
    /// The circuit breaker is open; no network I/O was attempted.
    #[error("circuit open after rate limiting, closes in {retry_in:?}")]
    CircuitOpen { retry_in: Duration },
    #[error("call cancelled before completion")]
    Cancelled,
}

impl GatewayError {
    pub fn upstream(signal: ErrorSignal, status: Option<u16>, message: impl Into<String>) -> Self {
        GatewayError::Upstream {
            signal,
            status,
            message: message.into(),
        }
    }

    pub fn from_status(status: u16, body: &str) -> Self {
        Self::upstream(ErrorSignal::from_status(status), Some(status), excerpt(body))
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::upstream(ErrorSignal::Fatal, None, message)
    }

    pub fn signal(&self) -> ErrorSignal {
        match self {
            GatewayError::Upstream { signal, .. } => *signal,
            GatewayError::CircuitOpen { .. } => ErrorSignal::RateLimited,
            GatewayError::Cancelled => ErrorSignal::Fatal,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.signal() == ErrorSignal::Unauthorized
    }
}

impl From<TransportError> for GatewayError {
    fn from(err: TransportError) -> Self {
        GatewayError::upstream(err.signal(), None, err.to_string())
    }
}

fn excerpt(body: &str) -> String {
    const MAX: usize = 200;
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

/// Failure visible to consumers of the analytics surface.
///
/// Everything except an expired or missing session is absorbed into a best-effort payload,
/// so this enum only carries the actionable condition.
#[derive(Debug, Clone, Error)]
pub enum AnalyticsError {
    #[error("session is no longer valid, please sign in again")]
    ReauthenticationRequired,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
    #[error("inconsistent configuration: {0}")]
    Inconsistent(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_signals() {
        assert_eq!(ErrorSignal::from_status(429), ErrorSignal::RateLimited);
        assert_eq!(ErrorSignal::from_status(403), ErrorSignal::Forbidden);
        assert_eq!(ErrorSignal::from_status(401), ErrorSignal::Unauthorized);
        assert_eq!(ErrorSignal::from_status(502), ErrorSignal::Transient);
        assert_eq!(ErrorSignal::from_status(408), ErrorSignal::Transient);
        assert_eq!(ErrorSignal::from_status(404), ErrorSignal::Fatal);
        assert_eq!(ErrorSignal::from_status(999), ErrorSignal::Transient);
        assert_eq!(ErrorSignal::from_status(0), ErrorSignal::Transient);
    }

    #[test]
    fn only_rate_limits_and_transient_failures_are_retryable() {
        assert!(ErrorSignal::RateLimited.is_retryable());
        assert!(ErrorSignal::Transient.is_retryable());
        assert!(!ErrorSignal::Forbidden.is_retryable());
        assert!(!ErrorSignal::Unauthorized.is_retryable());
        assert!(!ErrorSignal::Fatal.is_retryable());
    }

    #[test]
    fn open_circuit_reads_as_rate_limited() {
        let err = GatewayError::CircuitOpen {
            retry_in: Duration::from_secs(3),
        };
        assert_eq!(err.signal(), ErrorSignal::RateLimited);
    }

    #[test]
    fn long_bodies_are_shortened() {
        let body = "x".repeat(500);
        let err = GatewayError::from_status(500, &body);
        match err {
            GatewayError::Upstream { message, .. } => assert_eq!(message.len(), 203),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
