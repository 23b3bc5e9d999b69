//! Fallback decision policy.
//!
//! A failed primary call switches the session to the fallback transport
//! only when the error message matches one of [`CRITICAL_PATTERNS`]
//! (case-insensitive substring match). Everything else propagates to the
//! caller unchanged.
//!
//! Status polling has its own, stricter rule: it never falls back.

use tracing::{debug, warn};

use crate::error::TransportError;

/// Error message fragments that mean the primary backend is unusable.
pub const CRITICAL_PATTERNS: &[&str] = &[
    "network error",
    "connection refused",
    "timeout",
    "cors",
    "unauthorized",
    "forbidden",
    "internal server error",
    "service unavailable",
];

/// Returns true if `message` names a critical failure.
pub fn is_critical(message: &str) -> bool {
    let message = message.to_lowercase();
    CRITICAL_PATTERNS
        .iter()
        .any(|pattern| message.contains(pattern))
}

/// Decides whether a failed primary call should switch to fallback.
///
/// `operation` is only used for logging.
pub fn should_fallback(error: &TransportError, operation: &str) -> bool {
    let critical = is_critical(&error.message);
    if critical {
        warn!(operation, error = %error, "Primary backend failed critically, switching to fallback");
    } else {
        debug!(operation, error = %error, "Primary backend error is not critical");
    }
    critical
}

/// How a status poll failure is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollFailure {
    /// The task is not visible yet; retry silently.
    NotYetVisible,
    /// Any other failure; recorded and retried.
    Retryable,
}

/// Classifies a status poll failure. Never triggers a fallback.
pub fn classify_poll_error(error: &TransportError) -> PollFailure {
    if error.is_not_found() {
        PollFailure::NotYetVisible
    } else {
        PollFailure::Retryable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportErrorKind;

    fn http(status: u16, message: &str) -> TransportError {
        TransportError::new(TransportErrorKind::Http { status }, message)
    }

    #[test]
    fn test_critical_patterns_match_case_insensitively() {
        assert!(is_critical("Connection refused (os error 111)"));
        assert!(is_critical("HTTP 503 Service Unavailable: busy"));
        assert!(is_critical("request TIMEOUT after 30s"));
        assert!(is_critical("blocked by CORS policy"));
        assert!(is_critical("HTTP 401 Unauthorized: "));
        assert!(is_critical("HTTP 403 Forbidden: "));
        assert!(is_critical("HTTP 500 Internal Server Error: boom"));
    }

    #[test]
    fn test_non_critical_errors_do_not_fall_back() {
        assert!(!should_fallback(&http(400, "bad request"), "create wallet"));
        assert!(!should_fallback(&http(422, "HTTP 422 Unprocessable Entity: description too short"), "start generate"));
        assert!(!should_fallback(&TransportError::decode("expected value"), "list projects"));
    }

    #[test]
    fn test_timeout_on_create_wallet_falls_back() {
        let err = TransportError::timeout("operation timed out");
        assert!(should_fallback(&err, "create wallet"));
    }

    #[test]
    fn test_network_constructor_is_critical() {
        assert!(should_fallback(&TransportError::network("dns failure"), "deploy"));
    }

    #[test]
    fn test_poll_not_found_is_not_yet_visible() {
        let err = TransportError::not_found("task t-1");
        assert_eq!(classify_poll_error(&err), PollFailure::NotYetVisible);
        let err = TransportError::network("connection refused");
        assert_eq!(classify_poll_error(&err), PollFailure::Retryable);
    }
}
