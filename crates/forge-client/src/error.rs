//! Error types for the forge client.
//!
//! Two layers:
//! - [`TransportError`]: a single request to a backend failed (network,
//!   timeout, HTTP status, not found, undecodable body). Its message text is
//!   part of the contract: the fallback policy pattern-matches on it.
//! - [`ClientError`]: what orchestrator operations return to callers.
//!
//! **Panic-Free Policy:** No `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()`, or `todo!()` outside tests.

use std::io;

use forge_core::{DomainError, ProjectId};
use thiserror::Error;

use crate::session::SessionConfig;

/// Longest response body excerpt kept in an error message.
const MAX_BODY_EXCERPT: usize = 200;

// ============================================================================
// Transport Error
// ============================================================================

/// Broad category of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection could not be made or was dropped.
    Network,
    /// The request did not complete in time.
    Timeout,
    /// The backend answered with a non-2xx status other than 404.
    Http { status: u16 },
    /// The requested resource does not exist (yet).
    NotFound,
    /// The response body could not be decoded.
    Decode,
}

/// A failed request to a backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(detail: impl std::fmt::Display) -> Self {
        Self::new(TransportErrorKind::Network, format!("network error: {detail}"))
    }

    pub fn timeout(detail: impl std::fmt::Display) -> Self {
        Self::new(TransportErrorKind::Timeout, format!("timeout: {detail}"))
    }

    pub fn not_found(detail: impl std::fmt::Display) -> Self {
        Self::new(TransportErrorKind::NotFound, format!("not found: {detail}"))
    }

    pub fn decode(detail: impl std::fmt::Display) -> Self {
        Self::new(TransportErrorKind::Decode, format!("invalid response: {detail}"))
    }

    /// Builds the error for a non-2xx response.
    ///
    /// The canonical reason phrase ("Service Unavailable", ...) is kept in
    /// the message. A 404 becomes [`TransportErrorKind::NotFound`].
    pub fn from_status(status: u16, reason: Option<&str>, body: &str) -> Self {
        let excerpt: String = body.trim().chars().take(MAX_BODY_EXCERPT).collect();
        let reason = reason.unwrap_or("Unknown Status");
        if status == 404 {
            return Self::not_found(format!("HTTP 404 {reason}: {excerpt}"));
        }
        Self::new(
            TransportErrorKind::Http { status },
            format!("HTTP {status} {reason}: {excerpt}"),
        )
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind == TransportErrorKind::NotFound
    }
}

// ============================================================================
// Client Error
// ============================================================================

/// Errors returned by orchestrator operations.
#[derive(Error, Debug)]
pub enum ClientError {
    /// A backend call failed and the failure did not warrant a fallback.
    #[error("{0}")]
    Transport(#[from] TransportError),

    /// The primary backend failed critically and the retry against the
    /// fallback backend failed too.
    ///
    /// `session` is already switched to fallback; callers should adopt it.
    #[error("{operation} failed on the fallback backend: {source}")]
    FallbackFailed {
        operation: String,
        source: TransportError,
        session: SessionConfig,
    },

    /// The operation needs a connected wallet.
    #[error("No wallet connected; connect a wallet first")]
    NoCurrentUser,

    /// No project with this id in the local collection.
    #[error("Project not found: {0}")]
    ProjectNotFound(ProjectId),

    /// Invalid domain input (e.g. malformed wallet address).
    #[error("Invalid input: {0}")]
    Domain(#[from] DomainError),

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error passthrough.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error passthrough.
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// Returns the switched session carried by a fallback failure.
    pub fn switched_session(&self) -> Option<&SessionConfig> {
        match self {
            Self::FallbackFailed { session, .. } => Some(session),
            _ => None,
        }
    }
}

/// Convenience Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_keeps_reason_phrase() {
        let err = TransportError::from_status(503, Some("Service Unavailable"), "  busy ");
        assert_eq!(err.kind, TransportErrorKind::Http { status: 503 });
        assert_eq!(err.message, "HTTP 503 Service Unavailable: busy");
    }

    #[test]
    fn test_from_status_404_is_not_found() {
        let err = TransportError::from_status(404, Some("Not Found"), "");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_from_status_truncates_body() {
        let body = "x".repeat(1000);
        let err = TransportError::from_status(500, Some("Internal Server Error"), &body);
        assert!(err.message.len() < 300);
    }

    #[test]
    fn test_constructor_prefixes() {
        assert_eq!(TransportError::network("refused").to_string(), "network error: refused");
        assert_eq!(TransportError::timeout("30s").to_string(), "timeout: 30s");
        assert!(TransportError::decode("eof").to_string().starts_with("invalid response"));
    }

    #[test]
    fn test_client_error_display() {
        assert_eq!(
            ClientError::NoCurrentUser.to_string(),
            "No wallet connected; connect a wallet first"
        );
        let err: ClientError = TransportError::timeout("slow").into();
        assert_eq!(err.to_string(), "timeout: slow");
        assert!(err.switched_session().is_none());
    }

    #[test]
    fn test_fallback_failed_carries_session() {
        let session = SessionConfig::primary().into_fallback("test");
        let err = ClientError::FallbackFailed {
            operation: "start generate".to_string(),
            source: TransportError::network("stopped"),
            session,
        };
        assert!(err.switched_session().is_some_and(SessionConfig::is_fallback));
        assert!(err.to_string().contains("start generate failed"));
    }
}
