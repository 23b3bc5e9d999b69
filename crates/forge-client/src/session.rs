//! Immutable session configuration threaded through orchestrator calls.
//!
//! A session starts on the primary transport. The only transition is
//! [`SessionConfig::into_fallback`]; there is no way back within a session.
//! Every orchestrator operation takes the session by value and hands back
//! the (possibly switched) session in a [`Step`].

use chrono::{DateTime, Utc};

/// Which backend a session talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportMode {
    #[default]
    Primary,
    Fallback,
}

impl TransportMode {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Session-wide transport choice.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionConfig {
    mode: TransportMode,
    /// Why the session left the primary transport.
    fallback_reason: Option<String>,
    switched_at: Option<DateTime<Utc>>,
}

impl SessionConfig {
    /// A fresh session on the primary transport.
    pub fn primary() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> TransportMode {
        self.mode
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.mode == TransportMode::Fallback
    }

    pub fn fallback_reason(&self) -> Option<&str> {
        self.fallback_reason.as_deref()
    }

    pub fn switched_at(&self) -> Option<DateTime<Utc>> {
        self.switched_at
    }

    /// Switches the session to the fallback transport.
    ///
    /// Idempotent: an already switched session keeps its first reason.
    #[must_use]
    pub fn into_fallback(self, reason: impl Into<String>) -> Self {
        if self.is_fallback() {
            return self;
        }
        Self {
            mode: TransportMode::Fallback,
            fallback_reason: Some(reason.into()),
            switched_at: Some(Utc::now()),
        }
    }
}

/// Result of an orchestrator operation together with the session to use next.
#[derive(Debug, Clone, PartialEq)]
pub struct Step<T> {
    pub value: T,
    pub session: SessionConfig,
}

impl<T> Step<T> {
    pub fn new(value: T, session: SessionConfig) -> Self {
        Self { value, session }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Step<U> {
        Step {
            value: f(self.value),
            session: self.session,
        }
    }

    pub fn into_parts(self) -> (T, SessionConfig) {
        (self.value, self.session)
    }
}
