//! Endpoint layout of the pipeline HTTP API.
//!
//! Endpoints are described as unencoded path segments plus query pairs,
//! relative to the configured base URL. The transport is responsible for
//! percent-encoding them, so ids may contain any character.

use std::fmt;

use forge_core::{TaskId, TaskType};

/// Common first segment of every endpoint.
pub const API_PREFIX: &str = "api";

/// One API endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Path segments, not yet percent-encoded.
    pub segments: Vec<String>,
    /// Query pairs, not yet percent-encoded.
    pub query: Vec<(&'static str, String)>,
}

impl Endpoint {
    fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: std::iter::once(API_PREFIX.to_string())
                .chain(segments.into_iter().map(Into::into))
                .collect(),
            query: Vec::new(),
        }
    }

    fn with_query(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.query.push((key, value.to_string()));
        self
    }
}

/// Unencoded form, for logs.
impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        for (i, (key, value)) in self.query.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{key}={value}")?;
        }
        Ok(())
    }
}

/// `POST` - register a wallet and obtain a user id.
pub fn register_wallet() -> Endpoint {
    Endpoint::new(["users"])
}

/// `GET` - list a user's projects, newest first.
pub fn list_projects(user_id: &str, limit: usize) -> Endpoint {
    Endpoint::new(["users", user_id, "projects"]).with_query("limit", limit)
}

/// `POST` - start a task of the given type.
pub fn start_task(task_type: TaskType) -> Endpoint {
    Endpoint::new([task_type.as_str()])
}

/// `GET` - status of a task.
pub fn task_status(task_type: TaskType, task_id: &TaskId) -> Endpoint {
    Endpoint::new([task_type.as_str(), "status", task_id.as_str()])
}
