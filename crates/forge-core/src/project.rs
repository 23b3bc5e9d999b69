//! Project entities and identifiers.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::status::{TaskStatus, TaskType};

/// Default age after which an in-flight project is reported as stale (10 minutes).
pub const DEFAULT_STALE_THRESHOLD_SECS: i64 = 600;

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// Client-side identity of a project.
///
/// Used to locate a project in the local collection. Never sent to the
/// status endpoint; see [`TaskId`] for that.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

/// Prefix for identifiers synthesized on this machine.
pub const LOCAL_PROJECT_PREFIX: &str = "proj-";

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Synthesizes a fresh local identifier.
    pub fn generate() -> Self {
        Self(format!("{LOCAL_PROJECT_PREFIX}{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a shortened display form (first 13 characters).
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..13).unwrap_or(&self.0)
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier the remote task system assigned to a task.
///
/// This is the only identifier ever passed to a status poll.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<&ProjectId> for TaskId {
    /// Used when a project has no backend id yet and its local id stands in.
    fn from(id: &ProjectId) -> Self {
        Self(id.as_str().to_string())
    }
}

// ============================================================================
// Active Task
// ============================================================================

/// Which tracked task a project is currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveTask {
    Generate,
    Audit,
    Build,
    #[default]
    None,
}

impl From<TaskType> for ActiveTask {
    /// Deploy is call-and-response and never becomes an active task.
    fn from(task_type: TaskType) -> Self {
        match task_type {
            TaskType::Generate => Self::Generate,
            TaskType::Audit => Self::Audit,
            TaskType::Build => Self::Build,
            TaskType::Deploy => Self::None,
        }
    }
}

impl ActiveTask {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::Audit => "audit",
            Self::Build => "build",
            Self::None => "none",
        }
    }
}

// ============================================================================
// Project
// ============================================================================

/// Local representation of one contract lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub backend_task_id: Option<TaskId>,
    pub display_name: Option<String>,
    pub status: TaskStatus,
    pub active_task: ActiveTask,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub source_code: Option<String>,
    pub is_deployed: bool,
    pub is_archived: bool,
}

impl Project {
    /// Creates a draft project with no task attached.
    pub fn new(id: ProjectId, display_name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            backend_task_id: None,
            display_name,
            status: TaskStatus::Draft,
            active_task: ActiveTask::None,
            created_at: now,
            updated_at: now,
            source_code: None,
            is_deployed: false,
            is_archived: false,
        }
    }

    /// Creates a project for a task that was just started on the backend.
    pub fn for_task(task_type: TaskType, task_id: TaskId, source_code: Option<String>) -> Self {
        let mut project = Self::new(ProjectId::generate(), None);
        project.source_code = source_code;
        project.attach_task(task_type, task_id);
        project
    }

    /// Marks the project as running `task_type` under `task_id`.
    pub fn attach_task(&mut self, task_type: TaskType, task_id: TaskId) {
        self.backend_task_id = Some(task_id);
        self.active_task = ActiveTask::from(task_type);
        self.status = TaskStatus::InProgress;
        self.updated_at = Utc::now();
    }

    /// Records a status observed from the backend.
    pub fn apply_status(&mut self, status: TaskStatus) {
        if status == TaskStatus::Deployed {
            self.is_deployed = true;
        }
        if status.is_terminal() {
            self.active_task = ActiveTask::None;
        }
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// Identifier a status poll for this project must use.
    pub fn poll_id(&self) -> TaskId {
        self.backend_task_id
            .clone()
            .unwrap_or_else(|| TaskId::from(&self.id))
    }

    /// Returns the display name, or a placeholder until the backend assigns one.
    pub fn name_or_placeholder(&self) -> &str {
        self.display_name.as_deref().unwrap_or("(untitled)")
    }

    /// Returns true if the project claims to be in flight but has not
    /// been updated within `threshold`.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.status.is_in_flight() && now.signed_duration_since(self.updated_at) > threshold
    }
}
