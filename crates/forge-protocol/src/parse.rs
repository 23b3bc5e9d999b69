//! Parsing pipeline status and project payloads.
//!
//! Status payloads carry a `status` string plus fields that depend on the
//! task type (generated code, audit findings, build artifact, contract
//! address). Unknown fields are kept so a completion result can be handed
//! to the caller whole.

use chrono::{DateTime, Utc};
use forge_core::{ActiveTask, Project, ProjectId, TaskId, TaskStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Status Report
// ============================================================================

/// Response of a status poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    /// Optional backend message (e.g. failure reason).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Task-type-specific fields.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl StatusReport {
    /// Creates a report with only a status.
    pub fn new(status: TaskStatus) -> Self {
        Self {
            status,
            task_id: None,
            message: None,
            details: Map::new(),
        }
    }

    /// Adds a task-type-specific field.
    #[must_use]
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    fn detail_str(&self, key: &str) -> Option<&str> {
        self.details.get(key).and_then(Value::as_str)
    }

    /// Generated contract source (generate tasks).
    pub fn code(&self) -> Option<&str> {
        self.detail_str("code")
    }

    /// Contract name proposed by the backend (generate tasks).
    pub fn project_name(&self) -> Option<&str> {
        self.detail_str("name")
    }

    /// Audit findings (audit tasks).
    pub fn audit_report(&self) -> Option<&Value> {
        self.details.get("audit_report")
    }

    /// Build artifact reference (build tasks).
    pub fn artifact(&self) -> Option<&str> {
        self.detail_str("artifact")
    }

    /// Deployed contract address (deploy tasks).
    pub fn contract_address(&self) -> Option<&str> {
        self.detail_str("contract_address")
    }
}

// ============================================================================
// Project Summary
// ============================================================================

/// One entry of a project listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub task_id: Option<TaskId>,
    #[serde(default)]
    pub active_task: ActiveTask,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub is_archived: bool,
}

impl ProjectSummary {
    /// Converts the listing entry into the local project shape.
    pub fn into_project(self) -> Project {
        let is_deployed = self.status == TaskStatus::Deployed;
        Project {
            id: ProjectId::new(self.id),
            backend_task_id: self.task_id,
            display_name: self.name,
            status: self.status,
            active_task: self.active_task,
            created_at: self.created_at,
            updated_at: self.updated_at,
            source_code: self.code,
            is_deployed,
            is_archived: self.is_archived,
        }
    }
}
