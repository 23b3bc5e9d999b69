//! Pipeline status vocabulary.
//!
//! The remote pipeline reports task state as opaque strings. This module
//! decodes them into a closed [`TaskStatus`] enum right at the boundary,
//! keeping an `Unknown` variant so statuses added by the backend later
//! never fail to decode.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;

// ============================================================================
// Task Type
// ============================================================================

/// The kind of long-running backend task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Generate,
    Audit,
    Build,
    Deploy,
}

impl TaskType {
    /// All task types, in pipeline order.
    pub const ALL: [TaskType; 4] = [Self::Generate, Self::Audit, Self::Build, Self::Deploy];

    /// Returns true for task types that start a backend task to poll.
    /// Deploy is call-and-response.
    #[must_use]
    pub fn is_tracked(&self) -> bool {
        !matches!(self, Self::Deploy)
    }

    /// Returns the wire name (also the URL path segment).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::Audit => "audit",
            Self::Build => "build",
            Self::Deploy => "deploy",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generate" => Ok(Self::Generate),
            "audit" => Ok(Self::Audit),
            "build" => Ok(Self::Build),
            "deploy" => Ok(Self::Deploy),
            other => Err(DomainError::UnknownTaskType(other.to_string())),
        }
    }
}

// ============================================================================
// Progress
// ============================================================================

/// User-facing progress for a status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Short stage identifier (e.g. "generating").
    pub stage: String,
    /// Completion percentage, 0-100.
    pub percent: u8,
    /// Human-readable message.
    pub message: String,
}

impl Progress {
    fn new(stage: &str, percent: u8, message: &str) -> Self {
        Self {
            stage: stage.to_string(),
            percent: percent.min(100),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:>3}%] {}", self.percent, self.message)
    }
}

// ============================================================================
// Task Status
// ============================================================================

/// Lifecycle status of a task or project.
///
/// Decoding is total: any string the backend sends maps to a variant,
/// unrecognized ones to [`TaskStatus::Unknown`] with the raw text kept.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    #[default]
    Draft,
    New,
    Initializing,
    InProgress,
    Generating,
    Generated,
    Auditing,
    Audited,
    Building,
    Built,
    Deploying,
    Deployed,
    Error,
    /// A status this client does not know about yet.
    Unknown(String),
}

/// Full classification of a status for one task type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub is_error: bool,
    pub is_complete: bool,
    pub display_name: String,
    pub progress: Progress,
}

impl TaskStatus {
    /// Decodes a backend status string. Never fails.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "draft" => Self::Draft,
            "new" => Self::New,
            "initializing" => Self::Initializing,
            "in-progress" => Self::InProgress,
            "generating" => Self::Generating,
            "generated" => Self::Generated,
            "auditing" => Self::Auditing,
            "audited" => Self::Audited,
            "building" => Self::Building,
            "built" => Self::Built,
            "deploying" => Self::Deploying,
            "deployed" => Self::Deployed,
            "error" => Self::Error,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Returns the wire string for this status.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Draft => "draft",
            Self::New => "new",
            Self::Initializing => "initializing",
            Self::InProgress => "in-progress",
            Self::Generating => "generating",
            Self::Generated => "generated",
            Self::Auditing => "auditing",
            Self::Audited => "audited",
            Self::Building => "building",
            Self::Built => "built",
            Self::Deploying => "deploying",
            Self::Deployed => "deployed",
            Self::Error => "error",
            Self::Unknown(raw) => raw,
        }
    }

    /// Returns the label shown to users. Unknown statuses show verbatim.
    pub fn display_name(&self) -> &str {
        match self {
            Self::Draft => "Draft",
            Self::New => "New",
            Self::Initializing => "Initializing",
            Self::InProgress => "In Progress",
            Self::Generating => "Generating",
            Self::Generated => "Generated",
            Self::Auditing => "Auditing",
            Self::Audited => "Audited",
            Self::Building => "Building",
            Self::Built => "Built",
            Self::Deploying => "Deploying",
            Self::Deployed => "Deployed",
            Self::Error => "Task failed",
            Self::Unknown(raw) => raw,
        }
    }

    /// True only for the backend's `"error"` status, for every task type.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }

    /// Returns true if this status ends a task of the given type successfully.
    ///
    /// A generate task also counts as complete when the project has already
    /// gone all the way to deployed.
    #[must_use]
    pub fn is_complete(&self, task_type: TaskType) -> bool {
        matches!(
            (task_type, self),
            (TaskType::Generate, Self::Generated)
                | (TaskType::Generate, Self::Deployed)
                | (TaskType::Audit, Self::Audited)
                | (TaskType::Build, Self::Built)
                | (TaskType::Deploy, Self::Deployed)
        )
    }

    /// Returns true while a backend task is still expected to move.
    ///
    /// Unrecognized statuses are never terminal, so they count as in flight.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            Self::New
                | Self::Initializing
                | Self::InProgress
                | Self::Generating
                | Self::Auditing
                | Self::Building
                | Self::Deploying
                | Self::Unknown(_)
        )
    }

    /// Returns true for statuses after which no task on the project is running.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Generated | Self::Audited | Self::Built | Self::Deployed | Self::Error
        )
    }

    /// Maps the status to its progress tuple.
    pub fn progress(&self) -> Progress {
        match self {
            Self::Draft => Progress::new("draft", 0, "Waiting to start"),
            Self::New => Progress::new("initializing", 5, "Task created, waiting for a worker..."),
            Self::Initializing => Progress::new("initializing", 10, "Initializing AI pipeline..."),
            Self::InProgress => Progress::new("processing", 20, "Processing request..."),
            Self::Generating => Progress::new("generating", 40, "Generating contract code..."),
            Self::Generated => Progress::new("generated", 100, "Contract code generated"),
            Self::Auditing => Progress::new("auditing", 50, "Running security audit..."),
            Self::Audited => Progress::new("audited", 100, "Security audit complete"),
            Self::Building => Progress::new("building", 60, "Compiling contract..."),
            Self::Built => Progress::new("built", 100, "Build complete"),
            Self::Deploying => Progress::new("deploying", 80, "Deploying to network..."),
            Self::Deployed => Progress::new("deployed", 100, "Contract deployed"),
            Self::Error => Progress::new("error", 0, "Task failed"),
            Self::Unknown(_) => Progress::new("initializing", 0, "Processing..."),
        }
    }

    /// Classifies the status for a task type in one call.
    pub fn classify(&self, task_type: TaskType) -> Classification {
        Classification {
            is_error: self.is_error(),
            is_complete: self.is_complete(task_type),
            display_name: self.display_name().to_string(),
            progress: self.progress(),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for TaskStatus {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<&str> for TaskStatus {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        status.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN: &[&str] = &[
        "draft",
        "new",
        "initializing",
        "in-progress",
        "generating",
        "generated",
        "auditing",
        "audited",
        "building",
        "built",
        "deploying",
        "deployed",
        "error",
    ];

    #[test]
    fn test_known_statuses_decode_to_named_variants() {
        for raw in KNOWN {
            let status = TaskStatus::parse(raw);
            assert!(!matches!(status, TaskStatus::Unknown(_)), "{raw} decoded as unknown");
            assert_eq!(status.as_str(), *raw);
        }
    }

    #[test]
    fn test_classify_is_deterministic() {
        for raw in KNOWN {
            for task_type in TaskType::ALL {
                let a = TaskStatus::parse(raw).classify(task_type);
                let b = TaskStatus::parse(raw).classify(task_type);
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn test_generate_completion() {
        assert!(TaskStatus::Generated.is_complete(TaskType::Generate));
        assert!(TaskStatus::Deployed.is_complete(TaskType::Generate));
        assert!(!TaskStatus::Generated.is_complete(TaskType::Audit));
        assert!(!TaskStatus::Generating.is_complete(TaskType::Generate));
    }

    #[test]
    fn test_other_completions() {
        assert!(TaskStatus::Audited.is_complete(TaskType::Audit));
        assert!(TaskStatus::Built.is_complete(TaskType::Build));
        assert!(TaskStatus::Deployed.is_complete(TaskType::Deploy));
        assert!(!TaskStatus::Built.is_complete(TaskType::Deploy));
        assert!(!TaskStatus::Audited.is_complete(TaskType::Build));
    }

    #[test]
    fn test_is_error_only_for_error_literal() {
        for raw in KNOWN {
            let status = TaskStatus::parse(raw);
            for task_type in TaskType::ALL {
                assert_eq!(status.classify(task_type).is_error, *raw == "error");
            }
        }
        assert!(!TaskStatus::parse("ERROR").is_error());
        assert!(!TaskStatus::parse("failed").is_error());
    }

    #[test]
    fn test_unknown_status_defaults() {
        let status = TaskStatus::parse("queued_for_gpu");
        assert_eq!(status, TaskStatus::Unknown("queued_for_gpu".to_string()));
        assert_eq!(status.display_name(), "queued_for_gpu");

        let progress = status.progress();
        assert_eq!(progress.stage, "initializing");
        assert_eq!(progress.percent, 0);
        assert_eq!(progress.message, "Processing...");

        for task_type in TaskType::ALL {
            let class = status.classify(task_type);
            assert!(!class.is_error);
            assert!(!class.is_complete);
        }
        assert!(status.is_in_flight());
        assert!(!status.is_terminal());
    }

    #[test]
    fn test_terminal_statuses() {
        for status in [
            TaskStatus::Generated,
            TaskStatus::Audited,
            TaskStatus::Built,
            TaskStatus::Deployed,
            TaskStatus::Error,
        ] {
            assert!(status.is_terminal(), "{status:?}");
            assert!(!status.is_in_flight(), "{status:?}");
        }
        assert!(!TaskStatus::Draft.is_terminal());
        assert!(!TaskStatus::Generating.is_terminal());
    }

    #[test]
    fn test_serde_uses_wire_strings() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");

        let parsed: TaskStatus = serde_json::from_str("\"brand-new-state\"").unwrap();
        assert_eq!(parsed.as_str(), "brand-new-state");
    }

    #[test]
    fn test_task_type_from_str() {
        assert_eq!("Audit".parse::<TaskType>().unwrap(), TaskType::Audit);
        assert!(matches!(
            "compile".parse::<TaskType>(),
            Err(DomainError::UnknownTaskType(_))
        ));
    }

    #[test]
    fn test_only_deploy_is_untracked() {
        let tracked: Vec<TaskType> = TaskType::ALL.into_iter().filter(TaskType::is_tracked).collect();
        assert_eq!(tracked, vec![TaskType::Generate, TaskType::Audit, TaskType::Build]);
    }

    #[test]
    fn test_progress_display() {
        let progress = TaskStatus::Generating.progress();
        assert_eq!(format!("{progress}"), "[ 40%] Generating contract code...");
    }
}
