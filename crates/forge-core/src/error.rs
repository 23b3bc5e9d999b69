//! Domain-specific error types following panic-free policy.

use thiserror::Error;

use crate::status::TaskType;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid field value
    #[error("Invalid {field}: {value} (expected {expected})")]
    InvalidFieldValue {
        field: String,
        value: String,
        expected: String,
    },

    /// Task type string not recognized
    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),

    /// Task type has no backend task to poll (deploy)
    #[error("{0} does not start a tracked task")]
    UntrackedTask(TaskType),
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
