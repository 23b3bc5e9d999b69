//! Backend actor commands and errors.
//!
//! - `BackendCommand`: commands sent to the actor
//! - `BackendError`: errors that can occur during backend operations
//! - `StartedTask`: what a start call hands back

use forge_core::{TaskId, TaskStatus, TaskType};
use forge_protocol::{ProjectSummary, StatusReport};
use thiserror::Error;
use tokio::sync::oneshot;

// ============================================================================
// Backend Commands
// ============================================================================

/// Commands sent to the backend actor.
///
/// Each command carries a oneshot channel for its response.
#[derive(Debug)]
pub enum BackendCommand {
    /// Register a wallet; repeated registrations return the same user id.
    RegisterWallet {
        wallet_address: String,
        respond_to: oneshot::Sender<String>,
    },

    /// List started tasks as projects, newest first.
    ListProjects {
        limit: usize,
        respond_to: oneshot::Sender<Vec<ProjectSummary>>,
    },

    /// Start a generate, audit or build task.
    ///
    /// `input` is the description for generate and the source for the others.
    StartTask {
        task_type: TaskType,
        input: String,
        respond_to: oneshot::Sender<StartedTask>,
    },

    /// Deploy source and return the contract address.
    Deploy {
        code: String,
        respond_to: oneshot::Sender<String>,
    },

    /// Report the current status of a task and advance it one step.
    ///
    /// # Errors
    /// - `BackendError::TaskNotFound` if no task of that type has this id
    GetStatus {
        task_type: TaskType,
        task_id: TaskId,
        respond_to: oneshot::Sender<Result<StatusReport, BackendError>>,
    },
}

/// Result of starting a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedTask {
    pub task_id: TaskId,
    pub status: TaskStatus,
}

// ============================================================================
// Backend Errors
// ============================================================================

/// Errors that can occur during backend operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The requested task does not exist.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// The response channel was closed before receiving a response.
    ///
    /// This typically indicates the actor was shut down.
    #[error("response channel closed")]
    ChannelClosed,
}
