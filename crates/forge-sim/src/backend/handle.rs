//! Client interface for interacting with the BackendActor.
//!
//! # Panic-Free Guarantees
//!
//! Channel errors are mapped to `BackendError::ChannelClosed`.

use forge_core::{TaskId, TaskType};
use forge_protocol::{ProjectSummary, StatusReport};
use tokio::sync::{mpsc, oneshot};

use super::commands::{BackendCommand, BackendError, StartedTask};

/// Handle for interacting with the backend actor.
///
/// Cheap to clone; every method is a request/response round trip over
/// the actor's command channel.
#[derive(Clone)]
pub struct BackendHandle {
    sender: mpsc::Sender<BackendCommand>,
}

impl BackendHandle {
    pub fn new(sender: mpsc::Sender<BackendCommand>) -> Self {
        Self { sender }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> BackendCommand,
    ) -> Result<T, BackendError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| BackendError::ChannelClosed)?;
        rx.await.map_err(|_| BackendError::ChannelClosed)
    }

    /// Register a wallet and return its user id.
    pub async fn register_wallet(&self, wallet_address: &str) -> Result<String, BackendError> {
        let wallet_address = wallet_address.to_string();
        self.request(|respond_to| BackendCommand::RegisterWallet {
            wallet_address,
            respond_to,
        })
        .await
    }

    /// List projects, newest first.
    pub async fn list_projects(&self, limit: usize) -> Result<Vec<ProjectSummary>, BackendError> {
        self.request(|respond_to| BackendCommand::ListProjects { limit, respond_to })
            .await
    }

    /// Start a generate, audit or build task.
    pub async fn start_task(
        &self,
        task_type: TaskType,
        input: &str,
    ) -> Result<StartedTask, BackendError> {
        let input = input.to_string();
        self.request(|respond_to| BackendCommand::StartTask {
            task_type,
            input,
            respond_to,
        })
        .await
    }

    /// Deploy source and return the contract address.
    pub async fn deploy(&self, code: &str) -> Result<String, BackendError> {
        let code = code.to_string();
        self.request(|respond_to| BackendCommand::Deploy { code, respond_to })
            .await
    }

    /// Get a task's status, advancing it one step.
    ///
    /// # Errors
    ///
    /// - `BackendError::TaskNotFound` if no such task exists
    /// - `BackendError::ChannelClosed` if the actor has shut down
    pub async fn get_status(
        &self,
        task_type: TaskType,
        task_id: &TaskId,
    ) -> Result<StatusReport, BackendError> {
        let task_id = task_id.clone();
        self.request(|respond_to| BackendCommand::GetStatus {
            task_type,
            task_id,
            respond_to,
        })
        .await?
    }

    /// Check if the actor is still running.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}
