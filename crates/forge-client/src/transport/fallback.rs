//! Fallback transport backed by the in-process sim backend.

use async_trait::async_trait;
use forge_core::{TaskId, TaskType, UserId, WalletAddress};
use forge_protocol::{GenerateResponse, ProjectSummary, StatusReport};
use forge_sim::{BackendError, BackendHandle};

use super::Transport;
use crate::error::TransportError;

impl From<BackendError> for TransportError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::TaskNotFound(id) => TransportError::not_found(format!("task {id}")),
            BackendError::ChannelClosed => TransportError::network("fallback backend stopped"),
        }
    }
}

/// Always-available transport answering from the sim backend.
#[derive(Clone)]
pub struct FallbackTransport {
    backend: BackendHandle,
}

impl FallbackTransport {
    pub fn new(backend: BackendHandle) -> Self {
        Self { backend }
    }

    /// Spawns a fresh sim backend. Must be called inside a tokio runtime.
    pub fn spawn() -> Self {
        Self::new(forge_sim::spawn_backend())
    }
}

#[async_trait]
impl Transport for FallbackTransport {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn register_wallet(&self, wallet: &WalletAddress) -> Result<UserId, TransportError> {
        let user_id = self.backend.register_wallet(wallet.as_str()).await?;
        Ok(UserId::new(user_id))
    }

    // The sim backend keeps a single project list, so the user id is unused.
    async fn list_projects(
        &self,
        _user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<ProjectSummary>, TransportError> {
        Ok(self.backend.list_projects(limit).await?)
    }

    async fn start_generate(&self, description: &str) -> Result<GenerateResponse, TransportError> {
        let started = self.backend.start_task(TaskType::Generate, description).await?;
        Ok(GenerateResponse {
            task_id: started.task_id,
            status: started.status,
            code: None,
        })
    }

    async fn start_audit(&self, code: &str) -> Result<TaskId, TransportError> {
        Ok(self.backend.start_task(TaskType::Audit, code).await?.task_id)
    }

    async fn start_build(&self, code: &str) -> Result<TaskId, TransportError> {
        Ok(self.backend.start_task(TaskType::Build, code).await?.task_id)
    }

    async fn start_deploy(&self, code: &str) -> Result<String, TransportError> {
        Ok(self.backend.deploy(code).await?)
    }

    async fn get_status(
        &self,
        task_type: TaskType,
        task_id: &TaskId,
    ) -> Result<StatusReport, TransportError> {
        Ok(self.backend.get_status(task_type, task_id).await?)
    }
}
