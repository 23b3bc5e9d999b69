//! Transport facade.
//!
//! One capability interface, [`Transport`], with two implementations:
//! - [`HttpTransport`]: the remote pipeline API.
//! - [`FallbackTransport`]: the in-process synthetic backend from `forge-sim`.
//!
//! [`Transports`] holds both and picks one from a [`SessionConfig`]; callers
//! never inspect which implementation they were handed.

use std::sync::Arc;

use async_trait::async_trait;
use forge_core::{TaskId, TaskType, UserId, WalletAddress};
use forge_protocol::{GenerateResponse, ProjectSummary, StatusReport};

use crate::error::TransportError;
use crate::session::{SessionConfig, TransportMode};

mod fallback;
mod http;

pub use fallback::FallbackTransport;
pub use http::HttpTransport;

/// Operations every backend offers.
///
/// A missing task on `get_status` must surface as
/// [`TransportErrorKind::NotFound`](crate::error::TransportErrorKind::NotFound)
/// so the tracker can treat it as "not visible yet".
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    async fn register_wallet(&self, wallet: &WalletAddress) -> Result<UserId, TransportError>;

    async fn list_projects(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<ProjectSummary>, TransportError>;

    async fn start_generate(&self, description: &str) -> Result<GenerateResponse, TransportError>;

    async fn start_audit(&self, code: &str) -> Result<TaskId, TransportError>;

    async fn start_build(&self, code: &str) -> Result<TaskId, TransportError>;

    /// Deploys `code` and returns the contract address.
    async fn start_deploy(&self, code: &str) -> Result<String, TransportError>;

    async fn get_status(
        &self,
        task_type: TaskType,
        task_id: &TaskId,
    ) -> Result<StatusReport, TransportError>;
}

/// The primary and fallback transports of a client.
#[derive(Clone)]
pub struct Transports {
    primary: Arc<dyn Transport>,
    fallback: Arc<dyn Transport>,
}

impl Transports {
    pub fn new(primary: Arc<dyn Transport>, fallback: Arc<dyn Transport>) -> Self {
        Self { primary, fallback }
    }

    pub fn primary(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.primary)
    }

    pub fn fallback(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.fallback)
    }

    /// Returns the transport `session` currently points at.
    pub fn select(&self, session: &SessionConfig) -> Arc<dyn Transport> {
        match session.mode() {
            TransportMode::Primary => self.primary(),
            TransportMode::Fallback => self.fallback(),
        }
    }
}

impl std::fmt::Debug for Transports {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transports")
            .field("primary", &self.primary.name())
            .field("fallback", &self.fallback.name())
            .finish()
    }
}
