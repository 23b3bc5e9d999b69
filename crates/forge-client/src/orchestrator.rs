//! Session orchestrator.
//!
//! Owns the user session and the project collection, starts pipeline tasks
//! through the transport the [`SessionConfig`] selects, and switches to the
//! fallback transport when the primary fails critically.
//!
//! Every operation takes the session by value and returns the session to
//! use next inside a [`Step`]. Once an operation returns a fallback session
//! the caller threads that one into every later call.
//!
//! **Panic-Free Policy:** No `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()`, or `todo!()` outside tests.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use forge_core::{DomainError, Project, ProjectId, TaskId, TaskType, User, UserId, WalletAddress};
use forge_protocol::ProjectSummary;
use tracing::{debug, info, warn};

use crate::config::TrackerConfig;
use crate::error::{ClientError, Result, TransportError};
use crate::policy;
use crate::projects::ProjectBook;
use crate::session::{SessionConfig, Step};
use crate::storage::{self, KeyValueStore};
use crate::tracker::TaskTracker;
use crate::transport::{Transport, Transports};

/// Default page size for project listings.
pub const DEFAULT_PROJECT_LIMIT: usize = 50;

/// User id used for listings in fallback mode before any wallet is connected.
const ANONYMOUS_USER: &str = "anonymous";

/// Task types that start a backend task to poll.
#[derive(Debug, Clone, Copy)]
enum TrackedStart {
    Generate,
    Audit,
    Build,
}

impl TryFrom<TaskType> for TrackedStart {
    type Error = DomainError;

    fn try_from(task_type: TaskType) -> std::result::Result<Self, DomainError> {
        match task_type {
            TaskType::Generate => Ok(Self::Generate),
            TaskType::Audit => Ok(Self::Audit),
            TaskType::Build => Ok(Self::Build),
            TaskType::Deploy => Err(DomainError::UntrackedTask(task_type)),
        }
    }
}

/// Starts `kind` on `transport`; returns the backend task id and the
/// source code the project should hold afterwards.
async fn start_on(
    transport: Arc<dyn Transport>,
    kind: TrackedStart,
    input: &str,
) -> std::result::Result<(TaskId, Option<String>), TransportError> {
    match kind {
        TrackedStart::Generate => {
            let started = transport.start_generate(input).await?;
            Ok((started.task_id, started.code))
        }
        TrackedStart::Audit => Ok((transport.start_audit(input).await?, Some(input.to_string()))),
        TrackedStart::Build => Ok((transport.start_build(input).await?, Some(input.to_string()))),
    }
}

/// Coordinates the user session, the project collection and task starts.
pub struct SessionOrchestrator {
    transports: Transports,
    store: Arc<dyn KeyValueStore>,
    projects: ProjectBook,
    current_user: Mutex<Option<User>>,
    project_limit: usize,
}

impl SessionOrchestrator {
    /// Creates an orchestrator whose project collection is saved in `store`.
    pub fn new(transports: Transports, store: Arc<dyn KeyValueStore>) -> Self {
        let projects = ProjectBook::persistent(Arc::clone(&store));
        Self {
            transports,
            store,
            projects,
            current_user: Mutex::new(None),
            project_limit: DEFAULT_PROJECT_LIMIT,
        }
    }

    #[must_use]
    pub fn with_project_limit(mut self, limit: usize) -> Self {
        self.project_limit = limit;
        self
    }

    pub fn projects(&self) -> &ProjectBook {
        &self.projects
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    pub fn current_user(&self) -> Option<User> {
        self.user_slot().clone()
    }

    fn user_slot(&self) -> MutexGuard<'_, Option<User>> {
        self.current_user
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn require_user(&self) -> Result<User> {
        self.current_user().ok_or(ClientError::NoCurrentUser)
    }

    /// Builds a tracker that polls through the transport `session` selects.
    pub fn tracker(&self, session: &SessionConfig, config: TrackerConfig) -> TaskTracker {
        TaskTracker::new(self.transports.select(session), self.projects.clone(), config)
    }

    // ========================================================================
    // Fallback
    // ========================================================================

    /// Switches `session` to fallback and drops the primary auth token.
    fn enter_fallback(&self, session: SessionConfig, reason: &TransportError) -> SessionConfig {
        if !session.is_fallback() {
            storage::clear_auth_token(self.store.as_ref());
            warn!(reason = %reason, "Session switched to fallback transport");
        }
        session.into_fallback(reason.to_string())
    }

    /// Runs `call` against the session's transport.
    ///
    /// On a critical primary failure the session switches to fallback and
    /// `call` is retried once there. Non-critical failures propagate.
    async fn with_fallback<T, F, Fut>(
        &self,
        session: SessionConfig,
        operation: &str,
        call: F,
    ) -> Result<Step<T>>
    where
        F: Fn(Arc<dyn Transport>) -> Fut,
        Fut: Future<Output = std::result::Result<T, TransportError>>,
    {
        if session.is_fallback() {
            let value = call(self.transports.fallback()).await?;
            return Ok(Step::new(value, session));
        }

        match call(self.transports.primary()).await {
            Ok(value) => Ok(Step::new(value, session)),
            Err(err) if policy::should_fallback(&err, operation) => {
                let session = self.enter_fallback(session, &err);
                match call(self.transports.fallback()).await {
                    Ok(value) => {
                        info!(operation, "Operation completed on fallback transport");
                        Ok(Step::new(value, session))
                    }
                    Err(source) => Err(ClientError::FallbackFailed {
                        operation: operation.to_string(),
                        source,
                        session,
                    }),
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    // ========================================================================
    // User Session
    // ========================================================================

    /// Resolves the user for `wallet`.
    ///
    /// On the primary transport a stored pairing is reused without a
    /// network call. Otherwise the wallet is registered; if that fails
    /// even after fallback, the session is forced into fallback and a local
    /// user id is minted. Never fails.
    pub async fn initialize_user(&self, session: SessionConfig, wallet: &WalletAddress) -> Step<User> {
        if !session.is_fallback() {
            if let Some(user) = storage::load_user(self.store.as_ref(), wallet) {
                debug!(user_id = %user.id, "Restored stored user pairing");
                *self.user_slot() = Some(user.clone());
                return Step::new(user, session);
            }
        }

        let registered = self
            .with_fallback(session.clone(), "create wallet", |transport| async move {
                transport.register_wallet(wallet).await
            })
            .await;

        let (user, session) = match registered {
            Ok(Step { value: id, session }) => {
                let user = User {
                    id,
                    wallet_address: wallet.clone(),
                };
                if !session.is_fallback() {
                    storage::save_user(self.store.as_ref(), &user);
                }
                (user, session)
            }
            Err(err) => {
                warn!(wallet = %wallet, error = %err, "Wallet registration failed, using local user");
                let session = match err.switched_session() {
                    Some(switched) => switched.clone(),
                    None => self.enter_fallback(session, &TransportError::network(&err)),
                };
                let user = User {
                    id: UserId::local(),
                    wallet_address: wallet.clone(),
                };
                (user, session)
            }
        };

        info!(user_id = %user.id, mode = %session.mode(), "User initialized");
        *self.user_slot() = Some(user.clone());
        Step::new(user, session)
    }

    /// Forgets the current user. The stored pairing is kept for reconnects.
    pub fn disconnect(&self) {
        if let Some(user) = self.user_slot().take() {
            info!(user_id = %user.id, "Disconnected");
        }
    }

    // ========================================================================
    // Projects
    // ========================================================================

    /// Fetches the user's projects and merges them into the collection.
    ///
    /// Needs a connected user on the primary transport.
    pub async fn load_projects(&self, session: SessionConfig) -> Result<Step<Vec<Project>>> {
        let user_id = match self.current_user() {
            Some(user) => user.id,
            None if session.is_fallback() => UserId::new(ANONYMOUS_USER),
            None => return Err(ClientError::NoCurrentUser),
        };
        let limit = self.project_limit;

        let step = self
            .with_fallback(session, "list projects", |transport| {
                let user_id = user_id.clone();
                async move { transport.list_projects(&user_id, limit).await }
            })
            .await?;

        let step = step.map(|summaries| {
            summaries
                .into_iter()
                .map(ProjectSummary::into_project)
                .collect::<Vec<_>>()
        });
        self.projects.merge(step.value.clone());
        debug!(count = step.value.len(), "Projects loaded");
        Ok(step)
    }

    /// Creates an empty draft project locally. No backend call is made.
    pub fn create_project(&self, name: &str) -> Result<Project> {
        self.require_user()?;
        let project = Project::new(ProjectId::generate(), Some(name.trim().to_string()));
        self.projects.upsert(project.clone());
        storage::set_current_project(self.store.as_ref(), &project.id);
        info!(project_id = %project.id, "Project created");
        Ok(project)
    }

    pub fn archive_project(&self, id: &ProjectId) -> Result<Project> {
        self.projects
            .archive_project(id)
            .ok_or_else(|| ClientError::ProjectNotFound(id.clone()))
    }

    /// Deletes project `id` and everything stored for it.
    pub fn delete_project(&self, id: &ProjectId) -> Result<Project> {
        let removed = self
            .projects
            .delete_project(id)
            .ok_or_else(|| ClientError::ProjectNotFound(id.clone()))?;
        storage::forget_project(self.store.as_ref(), id);
        info!(project_id = %id, "Project deleted");
        Ok(removed)
    }

    // ========================================================================
    // Pipeline Tasks
    // ========================================================================

    /// Starts a generate task, in project `existing` or in a new project.
    pub async fn start_generate(
        &self,
        session: SessionConfig,
        description: &str,
        existing: Option<&ProjectId>,
    ) -> Result<Step<Project>> {
        self.start_task(session, TaskType::Generate, description, existing)
            .await
    }

    /// Starts a generate task in an existing project and returns only the
    /// backend task id.
    pub async fn generate_in_project(
        &self,
        session: SessionConfig,
        project: &ProjectId,
        description: &str,
    ) -> Result<Step<TaskId>> {
        let step = self
            .start_task(session, TaskType::Generate, description, Some(project))
            .await?;
        Ok(step.map(|project| project.poll_id()))
    }

    pub async fn start_audit(
        &self,
        session: SessionConfig,
        code: &str,
        existing: Option<&ProjectId>,
    ) -> Result<Step<Project>> {
        self.start_task(session, TaskType::Audit, code, existing).await
    }

    pub async fn start_build(
        &self,
        session: SessionConfig,
        code: &str,
        existing: Option<&ProjectId>,
    ) -> Result<Step<Project>> {
        self.start_task(session, TaskType::Build, code, existing).await
    }

    /// Deploys `code` and returns the contract address.
    pub async fn deploy(&self, session: SessionConfig, code: &str) -> Result<Step<String>> {
        self.require_user()?;
        let step = self
            .with_fallback(session, "deploy", |transport| async move {
                transport.start_deploy(code).await
            })
            .await?;
        info!(address = %step.value, mode = %step.session.mode(), "Contract deployed");
        Ok(step)
    }

    async fn start_task(
        &self,
        session: SessionConfig,
        task_type: TaskType,
        input: &str,
        existing: Option<&ProjectId>,
    ) -> Result<Step<Project>> {
        let kind = TrackedStart::try_from(task_type)?;
        if let Some(id) = existing {
            if self.projects.get(id).is_none() {
                return Err(ClientError::ProjectNotFound(id.clone()));
            }
        }

        let operation = format!("start {task_type}");
        let step = self
            .with_fallback(session, &operation, |transport| {
                start_on(transport, kind, input)
            })
            .await?;

        let (task_id, source) = step.value;
        let project = match existing {
            Some(id) => self
                .projects
                .update(id, |project| {
                    project.attach_task(task_type, task_id.clone());
                    if let Some(code) = &source {
                        project.source_code = Some(code.clone());
                    }
                })
                .ok_or_else(|| ClientError::ProjectNotFound(id.clone()))?,
            None => {
                let project = Project::for_task(task_type, task_id.clone(), source.clone());
                self.projects.upsert(project.clone());
                project
            }
        };

        if let Some(code) = &source {
            storage::save_code(self.store.as_ref(), &project.id, code);
        }
        storage::set_current_project(self.store.as_ref(), &project.id);

        info!(
            project_id = %project.id,
            task_id = %task_id,
            task_type = %task_type,
            mode = %step.session.mode(),
            "Task started"
        );
        Ok(Step::new(project, step.session))
    }
}
