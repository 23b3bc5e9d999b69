//! Backend actor - owns all synthetic task state and processes commands.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Reply send failures are ignored (the caller may have given up)

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use forge_core::{ActiveTask, TaskId, TaskStatus, TaskType};
use forge_protocol::{ProjectSummary, StatusReport};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::commands::{BackendCommand, BackendError, StartedTask};
use crate::script;

/// Maximum number of tasks kept; the oldest are dropped beyond this.
pub const MAX_TASKS: usize = 500;

// ============================================================================
// Task State
// ============================================================================

#[derive(Debug, Clone)]
struct SimTask {
    id: TaskId,
    task_type: TaskType,
    /// Index into the task type's status script of the next status to report.
    step: usize,
    input: String,
    name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    /// Last status reported to a poller.
    reported: TaskStatus,
}

impl SimTask {
    fn summary(&self) -> ProjectSummary {
        let code = match self.task_type {
            TaskType::Generate if self.reported == TaskStatus::Generated => {
                Some(script::generated_source(&self.input))
            }
            TaskType::Generate => None,
            _ => Some(self.input.clone()),
        };
        ProjectSummary {
            id: format!("sim-project-{}", self.id),
            name: self.name.clone(),
            status: self.reported.clone(),
            task_id: Some(self.id.clone()),
            active_task: if self.reported.is_in_flight() {
                ActiveTask::from(self.task_type)
            } else {
                ActiveTask::None
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
            code,
            is_archived: false,
        }
    }
}

// ============================================================================
// Backend Actor
// ============================================================================

/// The backend actor - single owner of users and tasks.
///
/// Processes commands sequentially; every mutation happens in this task.
pub struct BackendActor {
    receiver: mpsc::Receiver<BackendCommand>,

    /// Tasks by id.
    tasks: HashMap<TaskId, SimTask>,

    /// Task ids in creation order (oldest first).
    order: Vec<TaskId>,

    /// Wallet address → user id.
    users: HashMap<String, String>,

    next_id: u64,
}

impl BackendActor {
    pub fn new(receiver: mpsc::Receiver<BackendCommand>) -> Self {
        Self {
            receiver,
            tasks: HashMap::new(),
            order: Vec::new(),
            users: HashMap::new(),
            next_id: 1,
        }
    }

    /// Runs the actor loop until every handle is dropped.
    pub async fn run(mut self) {
        info!("Sim backend starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(tasks = self.tasks.len(), "Sim backend stopped");
    }

    fn handle_command(&mut self, cmd: BackendCommand) {
        match cmd {
            BackendCommand::RegisterWallet {
                wallet_address,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_register_wallet(wallet_address));
            }
            BackendCommand::ListProjects { limit, respond_to } => {
                let _ = respond_to.send(self.handle_list_projects(limit));
            }
            BackendCommand::StartTask {
                task_type,
                input,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_start_task(task_type, input));
            }
            BackendCommand::Deploy { code, respond_to } => {
                let _ = respond_to.send(self.handle_deploy(&code));
            }
            BackendCommand::GetStatus {
                task_type,
                task_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_get_status(task_type, task_id));
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    fn take_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        id
    }

    fn handle_register_wallet(&mut self, wallet_address: String) -> String {
        if let Some(user_id) = self.users.get(&wallet_address) {
            return user_id.clone();
        }
        let user_id = format!("sim-user-{}", self.take_id());
        info!(wallet = %wallet_address, user_id = %user_id, "Wallet registered");
        self.users.insert(wallet_address, user_id.clone());
        user_id
    }

    fn handle_list_projects(&self, limit: usize) -> Vec<ProjectSummary> {
        self.order
            .iter()
            .rev()
            .filter_map(|id| self.tasks.get(id))
            .take(limit)
            .map(SimTask::summary)
            .collect()
    }

    fn handle_start_task(&mut self, task_type: TaskType, input: String) -> StartedTask {
        let id = TaskId::new(format!("sim-{}-{}", task_type.as_str(), self.take_id()));
        let now = Utc::now();
        let name = match task_type {
            TaskType::Generate => Some(script::contract_name(&input)),
            _ => None,
        };

        if self.order.len() >= MAX_TASKS {
            let evicted = self.order.remove(0);
            self.tasks.remove(&evicted);
            debug!(task_id = %evicted, "Evicted oldest task");
        }

        self.tasks.insert(
            id.clone(),
            SimTask {
                id: id.clone(),
                task_type,
                step: 0,
                input,
                name,
                created_at: now,
                updated_at: now,
                reported: TaskStatus::New,
            },
        );
        self.order.push(id.clone());

        info!(task_id = %id, task_type = %task_type, "Task started");

        StartedTask {
            task_id: id,
            status: TaskStatus::New,
        }
    }

    fn handle_deploy(&mut self, code: &str) -> String {
        let address = format!("Sim{}", uuid::Uuid::new_v4().simple());
        info!(
            address = %address,
            artifact = %script::artifact_digest(code),
            "Contract deployed"
        );
        address
    }

    fn handle_get_status(
        &mut self,
        task_type: TaskType,
        task_id: TaskId,
    ) -> Result<StatusReport, BackendError> {
        let task = match self.tasks.get_mut(&task_id) {
            Some(task) if task.task_type == task_type => task,
            _ => {
                debug!(task_id = %task_id, task_type = %task_type, "Status for unknown task");
                return Err(BackendError::TaskNotFound(task_id));
            }
        };

        let script = script::statuses(task_type);
        let last = script.len().saturating_sub(1);
        let status = script.get(task.step).cloned().unwrap_or_default();
        task.step = task.step.saturating_add(1).min(last);
        task.reported = status.clone();
        task.updated_at = Utc::now();

        let mut report = StatusReport::new(status.clone());
        report.task_id = Some(task.id.clone());

        if status.is_complete(task_type) {
            report = match task_type {
                TaskType::Generate => report
                    .with_detail("code", script::generated_source(&task.input))
                    .with_detail("name", task.name.clone().unwrap_or_default()),
                TaskType::Audit => report.with_detail("audit_report", script::audit_report(&task.input)),
                TaskType::Build => report.with_detail("artifact", script::artifact_digest(&task.input)),
                TaskType::Deploy => {
                    report.with_detail("contract_address", format!("Sim{}", uuid::Uuid::new_v4().simple()))
                }
            };
        }

        debug!(task_id = %task.id, status = %status, step = task.step, "Status reported");
        Ok(report)
    }
}
