//! Shared test helpers: a scripted transport that records every call.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use forge_client::{Transport, TransportError, TrackerConfig};
use forge_core::{TaskId, TaskType, UserId, WalletAddress};
use forge_protocol::{GenerateResponse, ProjectSummary, StatusReport};

/// Transport whose answers are fixed up front.
///
/// - Start/register/list calls fail with `start_error` if set, otherwise
///   succeed with predictable ids.
/// - `get_status` pops scripted replies in order; once the script is
///   exhausted it repeats `status_default`.
pub struct ScriptedTransport {
    start_error: Option<TransportError>,
    statuses: Mutex<VecDeque<Result<StatusReport, TransportError>>>,
    status_default: Result<StatusReport, TransportError>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            start_error: None,
            statuses: Mutex::new(VecDeque::new()),
            status_default: Err(TransportError::not_found("scripted task")),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: TransportError) -> Self {
        Self {
            start_error: Some(error),
            ..Self::new()
        }
    }

    pub fn with_statuses(mut self, replies: Vec<Result<StatusReport, TransportError>>) -> Self {
        self.statuses = Mutex::new(replies.into());
        self
    }

    pub fn with_status_default(mut self, reply: Result<StatusReport, TransportError>) -> Self {
        self.status_default = reply;
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn start_result(&self) -> Result<(), TransportError> {
        match &self.start_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn register_wallet(&self, wallet: &WalletAddress) -> Result<UserId, TransportError> {
        self.record(format!("register_wallet:{wallet}"));
        self.start_result()?;
        Ok(UserId::new(format!("user-{wallet}")))
    }

    async fn list_projects(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<ProjectSummary>, TransportError> {
        self.record(format!("list_projects:{user_id}:{limit}"));
        self.start_result()?;
        Ok(Vec::new())
    }

    async fn start_generate(&self, description: &str) -> Result<GenerateResponse, TransportError> {
        self.record(format!("start_generate:{description}"));
        self.start_result()?;
        Ok(GenerateResponse {
            task_id: TaskId::new("gen-1"),
            status: forge_core::TaskStatus::New,
            code: None,
        })
    }

    async fn start_audit(&self, _code: &str) -> Result<TaskId, TransportError> {
        self.record("start_audit".to_string());
        self.start_result()?;
        Ok(TaskId::new("audit-1"))
    }

    async fn start_build(&self, _code: &str) -> Result<TaskId, TransportError> {
        self.record("start_build".to_string());
        self.start_result()?;
        Ok(TaskId::new("build-1"))
    }

    async fn start_deploy(&self, _code: &str) -> Result<String, TransportError> {
        self.record("start_deploy".to_string());
        self.start_result()?;
        Ok("Addr111".to_string())
    }

    async fn get_status(
        &self,
        task_type: TaskType,
        task_id: &TaskId,
    ) -> Result<StatusReport, TransportError> {
        self.record(format!("get_status:{task_type}:{task_id}"));
        let scripted = self.statuses.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| self.status_default.clone())
    }
}

/// Default schedule with a custom attempt ceiling. Tests run with paused time.
pub fn tracker_config(max_attempts: u32) -> TrackerConfig {
    TrackerConfig {
        initial_delay_ms: 2000,
        poll_interval_ms: 3000,
        max_attempts,
    }
}
