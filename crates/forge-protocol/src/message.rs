//! Request and response bodies for the start/register calls.

use forge_core::{TaskId, TaskStatus};
use serde::{Deserialize, Serialize};

/// Body of a wallet registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterWalletRequest {
    pub wallet_address: String,
}

/// Response to a wallet registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterWalletResponse {
    pub user_id: String,
}

/// Body of a generate call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Natural-language description of the contract.
    pub description: String,
}

/// Response to a generate call.
///
/// Some backends answer synchronously and include the code right away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub task_id: TaskId,
    #[serde(default = "default_new_status")]
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

fn default_new_status() -> TaskStatus {
    TaskStatus::New
}

/// Body of audit, build and deploy calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeRequest {
    pub code: String,
}

/// Response to audit and build calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskAccepted {
    pub task_id: TaskId,
}

/// Response to a deploy call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployResponse {
    pub contract_address: String,
}
