//! Forge Core - Shared types for the contract pipeline dashboard
//!
//! This crate provides the domain types shared between the pipeline
//! client (`forge-client`), the in-process fallback backend (`forge-sim`)
//! and the `forge` CLI.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod project;
pub mod status;
pub mod user;

// Re-exports for convenience
pub use error::{DomainError, DomainResult};
pub use project::{ActiveTask, Project, ProjectId, TaskId, DEFAULT_STALE_THRESHOLD_SECS};
pub use status::{Classification, Progress, TaskStatus, TaskType};
pub use user::{User, UserId, WalletAddress};
