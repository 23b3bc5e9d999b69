//! Forge Sim - In-process pipeline backend
//!
//! A synthetic stand-in for the remote contract pipeline. It answers the
//! same operations with generated data and advances each task one status
//! per poll, so the client's tracking logic behaves exactly as it would
//! against the real service.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  BackendCommand  ┌──────────────────┐
//! │  BackendHandle   │─────────────────▶│   BackendActor   │
//! │ (cheap to clone) │   (mpsc + reply  │ (owns all tasks) │
//! └──────────────────┘    oneshot)      └──────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod backend;
pub mod script;

pub use backend::{spawn_backend, BackendActor, BackendCommand, BackendError, BackendHandle, StartedTask};
