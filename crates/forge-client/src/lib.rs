//! Client library for the forge contract pipeline.
//!
//! ```text
//! ┌──────────────────────┐  Step<T> + SessionConfig  ┌────────────┐
//! │ SessionOrchestrator  │◄─────────────────────────►│   caller   │
//! └──────────┬───────────┘                           └─────┬──────┘
//!            │ Transports::select(session)                 │ TrackerEvent
//!   ┌────────┴─────────┐                            ┌──────┴──────┐
//!   ▼                  ▼                            │ TaskTracker │
//! HttpTransport   FallbackTransport ◄───────────────┤ (per task)  │
//! (remote API)    (forge-sim actor)                 └──────┬──────┘
//!                                                          ▼
//!                                                     ProjectBook
//! ```
//!
//! - [`transport`]: one capability interface, two implementations.
//! - [`policy`]: which primary failures switch the session to fallback.
//! - [`orchestrator`]: user session, project collection, task starts.
//! - [`tracker`]: status polling state machine per task.
//! - [`storage`]: best-effort key-value persistence.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod policy;
pub mod projects;
pub mod session;
pub mod storage;
pub mod tracker;
pub mod transport;

pub use config::{ForgeConfig, TrackerConfig};
pub use error::{ClientError, Result, TransportError, TransportErrorKind};
pub use orchestrator::SessionOrchestrator;
pub use policy::{should_fallback, CRITICAL_PATTERNS};
pub use projects::ProjectBook;
pub use session::{SessionConfig, Step, TransportMode};
pub use storage::{ChatMessage, ChatRole, FileStore, KeyValueStore, MemoryStore};
pub use tracker::{TaskTracker, TrackOutcome, TrackRequest, TrackerEvent, TrackerHandle};
pub use transport::{FallbackTransport, HttpTransport, Transport, Transports};
