//! Synthetic pipeline backend using the actor pattern.
//!
//! The actor is the single owner of registered wallets and started tasks.
//! Commands arrive over a tokio mpsc channel; each carries a oneshot sender
//! for its reply.

use tokio::sync::mpsc;

mod actor;
mod commands;
mod handle;

pub use actor::{BackendActor, MAX_TASKS};
pub use commands::{BackendCommand, BackendError, StartedTask};
pub use handle::BackendHandle;

/// Channel buffer size
const COMMAND_BUFFER: usize = 64;

/// Spawn the backend actor and return a handle for interaction.
///
/// Must be called from within a tokio runtime. The actor stops once
/// every handle clone has been dropped.
///
/// # Example
///
/// ```no_run
/// use forge_sim::spawn_backend;
///
/// #[tokio::main]
/// async fn main() {
///     let backend = spawn_backend();
///     let user_id = backend.register_wallet("7xKX...").await;
/// }
/// ```
pub fn spawn_backend() -> BackendHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let actor = BackendActor::new(cmd_rx);
    tokio::spawn(actor.run());
    BackendHandle::new(cmd_tx)
}
