//! Task status tracker.
//!
//! Follows one backend task to a terminal outcome by polling its status on
//! a fixed schedule. Each tracked task is an explicit state machine:
//!
//! ```text
//!  Scheduled ──(initial delay)──► Polling ──┬──► Completed
//!                                   ▲  │    ├──► Failed
//!                                   └──┘    ├──► TimedOut
//!                             (poll interval) └──► Cancelled
//! ```
//!
//! Output is an event sequence: zero or more [`TrackerEvent::Progress`]
//! followed by exactly one [`TrackerEvent::Finished`].
//!
//! Polls always use the backend task id (falling back to the project id
//! when none was assigned); project updates are always keyed by the
//! project id. Polling never switches the session to fallback.

use std::sync::Arc;
use std::time::Duration;

use forge_core::{Progress, ProjectId, TaskId, TaskStatus, TaskType};
use forge_protocol::StatusReport;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::TrackerConfig;
use crate::error::TransportError;
use crate::policy::{self, PollFailure};
use crate::projects::ProjectBook;
use crate::transport::Transport;

// ============================================================================
// Events
// ============================================================================

/// How a tracked task ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackOutcome {
    /// The task reached its completion status; carries the last report.
    Completed(StatusReport),
    /// The backend reported an error, or the last poll before the attempt
    /// ceiling failed.
    Failed(String),
    /// The attempt ceiling was reached without a terminal status.
    TimedOut { attempts: u32 },
    /// Tracking was cancelled by the caller.
    Cancelled,
}

impl TrackOutcome {
    /// Message for the error channel, if this outcome is an error.
    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::Failed(message) => Some(message.clone()),
            Self::TimedOut { attempts } => Some(format!(
                "Task timed out: no terminal status after {attempts} status checks"
            )),
            Self::Completed(_) | Self::Cancelled => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed(_) => "completed",
            Self::Failed(_) => "failed",
            Self::TimedOut { .. } => "timed_out",
            Self::Cancelled => "cancelled",
        }
    }
}

/// One item of a tracker's output sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    Progress(Progress),
    Finished(TrackOutcome),
}

/// What to track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRequest {
    pub project_id: ProjectId,
    pub task_type: TaskType,
    pub backend_task_id: Option<TaskId>,
}

impl TrackRequest {
    pub fn new(project_id: ProjectId, task_type: TaskType, backend_task_id: Option<TaskId>) -> Self {
        Self {
            project_id,
            task_type,
            backend_task_id,
        }
    }

    /// Identifier every status poll uses.
    pub fn poll_id(&self) -> TaskId {
        self.backend_task_id
            .clone()
            .unwrap_or_else(|| TaskId::from(&self.project_id))
    }
}

// ============================================================================
// Tracking Session
// ============================================================================

/// Result of feeding one poll result into the state machine.
#[derive(Debug, Clone, PartialEq)]
enum Tick {
    Continue,
    Done(TrackOutcome),
}

/// Per-task state; never shared between trackers.
#[derive(Debug)]
struct TrackingSession {
    request: TrackRequest,
    poll_id: TaskId,
    attempts: u32,
    last_status: Option<TaskStatus>,
    last_error: Option<String>,
}

impl TrackingSession {
    fn new(request: TrackRequest) -> Self {
        let poll_id = request.poll_id();
        Self {
            request,
            poll_id,
            attempts: 0,
            last_status: None,
            last_error: None,
        }
    }
}

// ============================================================================
// Tracker
// ============================================================================

/// Polls task status through one transport and keeps the project
/// collection up to date.
#[derive(Clone)]
pub struct TaskTracker {
    transport: Arc<dyn Transport>,
    projects: ProjectBook,
    config: TrackerConfig,
}

impl TaskTracker {
    pub fn new(transport: Arc<dyn Transport>, projects: ProjectBook, config: TrackerConfig) -> Self {
        Self {
            transport,
            projects,
            config,
        }
    }

    /// Spawns a tracking task and returns its handle.
    ///
    /// Must be called inside a tokio runtime.
    pub fn track(&self, request: TrackRequest) -> TrackerHandle {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let tracker = self.clone();
        let token = cancel.clone();
        let join = tokio::spawn(async move { tracker.run(request, events_tx, token).await });
        TrackerHandle {
            events: events_rx,
            cancel,
            join,
        }
    }

    /// Runs the state machine to a terminal outcome on the current task.
    ///
    /// Events are sent on `events`; a dropped receiver does not stop
    /// polling, only `cancel` does.
    pub async fn run(
        &self,
        request: TrackRequest,
        events: mpsc::UnboundedSender<TrackerEvent>,
        cancel: CancellationToken,
    ) -> TrackOutcome {
        let mut session = TrackingSession::new(request);
        info!(
            project_id = %session.request.project_id,
            task_id = %session.poll_id,
            task_type = %session.request.task_type,
            transport = self.transport.name(),
            "Tracking task"
        );

        if !sleep_or_cancel(self.config.initial_delay(), &cancel).await {
            return finish(&session, TrackOutcome::Cancelled, &events);
        }

        loop {
            session.attempts = session.attempts.saturating_add(1);
            debug!(
                task_id = %session.poll_id,
                attempt = session.attempts,
                max_attempts = self.config.max_attempts,
                "Polling task status"
            );

            let result = tokio::select! {
                result = self.transport.get_status(session.request.task_type, &session.poll_id) => result,
                _ = cancel.cancelled() => {
                    return finish(&session, TrackOutcome::Cancelled, &events);
                }
            };

            if let Tick::Done(outcome) = self.observe(&mut session, result, &events) {
                return finish(&session, outcome, &events);
            }

            if !sleep_or_cancel(self.config.poll_interval(), &cancel).await {
                return finish(&session, TrackOutcome::Cancelled, &events);
            }
        }
    }

    /// Feeds one poll result into the state machine.
    fn observe(
        &self,
        session: &mut TrackingSession,
        result: Result<StatusReport, TransportError>,
        events: &mpsc::UnboundedSender<TrackerEvent>,
    ) -> Tick {
        match result {
            Err(err) => match policy::classify_poll_error(&err) {
                PollFailure::NotYetVisible => {
                    debug!(task_id = %session.poll_id, "Task not visible yet");
                    session.last_error = None;
                }
                PollFailure::Retryable => {
                    warn!(task_id = %session.poll_id, attempt = session.attempts, error = %err, "Status poll failed");
                    session.last_error = Some(err.to_string());
                }
            },
            Ok(report) => {
                session.last_error = None;
                session.last_status = Some(report.status.clone());
                self.record(&session.request.project_id, &report);

                let classification = report.status.classify(session.request.task_type);
                if classification.is_error {
                    if let Some(detail) = report.message.as_deref() {
                        warn!(task_id = %session.poll_id, detail, "Backend reported task failure");
                    }
                    return Tick::Done(TrackOutcome::Failed(classification.display_name));
                }

                let _ = events.send(TrackerEvent::Progress(classification.progress));

                if classification.is_complete {
                    return Tick::Done(TrackOutcome::Completed(report));
                }
            }
        }

        if session.attempts >= self.config.max_attempts {
            let outcome = match session.last_error.take() {
                Some(message) => TrackOutcome::Failed(message),
                None => TrackOutcome::TimedOut {
                    attempts: session.attempts,
                },
            };
            return Tick::Done(outcome);
        }
        Tick::Continue
    }

    /// Writes a status report into the project it belongs to.
    fn record(&self, project_id: &ProjectId, report: &StatusReport) {
        let updated = self.projects.update(project_id, |project| {
            project.apply_status(report.status.clone());
            if let Some(code) = report.code() {
                project.source_code = Some(code.to_string());
            }
            if project.display_name.is_none() {
                project.display_name = report.project_name().map(str::to_string);
            }
        });
        if updated.is_none() {
            debug!(project_id = %project_id, "Tracked project no longer in collection");
        }
    }
}

fn finish(
    session: &TrackingSession,
    outcome: TrackOutcome,
    events: &mpsc::UnboundedSender<TrackerEvent>,
) -> TrackOutcome {
    info!(
        project_id = %session.request.project_id,
        task_id = %session.poll_id,
        attempts = session.attempts,
        last_status = session.last_status.as_ref().map(TaskStatus::as_str),
        outcome = outcome.label(),
        "Tracking finished"
    );
    let _ = events.send(TrackerEvent::Finished(outcome.clone()));
    outcome
}

/// Sleeps for `duration`; returns false if cancelled first.
async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = cancel.cancelled() => false,
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Handle to a spawned tracking task.
pub struct TrackerHandle {
    events: mpsc::UnboundedReceiver<TrackerEvent>,
    cancel: CancellationToken,
    join: JoinHandle<TrackOutcome>,
}

impl TrackerHandle {
    /// Next event, or `None` once the sequence has ended.
    pub async fn next_event(&mut self) -> Option<TrackerEvent> {
        self.events.recv().await
    }

    /// Stops polling at the next await point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits for the terminal outcome, discarding unread events.
    pub async fn wait(self) -> TrackOutcome {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(e) => TrackOutcome::Failed(format!("tracker task failed: {e}")),
        }
    }
}
