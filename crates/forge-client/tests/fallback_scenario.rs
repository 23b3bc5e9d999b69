//! End-to-end tests for the session orchestrator and the fallback switch.
//!
//! The primary transport is scripted; the fallback is the real sim backend
//! unless a test needs to observe fallback calls.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

mod common;

use std::sync::Arc;

use common::{tracker_config, ScriptedTransport};
use forge_client::storage;
use forge_client::{
    ClientError, FallbackTransport, FileStore, KeyValueStore, MemoryStore, SessionConfig,
    SessionOrchestrator, TrackOutcome, TrackRequest, Transport, TransportError,
    TransportErrorKind, Transports,
};
use forge_core::{ActiveTask, TaskId, TaskStatus, TaskType, User, UserId, WalletAddress};
use tempfile::TempDir;

// ============================================================================
// Test Helpers
// ============================================================================

struct Harness {
    orchestrator: SessionOrchestrator,
    primary: Arc<ScriptedTransport>,
    store: Arc<MemoryStore>,
}

fn harness_with(primary: ScriptedTransport, fallback: Arc<dyn Transport>) -> Harness {
    let primary = primary.into_arc();
    let store = Arc::new(MemoryStore::new());
    let orchestrator = SessionOrchestrator::new(
        Transports::new(primary.clone(), fallback),
        store.clone(),
    );
    Harness {
        orchestrator,
        primary,
        store,
    }
}

fn harness(primary: ScriptedTransport) -> Harness {
    harness_with(primary, Arc::new(FallbackTransport::spawn()))
}

fn wallet() -> WalletAddress {
    WalletAddress::parse("7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU").unwrap()
}

fn refused() -> TransportError {
    TransportError::network("Connection refused (os error 111)")
}

// ============================================================================
// Fallback Switch
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_connection_refused_switches_whole_session() {
    let h = harness(ScriptedTransport::failing(refused()));
    storage::set_auth_token(h.store.as_ref(), "stale-token");

    // Wallet registration falls back and gets a sim user id
    let step = h
        .orchestrator
        .initialize_user(SessionConfig::primary(), &wallet())
        .await;
    let session = step.session;
    assert!(session.is_fallback());
    assert!(step.value.id.as_str().starts_with("sim-user-"));
    assert!(storage::auth_token(h.store.as_ref()).is_none());
    // Pairings minted in fallback mode are not persisted
    assert!(storage::load_user(h.store.as_ref(), &wallet()).is_none());
    assert_eq!(h.primary.call_count(), 1);

    // Every later call goes straight to the fallback
    let step = h
        .orchestrator
        .start_generate(session, "an SPL token with a fixed supply", None)
        .await
        .unwrap();
    let (project, session) = step.into_parts();
    assert!(session.is_fallback());
    assert_eq!(h.primary.call_count(), 1);

    // Tracking through the session's transport reaches completion
    let tracker = h.orchestrator.tracker(&session, tracker_config(60));
    let outcome = tracker
        .track(TrackRequest::new(
            project.id.clone(),
            TaskType::Generate,
            project.backend_task_id.clone(),
        ))
        .wait()
        .await;

    let report = match outcome {
        TrackOutcome::Completed(report) => report,
        other => panic!("expected completion, got {other:?}"),
    };
    assert!(report.code().unwrap().contains("fixed supply"));

    let tracked = h.orchestrator.projects().get(&project.id).unwrap();
    assert_eq!(tracked.status, TaskStatus::Generated);
    assert!(tracked.source_code.is_some());
    assert_eq!(h.primary.call_count(), 1);
}

#[tokio::test]
async fn test_start_generate_retried_on_fallback_after_refusal() {
    let h = harness(ScriptedTransport::failing(TransportError::new(
        TransportErrorKind::Network,
        "Connection refused",
    )));

    let step = h
        .orchestrator
        .start_generate(SessionConfig::primary(), "mint an SPL token", None)
        .await
        .unwrap();

    assert!(step.session.is_fallback());
    assert_eq!(h.primary.calls(), vec!["start_generate:mint an SPL token".to_string()]);

    let project = step.value;
    assert_eq!(project.active_task, ActiveTask::Generate);
    assert_eq!(project.status, TaskStatus::InProgress);
    assert!(project.backend_task_id.is_some());
    assert_eq!(h.orchestrator.projects().get(&project.id), Some(project));
}

#[tokio::test]
async fn test_non_critical_error_propagates_without_switch() {
    let fallback = ScriptedTransport::new().into_arc();
    let h = harness_with(
        ScriptedTransport::failing(TransportError::new(
            TransportErrorKind::Http { status: 400 },
            "bad request",
        )),
        fallback.clone(),
    );

    let err = h
        .orchestrator
        .start_audit(SessionConfig::primary(), "pub fn a() {}", None)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Transport(ref e) if e.message == "bad request"));
    assert!(err.switched_session().is_none());
    assert_eq!(fallback.call_count(), 0);
    assert!(h.orchestrator.projects().is_empty());
}

#[tokio::test]
async fn test_critical_error_on_every_operation_kind() {
    for message in [
        "HTTP 401 Unauthorized: token expired",
        "HTTP 403 Forbidden: ",
        "HTTP 500 Internal Server Error: boom",
        "HTTP 503 Service Unavailable: maintenance",
        "blocked by CORS policy",
        "timeout: operation timed out",
    ] {
        let h = harness(ScriptedTransport::failing(TransportError::new(
            TransportErrorKind::Network,
            message,
        )));
        let step = h
            .orchestrator
            .start_build(SessionConfig::primary(), "code", None)
            .await
            .unwrap();
        assert!(step.session.is_fallback(), "{message} should switch");
        assert_eq!(step.session.fallback_reason(), Some(message));
        assert!(step.value.backend_task_id.unwrap().as_str().starts_with("sim-build-"));
    }
}

#[tokio::test]
async fn test_registration_failing_everywhere_mints_local_user() {
    let h = harness_with(
        ScriptedTransport::failing(refused()),
        ScriptedTransport::failing(TransportError::network("fallback down")).into_arc(),
    );

    let step = h
        .orchestrator
        .initialize_user(SessionConfig::primary(), &wallet())
        .await;

    assert!(step.session.is_fallback());
    assert!(step.value.id.is_local());
    assert_eq!(h.orchestrator.current_user(), Some(step.value));
}

#[tokio::test]
async fn test_non_critical_registration_failure_forces_fallback() {
    let h = harness(ScriptedTransport::failing(TransportError::new(
        TransportErrorKind::Http { status: 422 },
        "HTTP 422 Unprocessable Entity: bad wallet",
    )));

    let step = h
        .orchestrator
        .initialize_user(SessionConfig::primary(), &wallet())
        .await;

    assert!(step.session.is_fallback());
    assert!(step.value.id.is_local());
}

#[tokio::test]
async fn test_fallback_failure_reports_switched_session() {
    let h = harness_with(
        ScriptedTransport::failing(refused()),
        ScriptedTransport::failing(TransportError::new(
            TransportErrorKind::Http { status: 400 },
            "bad request",
        ))
        .into_arc(),
    );

    let err = h
        .orchestrator
        .start_generate(SessionConfig::primary(), "vault", None)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::FallbackFailed { .. }));
    assert!(err.switched_session().unwrap().is_fallback());
}

// ============================================================================
// User Session
// ============================================================================

#[tokio::test]
async fn test_stored_pairing_skips_registration() {
    let h = harness(ScriptedTransport::new());
    let user = User {
        id: UserId::new("user-42"),
        wallet_address: wallet(),
    };
    storage::save_user(h.store.as_ref(), &user);

    let step = h
        .orchestrator
        .initialize_user(SessionConfig::primary(), &wallet())
        .await;

    assert_eq!(step.value, user);
    assert!(!step.session.is_fallback());
    assert_eq!(h.primary.call_count(), 0);
}

#[tokio::test]
async fn test_primary_registration_persists_pairing() {
    let h = harness(ScriptedTransport::new());
    let step = h
        .orchestrator
        .initialize_user(SessionConfig::primary(), &wallet())
        .await;

    assert!(!step.session.is_fallback());
    assert_eq!(
        storage::load_user(h.store.as_ref(), &wallet()),
        Some(step.value)
    );
}

#[tokio::test]
async fn test_load_projects_uses_current_user_and_limit() {
    let h = harness(ScriptedTransport::new());
    let session = h
        .orchestrator
        .initialize_user(SessionConfig::primary(), &wallet())
        .await
        .session;

    h.orchestrator.load_projects(session).await.unwrap();
    let calls = h.primary.calls();
    assert_eq!(
        calls.last().unwrap(),
        &format!("list_projects:user-{}:50", wallet())
    );
}

#[tokio::test]
async fn test_deploy_requires_user() {
    let h = harness(ScriptedTransport::new());
    let err = h
        .orchestrator
        .deploy(SessionConfig::primary(), "code")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NoCurrentUser));
    assert_eq!(h.primary.call_count(), 0);

    let session = h
        .orchestrator
        .initialize_user(SessionConfig::primary(), &wallet())
        .await
        .session;
    let step = h.orchestrator.deploy(session, "code").await.unwrap();
    assert_eq!(step.value, "Addr111");
}

// ============================================================================
// Project Mutation
// ============================================================================

#[tokio::test]
async fn test_start_in_existing_project_mutates_in_place() {
    let h = harness(ScriptedTransport::new());
    let session = h
        .orchestrator
        .initialize_user(SessionConfig::primary(), &wallet())
        .await
        .session;
    let draft = h.orchestrator.create_project("Escrow").unwrap();

    let step = h
        .orchestrator
        .start_build(session, "pub fn escrow() {}", Some(&draft.id))
        .await
        .unwrap();

    assert_eq!(step.value.id, draft.id);
    assert_eq!(step.value.display_name.as_deref(), Some("Escrow"));
    assert_eq!(step.value.backend_task_id, Some(TaskId::new("build-1")));
    assert_eq!(step.value.status, TaskStatus::InProgress);
    assert_eq!(h.orchestrator.projects().len(), 1);
    assert_eq!(
        storage::load_code(h.store.as_ref(), &draft.id).as_deref(),
        Some("pub fn escrow() {}")
    );
}

#[tokio::test]
async fn test_start_without_project_creates_new_one() {
    let h = harness(ScriptedTransport::new());
    let first = h
        .orchestrator
        .start_audit(SessionConfig::primary(), "a", None)
        .await
        .unwrap();
    let second = h
        .orchestrator
        .start_build(first.session, "b", None)
        .await
        .unwrap();

    assert_ne!(first.value.id, second.value.id);
    let ids: Vec<_> = h
        .orchestrator
        .projects()
        .snapshot()
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(ids, vec![second.value.id.clone(), first.value.id.clone()]);
    assert_eq!(
        storage::current_project(h.store.as_ref() as &dyn KeyValueStore),
        Some(second.value.id)
    );
}

#[tokio::test]
async fn test_generate_in_project_returns_task_id() {
    let h = harness(ScriptedTransport::new());
    h.orchestrator
        .initialize_user(SessionConfig::primary(), &wallet())
        .await;
    let draft = h.orchestrator.create_project("Token").unwrap();

    let step = h
        .orchestrator
        .generate_in_project(SessionConfig::primary(), &draft.id, "a token")
        .await
        .unwrap();
    assert_eq!(step.value, TaskId::new("gen-1"));
    assert_eq!(
        h.orchestrator.projects().get(&draft.id).unwrap().backend_task_id,
        Some(TaskId::new("gen-1"))
    );
}

#[tokio::test]
async fn test_listing_after_start_keeps_one_row_per_task() {
    let h = harness(ScriptedTransport::failing(refused()));

    let step = h
        .orchestrator
        .start_generate(SessionConfig::primary(), "mint an SPL token", None)
        .await
        .unwrap();
    let (project, session) = step.into_parts();
    let task_id = project.backend_task_id.clone().unwrap();

    h.orchestrator.load_projects(session).await.unwrap();

    let rows = h.orchestrator.projects().snapshot();
    let for_task: Vec<_> = rows
        .iter()
        .filter(|p| p.backend_task_id.as_ref() == Some(&task_id))
        .collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(for_task.len(), 1);
    // The local id survives so trackers started earlier still find the row
    assert_eq!(for_task[0].id, project.id);
}

// ============================================================================
// Persistence
// ============================================================================

#[tokio::test]
async fn test_draft_survives_reopened_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.json");

    let draft = {
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&path));
        let orchestrator = SessionOrchestrator::new(
            Transports::new(ScriptedTransport::new().into_arc(), ScriptedTransport::new().into_arc()),
            store,
        );
        orchestrator
            .initialize_user(SessionConfig::primary(), &wallet())
            .await;
        orchestrator.create_project("Escrow").unwrap()
    };

    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&path));
    let orchestrator = SessionOrchestrator::new(
        Transports::new(ScriptedTransport::new().into_arc(), ScriptedTransport::new().into_arc()),
        store,
    );
    assert_eq!(orchestrator.projects().get(&draft.id), Some(draft.clone()));

    let session = orchestrator
        .initialize_user(SessionConfig::primary(), &wallet())
        .await
        .session;
    let step = orchestrator
        .start_build(session, "pub fn escrow() {}", Some(&draft.id))
        .await
        .unwrap();
    assert_eq!(step.value.id, draft.id);
    assert_eq!(step.value.backend_task_id, Some(TaskId::new("build-1")));
    assert_eq!(orchestrator.projects().len(), 1);
}
