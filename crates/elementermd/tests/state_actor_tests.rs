//! Integration tests for the state actor and its handle.
//!
//! Tests CAN use `.unwrap()` and `.expect()` - this is allowed.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use elementerm_core::{
    read_snapshot, write_snapshot, DaemonInfo, HookEvent, HookEventKind, Session, SessionId, SessionStatus,
    SystemClock,
};
use elementerm_protocol::IpcMessage;
use elementermd::router::Routed;
use elementermd::state::{spawn_state_actor, StateError, StateEvent};
use elementermd::store::StateStore;
use tempfile::TempDir;
use tokio::time::timeout;

const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

fn loaded_store(path: &Path, pid: u32) -> StateStore {
    let mut store = StateStore::new(
        path,
        DaemonInfo::capture(&SystemClock, pid),
        Arc::new(SystemClock),
    );
    store.load().unwrap();
    store
}

fn session(id: &str) -> Session {
    Session::new(SessionId::new(id), "myapp", "auth", "wt/auth", "/w/myapp/auth", Utc::now())
}

#[tokio::test]
async fn test_dispatch_applies_and_publishes() {
    let dir = TempDir::new().unwrap();
    let handle = spawn_state_actor(loaded_store(&dir.path().join("state.json"), 1), None);
    let mut events = handle.subscribe();

    let routed = handle
        .dispatch(IpcMessage::session_created(session("s1")))
        .await
        .unwrap();
    assert_eq!(routed, Routed::SessionAdded);

    let StateEvent::Changed(state) = timeout(EVENT_TIMEOUT, events.recv()).await.unwrap().unwrap();
    assert!(state.sessions.contains_key(&SessionId::new("s1")));

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot, *state);
}

#[tokio::test]
async fn test_ignored_record_still_publishes() {
    let dir = TempDir::new().unwrap();
    let handle = spawn_state_actor(loaded_store(&dir.path().join("state.json"), 1), None);
    let mut events = handle.subscribe();

    let event = HookEvent::new("ghost", HookEventKind::Stop, 0);
    let routed = handle.dispatch(IpcMessage::HookEvent(event)).await.unwrap();

    assert_eq!(routed, Routed::Ignored);
    assert!(timeout(EVENT_TIMEOUT, events.recv()).await.unwrap().is_ok());
}

#[tokio::test]
async fn test_submitted_records_apply_in_order() {
    let dir = TempDir::new().unwrap();
    let handle = spawn_state_actor(loaded_store(&dir.path().join("state.json"), 1), None);

    handle.submit(IpcMessage::session_created(session("s1"))).await.unwrap();
    handle
        .submit(IpcMessage::HookEvent(HookEvent::new("s1", HookEventKind::PostToolUse, 0)))
        .await
        .unwrap();
    handle
        .submit(IpcMessage::HookEvent(HookEvent::new("s1", HookEventKind::Stop, 0)))
        .await
        .unwrap();

    let state = handle.snapshot().await.unwrap();
    assert_eq!(
        state.sessions.get(&SessionId::new("s1")).unwrap().status,
        SessionStatus::Ready
    );
}

#[tokio::test]
async fn test_reconcile_publishes_only_on_change() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    let handle = spawn_state_actor(loaded_store(&path, 42), None);
    handle.dispatch(IpcMessage::session_created(session("s1"))).await.unwrap();

    let mut events = handle.subscribe();

    // Nothing changed on disk: no event.
    handle.reconcile().await.unwrap();
    handle.snapshot().await.unwrap();
    assert!(events.try_recv().is_err());

    // An external writer marks the session blocked.
    let mut external = read_snapshot(&path).unwrap().unwrap();
    external
        .session_mut(&SessionId::new("s1"))
        .unwrap()
        .set_status(SessionStatus::Blocked);
    external.daemon = DaemonInfo::default();
    write_snapshot(&path, &external).unwrap();

    handle.reconcile().await.unwrap();
    let StateEvent::Changed(state) = timeout(EVENT_TIMEOUT, events.recv()).await.unwrap().unwrap();

    assert_eq!(
        state.sessions.get(&SessionId::new("s1")).unwrap().status,
        SessionStatus::Blocked
    );
    assert_eq!(state.daemon.pid, 42);
}

#[tokio::test]
async fn test_periodic_reconcile_picks_up_external_writes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    let handle = spawn_state_actor(loaded_store(&path, 1), Some(Duration::from_millis(50)));
    let mut events = handle.subscribe();

    let mut external = read_snapshot(&path).unwrap().unwrap();
    external.insert_session(session("s9"));
    write_snapshot(&path, &external).unwrap();

    let StateEvent::Changed(state) = timeout(EVENT_TIMEOUT, events.recv()).await.unwrap().unwrap();
    assert!(state.sessions.contains_key(&SessionId::new("s9")));
}

#[tokio::test]
async fn test_shutdown_deletes_snapshot_and_stops_actor() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    let handle = spawn_state_actor(loaded_store(&path, 1), None);
    assert!(path.exists());

    handle.shutdown().await.unwrap();

    assert!(!path.exists());
    assert!(matches!(
        handle.snapshot().await,
        Err(StateError::ChannelClosed)
    ));
}
