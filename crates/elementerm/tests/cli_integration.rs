//! End-to-end tests of the CLI operations against a real daemon.
//!
//! Each test runs an in-process daemon on a temporary state directory and
//! drives it through the same library calls the `elementerm` and
//! `elementerm-hook` binaries use.
//!
//! Tests CAN use `.unwrap()` and `.expect()` - this is allowed.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use elementerm_cli::hook::report;
use elementerm_cli::sessions::{
    generate_session_id, register_session, remove_sessions, NewSession, Registration, RemoveOutcome,
    RemoveSelector,
};
use elementerm_cli::status::{status_report, DAEMON_NOT_RUNNING};
use elementerm_cli::CliError;
use elementerm_core::{read_snapshot, AppState, Config, DomainTag, Paths, SessionStatus};
use elementerm_protocol::HookEnv;
use elementermd::{Daemon, DaemonOptions};
use tempfile::TempDir;
use tokio::net::UnixStream;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

const DEADLINE: Duration = Duration::from_millis(500);
const WAIT_TIMEOUT: Duration = Duration::from_secs(2);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Test Helpers
// ============================================================================

struct RunningDaemon {
    paths: Paths,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    _dir: TempDir,
}

impl RunningDaemon {
    async fn start() -> Self {
        let dir = TempDir::new().unwrap();
        let paths = Paths::under(dir.path());
        let config = Config {
            reconcile_interval_secs: 0,
            ..Config::default()
        };

        let daemon = Daemon::start(DaemonOptions::new(paths.clone(), config)).unwrap();
        let cancel = CancellationToken::new();
        let run_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            daemon.run(run_cancel).await.unwrap();
        });

        let start = tokio::time::Instant::now();
        while UnixStream::connect(&paths.socket_path).await.is_err() {
            assert!(start.elapsed() < WAIT_TIMEOUT, "daemon socket never came up");
            sleep(POLL_INTERVAL).await;
        }

        Self {
            paths,
            cancel,
            handle,
            _dir: dir,
        }
    }

    async fn stop(self) {
        self.cancel.cancel();
        self.handle.await.unwrap();
    }
}

/// Polls the snapshot file until `check` accepts it.
async fn wait_for_snapshot<F>(paths: &Paths, check: F) -> AppState
where
    F: Fn(&AppState) -> bool,
{
    let start = tokio::time::Instant::now();
    loop {
        if let Ok(Some(state)) = read_snapshot(&paths.state_file) {
            if check(&state) {
                return state;
            }
        }
        assert!(start.elapsed() < WAIT_TIMEOUT, "snapshot never reached the expected state");
        sleep(POLL_INTERVAL).await;
    }
}

fn new_session(worktree: &str, domain: Option<DomainTag>) -> NewSession {
    NewSession::with_defaults(
        worktree,
        None,
        None,
        domain,
        PathBuf::from(format!("/w/myapp/{worktree}")),
    )
}

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn test_register_through_daemon() {
    let daemon = RunningDaemon::start().await;
    let id = generate_session_id();
    let session = new_session("feat-auth", Some(DomainTag::Back)).into_session(id.clone(), Utc::now());

    let how = register_session(&daemon.paths, session, DEADLINE).await.unwrap();
    assert_eq!(how, Registration::Daemon);

    let state = wait_for_snapshot(&daemon.paths, |s| s.sessions.contains_key(&id)).await;
    let stored = state.sessions.get(&id).unwrap();
    assert_eq!(stored.project, "myapp");
    assert_eq!(stored.branch, "wt/feat-auth");
    assert_eq!(stored.status, SessionStatus::Idle);
    assert!(state.projects.get("myapp").unwrap().contains(&id));

    daemon.stop().await;
}

#[tokio::test]
async fn test_register_without_daemon_writes_file() {
    let dir = TempDir::new().unwrap();
    let paths = Paths::under(dir.path().join("state"));
    let id = generate_session_id();
    let session = new_session("feat-ui", None).into_session(id.clone(), Utc::now());

    let how = register_session(&paths, session, DEADLINE).await.unwrap();
    assert_eq!(how, Registration::Direct);

    let state = read_snapshot(&paths.state_file).unwrap().unwrap();
    assert_eq!(state.sessions.get(&id).unwrap().worktree, "feat-ui");
}

#[tokio::test]
async fn test_direct_write_replaces_corrupt_file() {
    let dir = TempDir::new().unwrap();
    let paths = Paths::under(dir.path());
    std::fs::write(&paths.state_file, "{ truncated").unwrap();

    let session = new_session("feat-ui", None).into_session(generate_session_id(), Utc::now());
    register_session(&paths, session, DEADLINE).await.unwrap();

    let state = read_snapshot(&paths.state_file).unwrap().unwrap();
    assert_eq!(state.sessions.len(), 1);
}

// ============================================================================
// Removal
// ============================================================================

#[tokio::test]
async fn test_remove_without_snapshot() {
    let dir = TempDir::new().unwrap();
    let paths = Paths::under(dir.path());

    let outcome = remove_sessions(&paths, &RemoveSelector::All, DEADLINE).await.unwrap();
    assert_eq!(outcome, RemoveOutcome::NoSnapshot);
}

#[tokio::test]
async fn test_remove_unknown_worktree_leaves_file() {
    let dir = TempDir::new().unwrap();
    let paths = Paths::under(dir.path());
    let session = new_session("feat-auth", None).into_session(generate_session_id(), Utc::now());
    register_session(&paths, session, DEADLINE).await.unwrap();
    let before = std::fs::read_to_string(&paths.state_file).unwrap();

    let err = remove_sessions(&paths, &RemoveSelector::Worktree("nope".to_string()), DEADLINE)
        .await
        .unwrap_err();

    assert!(matches!(err, CliError::SessionNotFound { ref worktree } if worktree == "nope"));
    assert_eq!(err.to_string(), "Session with worktree \"nope\" not found.");
    assert_eq!(std::fs::read_to_string(&paths.state_file).unwrap(), before);
}

#[tokio::test]
async fn test_remove_notifies_running_daemon() {
    let daemon = RunningDaemon::start().await;
    let keep = generate_session_id();
    let drop = generate_session_id();
    for (id, worktree) in [(&keep, "feat-a"), (&drop, "feat-b")] {
        let session = new_session(worktree, None).into_session(id.clone(), Utc::now());
        register_session(&daemon.paths, session, DEADLINE).await.unwrap();
    }
    wait_for_snapshot(&daemon.paths, |s| s.sessions.len() == 2).await;

    let outcome = remove_sessions(&daemon.paths, &RemoveSelector::Worktree("feat-b".to_string()), DEADLINE)
        .await
        .unwrap();
    let RemoveOutcome::Removed(removed) = outcome else {
        panic!("expected a removal");
    };
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].id, drop);

    // The daemon also dropped it, so its next write does not resurrect it.
    let later = generate_session_id();
    let session = new_session("feat-c", None).into_session(later.clone(), Utc::now());
    register_session(&daemon.paths, session, DEADLINE).await.unwrap();
    let state = wait_for_snapshot(&daemon.paths, |s| s.sessions.contains_key(&later)).await;
    assert!(state.sessions.contains_key(&keep));
    assert!(!state.sessions.contains_key(&drop));

    daemon.stop().await;
}

#[tokio::test]
async fn test_remove_all_without_daemon() {
    let dir = TempDir::new().unwrap();
    let paths = Paths::under(dir.path());
    for worktree in ["a", "b", "c"] {
        let session = new_session(worktree, None).into_session(generate_session_id(), Utc::now());
        register_session(&paths, session, DEADLINE).await.unwrap();
    }

    let outcome = remove_sessions(&paths, &RemoveSelector::All, DEADLINE).await.unwrap();

    assert!(matches!(outcome, RemoveOutcome::Removed(ref r) if r.len() == 3));
    let state = read_snapshot(&paths.state_file).unwrap().unwrap();
    assert!(state.sessions.is_empty());
}

// ============================================================================
// Hook Reporting
// ============================================================================

#[tokio::test]
async fn test_hook_report_moves_session_to_flow() {
    let daemon = RunningDaemon::start().await;
    let id = generate_session_id();
    let session = new_session("feat-auth", None).into_session(id.clone(), Utc::now());
    register_session(&daemon.paths, session, DEADLINE).await.unwrap();
    wait_for_snapshot(&daemon.paths, |s| s.sessions.contains_key(&id)).await;

    let env = HookEnv {
        session_id: Some(id.as_str().to_string()),
        event: None,
    };
    let stdin: &[u8] =
        br#"{"hook_event_name":"PostToolUse","tool_name":"Edit","tool_input":{"file_path":"src/auth.ts"}}"#;
    report(&daemon.paths.socket_path, stdin, &env, DEADLINE).await.unwrap();

    let state = wait_for_snapshot(&daemon.paths, |s| {
        s.sessions
            .get(&id)
            .is_some_and(|session| session.status == SessionStatus::Flow)
    })
    .await;
    assert!(state.sessions.get(&id).unwrap().files_modified.contains("src/auth.ts"));

    let stop: &[u8] = br#"{"hook_event_name":"Stop"}"#;
    report(&daemon.paths.socket_path, stop, &env, DEADLINE).await.unwrap();
    wait_for_snapshot(&daemon.paths, |s| {
        s.sessions
            .get(&id)
            .is_some_and(|session| session.status == SessionStatus::Ready)
    })
    .await;

    daemon.stop().await;
}

// ============================================================================
// Status
// ============================================================================

#[tokio::test]
async fn test_status_lists_running_sessions() {
    let daemon = RunningDaemon::start().await;
    let id = generate_session_id();
    let session = new_session("feat-auth", Some(DomainTag::Front)).into_session(id.clone(), Utc::now());
    register_session(&daemon.paths, session, DEADLINE).await.unwrap();
    wait_for_snapshot(&daemon.paths, |s| s.sessions.contains_key(&id)).await;

    let report = status_report(&daemon.paths, Utc::now()).unwrap();
    assert!(report.contains("Elementerm - 1 session"));
    assert!(report.contains("  myapp"));
    assert!(report.contains("feat-auth"));

    let paths = daemon.paths.clone();
    daemon.stop().await;

    // Graceful shutdown removes the pid file.
    assert_eq!(status_report(&paths, Utc::now()).unwrap(), DAEMON_NOT_RUNNING);
}
