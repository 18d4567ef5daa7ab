//! Daemon supervisor lifecycle tests: lock handling, restart recovery and
//! graceful shutdown.
//!
//! Tests CAN use `.unwrap()` and `.expect()` - this is allowed.

use std::time::Duration;

use chrono::Utc;
use elementerm_core::{
    read_snapshot, write_snapshot, AppState, Config, DaemonInfo, Paths, Session, SessionId, SessionStatus,
};
use elementermd::lock::{read_pid, LockError};
use elementermd::{Daemon, DaemonOptions, SupervisorError};
use tempfile::TempDir;
use tokio::net::UnixStream;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// A pid no real system hands out.
const DEAD_PID: u32 = 999_999_999;

const SOCKET_WAIT_TIMEOUT: Duration = Duration::from_millis(500);
const SOCKET_POLL_INTERVAL: Duration = Duration::from_millis(10);

fn options(dir: &TempDir) -> DaemonOptions {
    let config = Config {
        reconcile_interval_secs: 0,
        ..Config::default()
    };
    DaemonOptions::new(Paths::under(dir.path()), config)
}

async fn wait_for_socket(paths: &Paths) {
    let start = tokio::time::Instant::now();
    while UnixStream::connect(&paths.socket_path).await.is_err() {
        assert!(start.elapsed() < SOCKET_WAIT_TIMEOUT, "daemon socket never came up");
        sleep(SOCKET_POLL_INTERVAL).await;
    }
}

#[tokio::test]
async fn test_stale_lock_file_is_replaced_with_own_pid() {
    let dir = TempDir::new().unwrap();
    let opts = options(&dir);
    std::fs::write(&opts.paths.pid_file, DEAD_PID.to_string()).unwrap();

    let daemon = Daemon::start(opts.clone()).unwrap();

    assert_eq!(read_pid(&opts.paths.pid_file), Some(std::process::id()));
    assert_eq!(daemon.pid(), std::process::id());
}

#[tokio::test]
async fn test_second_start_reports_running_pid() {
    let dir = TempDir::new().unwrap();
    let _first = Daemon::start(options(&dir)).unwrap();

    let mut second = options(&dir);
    second.pid = DEAD_PID;
    let err = Daemon::start(second).err().expect("second start must fail");

    match err {
        SupervisorError::Lock(LockError::AlreadyRunning { pid }) => {
            assert_eq!(pid, std::process::id());
        }
        other => panic!("Expected AlreadyRunning, got {other:?}"),
    }
    // The running daemon's files are untouched.
    let paths = Paths::under(dir.path());
    assert_eq!(read_pid(&paths.pid_file), Some(std::process::id()));
    assert!(paths.state_file.exists());
}

#[tokio::test]
async fn test_restart_resets_sessions_to_idle() {
    let dir = TempDir::new().unwrap();
    let paths = Paths::under(dir.path());

    let mut previous = AppState::empty(DaemonInfo::default());
    let mut busy = Session::new(SessionId::new("s1"), "myapp", "auth", "wt/auth", "/w/myapp/auth", Utc::now());
    busy.set_status(SessionStatus::Flow);
    previous.insert_session(busy);
    write_snapshot(&paths.state_file, &previous).unwrap();

    let _daemon = Daemon::start(options(&dir)).unwrap();

    let disk = read_snapshot(&paths.state_file).unwrap().unwrap();
    assert_eq!(
        disk.sessions.get(&SessionId::new("s1")).unwrap().status,
        SessionStatus::Idle
    );
    assert_eq!(disk.daemon.pid, std::process::id());
}

#[tokio::test]
async fn test_corrupt_snapshot_backed_up_on_start() {
    let dir = TempDir::new().unwrap();
    let paths = Paths::under(dir.path());
    std::fs::write(&paths.state_file, "{ not json").unwrap();

    let _daemon = Daemon::start(options(&dir)).unwrap();

    assert_eq!(std::fs::read_to_string(paths.backup_file()).unwrap(), "{ not json");
    assert!(read_snapshot(&paths.state_file).unwrap().unwrap().sessions.is_empty());
}

#[tokio::test]
async fn test_graceful_shutdown_removes_all_artifacts() {
    let dir = TempDir::new().unwrap();
    let paths = Paths::under(dir.path());
    let daemon = Daemon::start(options(&dir)).unwrap();

    let cancel = CancellationToken::new();
    let run = tokio::spawn(daemon.run(cancel.clone()));
    wait_for_socket(&paths).await;
    assert!(paths.state_file.exists());
    assert!(paths.pid_file.exists());

    cancel.cancel();
    run.await.unwrap().unwrap();

    assert!(!paths.socket_path.exists());
    assert!(!paths.state_file.exists());
    assert!(!paths.pid_file.exists());
}

#[tokio::test]
async fn test_lock_released_after_shutdown_allows_restart() {
    let dir = TempDir::new().unwrap();
    let daemon = Daemon::start(options(&dir)).unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    daemon.run(cancel).await.unwrap();

    let again = Daemon::start(options(&dir)).unwrap();
    assert_eq!(again.pid(), std::process::id());
}
