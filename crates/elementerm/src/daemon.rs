//! Starting and stopping the daemon from the CLI.
//!
//! The pid file is the only handle the CLI has on the daemon. A pid file
//! naming a dead process counts as "not running".

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use elementerm_core::{is_process_alive, Paths};
use tracing::{debug, info};

use crate::error::{CliError, Result};

/// Name of the daemon binary, looked up next to the running executable first.
pub const DAEMON_BINARY: &str = "elementermd";

const START_POLL_INTERVAL: Duration = Duration::from_millis(100);
const START_POLL_ATTEMPTS: u32 = 30;
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);
const STOP_POLL_ATTEMPTS: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    AlreadyRunning { pid: u32 },
    Started { pid: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    NotRunning,
    /// SIGTERM delivered.
    Stopped { pid: u32 },
    /// The pid file named a process that no longer exists.
    ProcessNotFound { pid: u32 },
}

/// Reads the pid recorded in the pid file, if any.
pub fn read_pid(path: &Path) -> Option<u32> {
    let contents = fs::read_to_string(path).ok()?;
    contents.trim().parse().ok().filter(|pid| *pid != 0)
}

/// Returns the pid of a live daemon.
pub fn running_pid(paths: &Paths) -> Option<u32> {
    read_pid(&paths.pid_file).filter(|pid| is_process_alive(*pid))
}

/// Starts the daemon unless one is already running.
///
/// Spawns `elementermd start -d` and waits up to 3 seconds for it to
/// record its pid.
pub fn start_daemon(paths: &Paths) -> Result<StartOutcome> {
    if let Some(pid) = running_pid(paths) {
        debug!(pid, "Daemon already running");
        return Ok(StartOutcome::AlreadyRunning { pid });
    }

    spawn_daemon().map_err(|e| CliError::DaemonControl(format!("Failed to start daemon: {e}")))?;

    for attempt in 0..START_POLL_ATTEMPTS {
        thread::sleep(START_POLL_INTERVAL);

        if let Some(pid) = running_pid(paths) {
            info!(pid, attempts = attempt + 1, "Daemon started");
            return Ok(StartOutcome::Started { pid });
        }
    }

    Err(CliError::DaemonControl(format!(
        "Failed to start daemon. Check logs at {}",
        paths.log_file("daemon").display()
    )))
}

/// Sends SIGTERM to the daemon, waits up to 5 seconds for it to exit, then
/// removes the pid file.
///
/// The pid file is removed even when the process is already gone. A daemon
/// that outlives the wait keeps its pid file: it still owns the socket and
/// the snapshot, so a new daemon must not start yet.
pub fn stop_daemon(paths: &Paths) -> Result<StopOutcome> {
    stop_daemon_within(paths, STOP_POLL_INTERVAL, STOP_POLL_ATTEMPTS)
}

fn stop_daemon_within(paths: &Paths, interval: Duration, attempts: u32) -> Result<StopOutcome> {
    let Some(pid) = read_pid(&paths.pid_file) else {
        return Ok(StopOutcome::NotRunning);
    };

    let outcome = if signal_terminate(pid) {
        info!(pid, "Sent SIGTERM to daemon");
        if !wait_for_exit(pid, interval, attempts) {
            return Err(CliError::DaemonControl(format!(
                "Daemon (PID: {pid}) did not stop within {}ms.",
                interval.saturating_mul(attempts).as_millis()
            )));
        }
        StopOutcome::Stopped { pid }
    } else {
        StopOutcome::ProcessNotFound { pid }
    };

    match fs::remove_file(&paths.pid_file) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(CliError::Io(e)),
    }

    Ok(outcome)
}

/// Polls until `pid` is gone. Returns false if it is still alive after
/// `attempts` polls.
fn wait_for_exit(pid: u32, interval: Duration, attempts: u32) -> bool {
    for attempt in 0..attempts {
        if !is_process_alive(pid) {
            debug!(pid, attempts = attempt, "Daemon exited");
            return true;
        }
        thread::sleep(interval);
    }
    !is_process_alive(pid)
}

/// Location of the daemon binary.
fn daemon_binary() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.join(DAEMON_BINARY)))
        .filter(|p| p.exists())
        .unwrap_or_else(|| PathBuf::from(DAEMON_BINARY))
}

fn spawn_daemon() -> std::io::Result<()> {
    let path = daemon_binary();
    debug!(path = %path.display(), "Starting daemon");

    Command::new(&path)
        .args(["start", "-d"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    Ok(())
}

#[cfg(unix)]
fn signal_terminate(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    unsafe { libc::kill(raw, libc::SIGTERM) == 0 }
}

#[cfg(not(unix))]
fn signal_terminate(_pid: u32) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_pid_variants() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("daemon.pid");

        assert_eq!(read_pid(&path), None);
        fs::write(&path, "4242\n").unwrap();
        assert_eq!(read_pid(&path), Some(4242));
        fs::write(&path, "0").unwrap();
        assert_eq!(read_pid(&path), None);
        fs::write(&path, "abc").unwrap();
        assert_eq!(read_pid(&path), None);
    }

    #[test]
    fn test_running_pid_ignores_dead_process() {
        let dir = TempDir::new().unwrap();
        let paths = Paths::under(dir.path());

        fs::write(&paths.pid_file, "999999999").unwrap();
        assert_eq!(running_pid(&paths), None);

        fs::write(&paths.pid_file, std::process::id().to_string()).unwrap();
        assert_eq!(running_pid(&paths), Some(std::process::id()));
    }

    #[test]
    fn test_stop_without_pid_file() {
        let dir = TempDir::new().unwrap();
        let paths = Paths::under(dir.path());
        assert_eq!(stop_daemon(&paths).unwrap(), StopOutcome::NotRunning);
    }

    #[test]
    fn test_stop_dead_pid_still_removes_file() {
        let dir = TempDir::new().unwrap();
        let paths = Paths::under(dir.path());
        fs::write(&paths.pid_file, "999999999").unwrap();

        assert_eq!(
            stop_daemon(&paths).unwrap(),
            StopOutcome::ProcessNotFound { pid: 999_999_999 }
        );
        assert!(!paths.pid_file.exists());
    }

    /// Spawns `sh -c script` and reaps it on a background thread, so the
    /// pid disappears as soon as the process exits.
    fn spawn_reaped(script: &str) -> (u32, thread::JoinHandle<()>) {
        let mut child = Command::new("sh").args(["-c", script]).spawn().unwrap();
        let pid = child.id();
        let reaper = thread::spawn(move || {
            let _ = child.wait();
        });
        (pid, reaper)
    }

    #[test]
    fn test_stop_returns_after_process_exits() {
        let dir = TempDir::new().unwrap();
        let paths = Paths::under(dir.path());
        // Exits a moment after SIGTERM, like a daemon flushing its state.
        let (pid, reaper) = spawn_reaped("trap 'sleep 0.3; exit 0' TERM; while true; do sleep 0.05; done");
        thread::sleep(Duration::from_millis(200));
        fs::write(&paths.pid_file, pid.to_string()).unwrap();

        assert_eq!(stop_daemon(&paths).unwrap(), StopOutcome::Stopped { pid });

        assert!(!is_process_alive(pid));
        assert!(!paths.pid_file.exists());
        reaper.join().unwrap();
    }

    #[test]
    fn test_stop_keeps_pid_file_while_daemon_lingers() {
        let dir = TempDir::new().unwrap();
        let paths = Paths::under(dir.path());
        let (pid, reaper) = spawn_reaped("trap '' TERM; while true; do sleep 0.05; done");
        thread::sleep(Duration::from_millis(200));
        fs::write(&paths.pid_file, pid.to_string()).unwrap();

        let err = stop_daemon_within(&paths, Duration::from_millis(20), 3).unwrap_err();

        assert!(matches!(err, CliError::DaemonControl(_)));
        assert!(paths.pid_file.exists());
        assert_eq!(running_pid(&paths), Some(pid));

        unsafe {
            libc::kill(pid as i32, libc::SIGKILL);
        }
        reaper.join().unwrap();
    }

    #[test]
    fn test_start_reports_already_running() {
        let dir = TempDir::new().unwrap();
        let paths = Paths::under(dir.path());
        fs::write(&paths.pid_file, std::process::id().to_string()).unwrap();

        assert_eq!(
            start_daemon(&paths).unwrap(),
            StartOutcome::AlreadyRunning {
                pid: std::process::id()
            }
        );
    }
}
