//! Single-instance lock on the daemon pid file.
//!
//! The pid file is held under an exclusive advisory lock (`fs2`) for the life
//! of the daemon. The recorded pid is also probed for liveness so a daemon
//! that never took the lock still blocks a second start.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;
use tracing::{debug, info, warn};

use elementerm_core::is_process_alive;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("Elementerm daemon already running (PID: {pid})")]
    AlreadyRunning { pid: u32 },

    #[error("Lock file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Exclusive ownership of the daemon pid file.
///
/// The advisory lock is released when the file handle closes, which also
/// happens if the process dies without calling `release`.
#[derive(Debug)]
pub struct DaemonLock {
    path: PathBuf,
    file: File,
    pid: u32,
}

impl DaemonLock {
    /// Acquires the lock and records `pid` in the file.
    ///
    /// A file left behind by a dead process is taken over silently.
    pub fn acquire(path: impl Into<PathBuf>, pid: u32) -> Result<Self, LockError> {
        let path = path.into();
        let io_error = |source: std::io::Error| LockError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_error)?;
            }
        }

        // No truncate before the lock is held: that would wipe the running
        // daemon's pid.
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(io_error)?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.kind() == fs2::lock_contended_error().kind() {
                let pid = read_pid(&path).unwrap_or(0);
                return Err(LockError::AlreadyRunning { pid });
            }
            return Err(io_error(e));
        }

        let mut contents = String::new();
        file.read_to_string(&mut contents).map_err(io_error)?;
        if let Some(recorded) = parse_pid(&contents) {
            if recorded != pid && is_process_alive(recorded) {
                let _ = FileExt::unlock(&file);
                return Err(LockError::AlreadyRunning { pid: recorded });
            }
            debug!(stale_pid = recorded, path = %path.display(), "Replacing stale pid file");
        }

        file.set_len(0).map_err(io_error)?;
        file.seek(SeekFrom::Start(0)).map_err(io_error)?;
        writeln!(file, "{pid}").map_err(io_error)?;
        file.sync_all().map_err(io_error)?;

        info!(pid, path = %path.display(), "Acquired daemon lock");
        Ok(Self { path, file, pid })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Removes the pid file and releases the lock.
    pub fn release(self) {
        // Remove while still holding the lock so no newcomer's file is deleted.
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove pid file"),
        }
        let _ = FileExt::unlock(&self.file);
        debug!(path = %self.path.display(), "Released daemon lock");
    }
}

/// Reads the pid recorded in a pid file, if any.
pub fn read_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path)
        .ok()
        .as_deref()
        .and_then(parse_pid)
}

fn parse_pid(contents: &str) -> Option<u32> {
    contents.trim().parse().ok().filter(|pid| *pid != 0)
}
