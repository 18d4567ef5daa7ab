//! Error types for the elementerm CLI and dashboard.
//!
//! **Panic-Free Policy:** This module follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use elementerm_core::SnapshotError;
use elementerm_protocol::ProtocolError;
use thiserror::Error;

// ============================================================================
// CLI Error Type
// ============================================================================

/// Errors raised by CLI commands, the hook reporter and the dashboard.
///
/// Connection errors are usually recoverable: registration and removal fall
/// back to writing the snapshot file directly.
#[derive(Error, Debug)]
pub enum CliError {
    /// Nothing is listening on the daemon socket.
    #[error("Failed to connect to daemon at {}: {source}", path.display())]
    DaemonUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The round-trip did not finish before its deadline.
    #[error("Daemon did not respond within {}ms", after.as_millis())]
    Timeout { after: Duration },

    /// The daemon could not be started or stopped.
    #[error("{0}")]
    DaemonControl(String),

    #[error("Session with worktree \"{worktree}\" not found.")]
    SessionNotFound { worktree: String },

    #[error("Failed to initialize terminal: {0}")]
    TerminalInit(String),

    /// The terminal may be left in raw mode; running `reset` recovers it.
    #[error("Failed to restore terminal: {0}")]
    TerminalCleanup(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// True for errors that mean "no daemon answered", as opposed to a
    /// local failure.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::DaemonUnavailable { .. } | Self::Timeout { .. })
    }
}

/// Convenience Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

// ============================================================================
// Tests
// ============================================================================
