//! Session registration and removal from the CLI.
//!
//! Both operations work whether or not a daemon is running:
//! - registration goes over IPC and falls back to writing the snapshot file
//!   directly when no daemon answers in time;
//! - removal always edits the snapshot file first (so `status` sees it at
//!   once) and then tells the daemon, best effort.
//!
//! A daemon that missed a direct write picks it up on its next
//! reconciliation sweep.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use elementerm_core::{read_snapshot, write_snapshot, AppState, DaemonInfo, DomainTag, Paths, Session, SessionId, SnapshotError};
use elementerm_protocol::{IpcMessage, SessionRef};
use tracing::{debug, warn};

use crate::client::send_message;
use crate::error::{CliError, Result};

// ============================================================================
// Registration
// ============================================================================

/// User-supplied fields of a new session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    pub project: String,
    pub worktree: String,
    pub branch: String,
    pub domain: Option<DomainTag>,
    pub cwd: PathBuf,
}

impl NewSession {
    /// Fills in the defaults: branch `wt/<worktree>` and the project named
    /// after the parent of `cwd`.
    pub fn with_defaults(
        worktree: impl Into<String>,
        project: Option<String>,
        branch: Option<String>,
        domain: Option<DomainTag>,
        cwd: PathBuf,
    ) -> Self {
        let worktree = worktree.into();
        let project = project
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| default_project_name(&cwd));
        let branch = branch
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| format!("wt/{worktree}"));

        Self {
            project,
            worktree,
            branch,
            domain,
            cwd,
        }
    }

    /// Builds the idle session record registered under `id`.
    pub fn into_session(self, id: SessionId, now: DateTime<Utc>) -> Session {
        Session::new(
            id,
            self.project,
            self.worktree,
            self.branch,
            self.cwd.to_string_lossy(),
            now,
        )
        .with_domain(self.domain)
    }
}

/// A fresh v4 UUID session id.
pub fn generate_session_id() -> SessionId {
    SessionId::new(uuid::Uuid::new_v4().to_string())
}

fn default_project_name(cwd: &Path) -> String {
    cwd.parent()
        .and_then(Path::file_name)
        .or_else(|| cwd.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "default".to_string())
}

/// How a registration reached the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The daemon accepted the `session_created` record.
    Daemon,
    /// No daemon answered; the snapshot file was written directly.
    Direct,
}

/// Registers `session`, over IPC if a daemon answers within `deadline`,
/// otherwise by writing the snapshot file.
pub async fn register_session(paths: &Paths, session: Session, deadline: Duration) -> Result<Registration> {
    let message = IpcMessage::session_created(session.clone());

    match send_message(&paths.socket_path, &message, deadline).await {
        Ok(()) => Ok(Registration::Daemon),
        Err(e) if e.is_unreachable() => {
            debug!(error = %e, "Daemon unreachable, writing snapshot directly");
            write_session_directly(paths, session)?;
            Ok(Registration::Direct)
        }
        Err(e) => Err(e),
    }
}

fn write_session_directly(paths: &Paths, session: Session) -> Result<()> {
    paths.ensure_dir()?;
    let mut state = read_or_fresh(&paths.state_file)?;
    state.insert_session(session);
    write_snapshot(&paths.state_file, &state)?;
    Ok(())
}

/// Reads the snapshot; a missing or unusable file yields an empty state.
fn read_or_fresh(path: &Path) -> Result<AppState> {
    match read_snapshot(path) {
        Ok(Some(state)) => Ok(state),
        Ok(None) => Ok(AppState::empty(DaemonInfo::default())),
        Err(e @ (SnapshotError::Corrupt { .. } | SnapshotError::InvalidShape { .. })) => {
            warn!(error = %e, "Replacing unusable snapshot");
            Ok(AppState::empty(DaemonInfo::default()))
        }
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// Removal
// ============================================================================

/// Which sessions `rm` removes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveSelector {
    Worktree(String),
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// There is no snapshot file at all.
    NoSnapshot,
    Removed(Vec<SessionRef>),
}

/// Removes the selected sessions from the snapshot file, then notifies the
/// daemon once per removed session.
///
/// # Errors
///
/// `CliError::SessionNotFound` when no session has the given worktree; the
/// file is left untouched in that case.
pub async fn remove_sessions(paths: &Paths, selector: &RemoveSelector, deadline: Duration) -> Result<RemoveOutcome> {
    let Some(mut state) = read_snapshot(&paths.state_file)? else {
        return Ok(RemoveOutcome::NoSnapshot);
    };

    let ids: Vec<SessionId> = match selector {
        RemoveSelector::All => state.sessions.keys().cloned().collect(),
        RemoveSelector::Worktree(worktree) => {
            let session = state
                .find_by_worktree(worktree)
                .ok_or_else(|| CliError::SessionNotFound {
                    worktree: worktree.clone(),
                })?;
            vec![session.id.clone()]
        }
    };

    let removed: Vec<SessionRef> = ids
        .iter()
        .filter_map(|id| state.remove_session(id))
        .map(|session| SessionRef::from(&session))
        .collect();

    write_snapshot(&paths.state_file, &state)?;

    for session in &removed {
        let message = IpcMessage::session_removed(session.clone());
        if let Err(e) = send_message(&paths.socket_path, &message, deadline).await {
            // The file is already updated; a daemon that missed this
            // reconciles on its next sweep.
            debug!(session_id = %session.id, error = %e, "Could not notify daemon of removal");
        }
    }

    Ok(RemoveOutcome::Removed(removed))
}
