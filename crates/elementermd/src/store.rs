//! Authoritative in-memory state with whole-file persistence.
//!
//! Every mutation happens in memory first, then the entire aggregate is
//! written to the snapshot file. Reads never touch the disk.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - I/O failures surface as `StoreError`; the in-memory state stays valid

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use elementerm_core::paths::backup_path;
use elementerm_core::{
    read_snapshot, read_snapshot_entries, remove_snapshot, write_snapshot, AppState, Clock,
    DaemonInfo, Project, Session, SessionId, SessionUpdate, SnapshotError,
};

/// Errors from store persistence.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("Failed to back up snapshot to {path}: {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// How `load()` obtained the initial state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No snapshot on disk.
    Fresh,
    /// Sessions and projects restored from disk.
    Restored { sessions: usize },
    /// Restored, but `skipped` unreadable entries were dropped; the file as
    /// found was kept at `backup`.
    RestoredPartial {
        sessions: usize,
        skipped: usize,
        backup: PathBuf,
    },
    /// The snapshot had an invalid structure and was discarded.
    DiscardedInvalid,
    /// The snapshot was unparseable; a copy was kept at `backup`.
    RecoveredCorrupt { backup: PathBuf },
}

/// Owns the `AppState` and its snapshot file.
pub struct StateStore {
    path: PathBuf,
    state: AppState,
    clock: Arc<dyn Clock>,
}

impl StateStore {
    /// Creates an empty store owned by `daemon`. Nothing is read or written.
    pub fn new(path: impl Into<PathBuf>, daemon: DaemonInfo, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            state: AppState::empty(daemon),
            clock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Loads the persisted snapshot, if any, then persists the result.
    ///
    /// The in-memory daemon info always wins over the one on disk.
    pub fn load(&mut self) -> Result<LoadOutcome, StoreError> {
        let outcome = match read_snapshot_entries(&self.path) {
            Ok(Some(loaded)) if loaded.skipped > 0 => {
                let backup = self.back_up()?;
                let sessions = loaded.state.sessions.len();
                warn!(
                    path = %self.path.display(),
                    backup = %backup.display(),
                    sessions,
                    skipped = loaded.skipped,
                    "Snapshot had unreadable entries, restored the rest"
                );
                self.adopt(loaded.state);
                LoadOutcome::RestoredPartial {
                    sessions,
                    skipped: loaded.skipped,
                    backup,
                }
            }
            Ok(Some(loaded)) => {
                let sessions = loaded.state.sessions.len();
                self.adopt(loaded.state);
                info!(path = %self.path.display(), sessions, "Restored snapshot");
                LoadOutcome::Restored { sessions }
            }
            Ok(None) => LoadOutcome::Fresh,
            Err(SnapshotError::InvalidShape { reason, .. }) => {
                warn!(path = %self.path.display(), %reason, "Discarding snapshot with invalid structure");
                LoadOutcome::DiscardedInvalid
            }
            Err(SnapshotError::Corrupt { source, .. }) => {
                let backup = self.back_up()?;
                warn!(
                    path = %self.path.display(),
                    backup = %backup.display(),
                    error = %source,
                    "Snapshot is corrupt, starting fresh"
                );
                LoadOutcome::RecoveredCorrupt { backup }
            }
            Err(e) => return Err(e.into()),
        };

        self.persist()?;
        Ok(outcome)
    }

    /// Re-reads the snapshot written by another process.
    ///
    /// Sessions and projects are replaced; daemon info is kept. On any read
    /// failure the in-memory state is left untouched. Returns true if the
    /// contents changed.
    pub fn reload(&mut self) -> Result<bool, StoreError> {
        let disk = match read_snapshot_entries(&self.path)? {
            Some(loaded) if loaded.skipped > 0 => {
                let backup = self.back_up()?;
                warn!(
                    backup = %backup.display(),
                    skipped = loaded.skipped,
                    "Reloaded snapshot had unreadable entries"
                );
                loaded.state
            }
            Some(loaded) => loaded.state,
            None => {
                debug!(path = %self.path.display(), "Reload skipped: snapshot missing");
                return Ok(false);
            }
        };

        let changed = !self.state.same_contents(&disk);
        self.adopt(disk);
        Ok(changed)
    }

    /// Copies the snapshot file, as found, to its `.bak` sidecar.
    fn back_up(&self) -> Result<PathBuf, StoreError> {
        let backup = backup_path(&self.path);
        std::fs::copy(&self.path, &backup).map_err(|source| StoreError::Backup {
            path: backup.clone(),
            source,
        })?;
        Ok(backup)
    }

    /// Deletes the snapshot file. Used on graceful shutdown only.
    pub fn cleanup(&self) -> Result<(), StoreError> {
        remove_snapshot(&self.path)?;
        debug!(path = %self.path.display(), "Snapshot removed");
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn snapshot(&self) -> &AppState {
        &self.state
    }

    pub fn get_session(&self, id: &SessionId) -> Option<&Session> {
        self.state.session(id)
    }

    pub fn list_sessions(&self) -> Vec<&Session> {
        self.state.sessions.values().collect()
    }

    pub fn list_projects(&self) -> Vec<&Project> {
        self.state.projects.values().collect()
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    pub fn add_session(&mut self, session: Session) -> Result<(), StoreError> {
        debug!(session_id = %session.id, project = %session.project, "Adding session");
        self.state.insert_session(session);
        self.persist()
    }

    /// Applies `updates` to a known session and stamps its activity time.
    ///
    /// Returns false (and writes nothing) if the id is unknown.
    pub fn update_session(
        &mut self,
        id: &SessionId,
        updates: impl IntoIterator<Item = SessionUpdate>,
    ) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let Some(session) = self.state.session_mut(id) else {
            return Ok(false);
        };

        for update in updates {
            session.apply(update);
        }
        session.touch(now);

        self.persist()?;
        Ok(true)
    }

    /// Removes a session and prunes its project if empty.
    ///
    /// Returns false (and writes nothing) if the id is unknown.
    pub fn remove_session(&mut self, id: &SessionId) -> Result<bool, StoreError> {
        if self.state.remove_session(id).is_none() {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    /// Sets every session to idle and persists. Returns how many changed.
    pub fn set_all_sessions_idle(&mut self) -> Result<usize, StoreError> {
        let changed = self.state.set_all_idle(self.clock.now());
        self.persist()?;
        Ok(changed)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn adopt(&mut self, disk: AppState) {
        self.state.sessions = disk.sessions;
        self.state.projects = disk.projects;
    }

    fn persist(&self) -> Result<(), StoreError> {
        write_snapshot(&self.path, &self.state)?;
        Ok(())
    }
}
