//! Reading and writing the persisted snapshot file.
//!
//! Writes go to a temp file in the same directory and are renamed over the
//! target, so readers never observe a half-written snapshot.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::SnapshotError;
use crate::session::{Session, SessionId};
use crate::state::{AppState, DaemonInfo, Project};

/// A snapshot decoded entry by entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSnapshot {
    pub state: AppState,
    /// Entries that were present but could not be decoded and were dropped.
    pub skipped: usize,
}

/// Reads and validates a snapshot.
///
/// Returns `Ok(None)` when the file does not exist. The only structural
/// requirement is a `sessions` object; everything else defaults. Entries
/// that fail to decode are dropped, see [`read_snapshot_entries`].
pub fn read_snapshot(path: &Path) -> Result<Option<AppState>, SnapshotError> {
    Ok(read_snapshot_entries(path)?.map(|loaded| loaded.state))
}

/// Reads a snapshot, decoding each session and project on its own.
///
/// A bad entry (say, an unknown `status`) costs only that entry, never the
/// rest of the file. Project membership is rebuilt around whatever sessions
/// survived.
pub fn read_snapshot_entries(path: &Path) -> Result<Option<LoadedSnapshot>, SnapshotError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(SnapshotError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let value: Value = serde_json::from_slice(&bytes).map_err(|source| SnapshotError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;

    let Some(raw_sessions) = value.get("sessions").and_then(Value::as_object) else {
        return Err(SnapshotError::InvalidShape {
            path: path.to_path_buf(),
            reason: "missing `sessions` object".to_string(),
        });
    };

    let mut skipped = 0;
    let sessions = decode_entries(raw_sessions, "session", &mut skipped);

    let projects = match value.get("projects") {
        None | Some(Value::Null) => BTreeMap::new(),
        Some(Value::Object(raw)) => decode_entries::<String, Project>(raw, "project", &mut skipped),
        Some(_) => {
            warn!("Snapshot `projects` is not an object, rebuilding it");
            skipped += 1;
            BTreeMap::new()
        }
    };

    let daemon = match value.get("daemon") {
        None | Some(Value::Null) => DaemonInfo::default(),
        Some(raw) => serde_json::from_value(raw.clone()).unwrap_or_else(|e| {
            warn!(error = %e, "Dropping unreadable snapshot daemon info");
            skipped += 1;
            DaemonInfo::default()
        }),
    };

    let state = if skipped == 0 {
        AppState {
            sessions,
            projects,
            daemon,
        }
    } else {
        rebuild_membership(sessions, projects, daemon)
    };

    Ok(Some(LoadedSnapshot { state, skipped }))
}

fn decode_entries<K, T>(raw: &Map<String, Value>, kind: &str, skipped: &mut usize) -> BTreeMap<K, T>
where
    K: From<String> + Ord,
    T: DeserializeOwned,
{
    let mut entries = BTreeMap::new();
    for (key, entry) in raw {
        match serde_json::from_value::<T>(entry.clone()) {
            Ok(decoded) => {
                entries.insert(K::from(key.clone()), decoded);
            }
            Err(e) => {
                warn!(kind, key = %key, error = %e, "Dropping unreadable snapshot entry");
                *skipped += 1;
            }
        }
    }
    entries
}

/// Drops members whose session was lost and re-registers every surviving
/// session, so membership matches `Session::project` again.
fn rebuild_membership(
    sessions: BTreeMap<SessionId, Session>,
    mut projects: BTreeMap<String, Project>,
    daemon: DaemonInfo,
) -> AppState {
    projects.retain(|_, project| {
        project.sessions.retain(|id| sessions.contains_key(id));
        !project.sessions.is_empty()
    });

    let mut state = AppState {
        sessions: BTreeMap::new(),
        projects,
        daemon,
    };
    for session in sessions.into_values() {
        state.insert_session(session);
    }
    state
}

/// Serializes `state` and atomically replaces the file at `path`.
pub fn write_snapshot(path: &Path, state: &AppState) -> Result<(), SnapshotError> {
    let json = serde_json::to_string_pretty(state).map_err(SnapshotError::Serialize)?;
    atomic_write(path, json.as_bytes())
}

/// Atomically save data to a file using write-to-temp + rename.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<(), SnapshotError> {
    let io_err = |source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    };

    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("snapshot");
    let temp_name = format!(".{file_name}.tmp.{}", std::process::id());
    let temp_path = match parent {
        Some(parent) => parent.join(temp_name),
        None => temp_name.into(),
    };

    fs::write(&temp_path, contents).map_err(io_err)?;
    fs::rename(&temp_path, path).map_err(|source| {
        let _ = fs::remove_file(&temp_path);
        io_err(source)
    })
}

/// Removes the snapshot file. A missing file is not an error.
pub fn remove_snapshot(path: &Path) -> Result<(), SnapshotError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
