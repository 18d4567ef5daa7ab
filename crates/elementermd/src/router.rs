//! Event router: maps inbound IPC records onto store mutations.

use tracing::debug;

use elementerm_core::machine;
use elementerm_protocol::IpcMessage;

use crate::store::{StateStore, StoreError};

/// What routing a record did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// A hook event changed a session.
    SessionUpdated,
    SessionAdded,
    /// The store re-read the snapshot file.
    Reloaded { changed: bool },
    /// Nothing to do: unknown session, unrecognized event or record type,
    /// or a record only the daemon sends.
    Ignored,
}

/// Applies one inbound record to the store.
///
/// `session_removed` is handled by re-reading the snapshot: the remover has
/// already rewritten the file before notifying, so the file is authoritative.
pub fn route(store: &mut StateStore, message: IpcMessage) -> Result<Routed, StoreError> {
    match message {
        IpcMessage::HookEvent(event) => {
            let Some(updates) = machine::updates_for(&event) else {
                debug!(session_id = %event.session_id, event = %event.event, "Ignoring unrecognized hook event");
                return Ok(Routed::Ignored);
            };

            if store.update_session(&event.session_id, updates)? {
                debug!(session_id = %event.session_id, event = %event.event, "Applied hook event");
                Ok(Routed::SessionUpdated)
            } else {
                debug!(session_id = %event.session_id, "Hook event for unknown session");
                Ok(Routed::Ignored)
            }
        }
        IpcMessage::SessionCreated(session) => {
            store.add_session(*session)?;
            Ok(Routed::SessionAdded)
        }
        IpcMessage::SessionRemoved(removed) => {
            let changed = store.reload()?;
            debug!(session_id = %removed.id, changed, "Reloaded after session removal");
            Ok(Routed::Reloaded { changed })
        }
        IpcMessage::StateUpdate(_) | IpcMessage::DaemonShutdown => Ok(Routed::Ignored),
        IpcMessage::Unrecognized { kind } => {
            debug!(%kind, "Ignoring unrecognized message type");
            Ok(Routed::Ignored)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use elementerm_core::{
        write_snapshot, DaemonInfo, HookEvent, HookEventKind, Session, SessionId, SessionStatus,
        SystemClock,
    };
    use tempfile::TempDir;

    fn loaded_store(dir: &TempDir) -> StateStore {
        let mut store = StateStore::new(
            dir.path().join("state.json"),
            DaemonInfo::capture(&SystemClock, 1),
            Arc::new(SystemClock),
        );
        store.load().unwrap();
        store
    }

    fn session(id: &str) -> Session {
        Session::new(SessionId::new(id), "myapp", "auth", "wt/auth", "/w/myapp/auth", Utc::now())
    }

    fn hook(id: &str, kind: HookEventKind, file: Option<&str>) -> IpcMessage {
        let mut event = HookEvent::new(id, kind, 0);
        event.file_path = file.map(String::from);
        IpcMessage::HookEvent(event)
    }

    #[test]
    fn test_hook_events_drive_status_and_files() {
        let dir = TempDir::new().unwrap();
        let mut store = loaded_store(&dir);
        route(&mut store, IpcMessage::session_created(session("s1"))).unwrap();

        for file in ["src/a.ts", "src/b.ts", "src/a.ts"] {
            let routed = route(&mut store, hook("s1", HookEventKind::PostToolUse, Some(file))).unwrap();
            assert_eq!(routed, Routed::SessionUpdated);
        }

        let s1 = store.get_session(&SessionId::new("s1")).unwrap();
        assert_eq!(s1.status, SessionStatus::Flow);
        assert_eq!(
            s1.files_modified.iter().cloned().collect::<Vec<_>>(),
            vec!["src/a.ts".to_string(), "src/b.ts".to_string()]
        );

        route(&mut store, hook("s1", HookEventKind::Stop, None)).unwrap();
        assert_eq!(store.get_session(&SessionId::new("s1")).unwrap().status, SessionStatus::Ready);

        route(&mut store, hook("s1", HookEventKind::SessionEnd, None)).unwrap();
        assert_eq!(store.get_session(&SessionId::new("s1")).unwrap().status, SessionStatus::Idle);
    }

    #[test]
    fn test_event_for_unknown_session_creates_nothing() {
        let dir = TempDir::new().unwrap();
        let mut store = loaded_store(&dir);

        let routed = route(&mut store, hook("ghost", HookEventKind::PostToolUse, Some("x"))).unwrap();
        assert_eq!(routed, Routed::Ignored);
        assert!(store.list_sessions().is_empty());
    }

    #[test]
    fn test_unrecognized_event_leaves_session_untouched() {
        let dir = TempDir::new().unwrap();
        let mut store = loaded_store(&dir);
        route(&mut store, IpcMessage::session_created(session("s1"))).unwrap();
        let before = store.get_session(&SessionId::new("s1")).unwrap().clone();

        let routed = route(
            &mut store,
            hook("s1", HookEventKind::from_event_name("Notification"), None),
        )
        .unwrap();
        assert_eq!(routed, Routed::Ignored);
        assert_eq!(store.get_session(&SessionId::new("s1")).unwrap(), &before);
    }

    #[test]
    fn test_session_removed_reloads_from_file() {
        let dir = TempDir::new().unwrap();
        let mut store = loaded_store(&dir);
        route(&mut store, IpcMessage::session_created(session("s1"))).unwrap();

        // The remover rewrites the file first.
        let mut external = store.snapshot().clone();
        let removed = external.remove_session(&SessionId::new("s1")).unwrap();
        write_snapshot(store.path(), &external).unwrap();

        let routed = route(&mut store, IpcMessage::session_removed(&removed)).unwrap();
        assert_eq!(routed, Routed::Reloaded { changed: true });
        assert!(store.list_sessions().is_empty());
        assert!(store.list_projects().is_empty());
    }

    #[test]
    fn test_unknown_and_outbound_types_ignored() {
        let dir = TempDir::new().unwrap();
        let mut store = loaded_store(&dir);

        let unknown = IpcMessage::Unrecognized { kind: "ping".into() };
        assert_eq!(route(&mut store, unknown).unwrap(), Routed::Ignored);
        assert_eq!(route(&mut store, IpcMessage::DaemonShutdown).unwrap(), Routed::Ignored);
    }
}
