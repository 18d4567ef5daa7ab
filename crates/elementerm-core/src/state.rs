//! Application state aggregate: sessions, projects and daemon info.
//!
//! `AppState` is the unit of persistence and the unit broadcast to clients.
//! Its mutators keep project membership consistent with `Session::project`:
//! a project exists exactly as long as it has at least one member.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{Session, SessionId, SessionStatus};

/// Version string recorded in [`DaemonInfo`].
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Clock
// ============================================================================

/// Source of wall-clock time.
///
/// Injected into everything that stamps timestamps so tests can control time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ============================================================================
// Project
// ============================================================================

/// A named group of sessions sharing a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub sessions: Vec<SessionId>,
}

impl Project {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            sessions: Vec::new(),
        }
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains(id)
    }
}

// ============================================================================
// Daemon Info
// ============================================================================

/// Descriptive record of the daemon that produced a snapshot.
///
/// Replaced wholesale on every daemon start. A default value (pid 0, no start
/// time) marks a snapshot written by a CLI command while no daemon ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonInfo {
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pid: u32,
    #[serde(default)]
    pub version: String,
}

impl Default for DaemonInfo {
    fn default() -> Self {
        Self {
            started_at: None,
            pid: 0,
            version: VERSION.to_string(),
        }
    }
}

impl DaemonInfo {
    /// Captures the identity of a daemon starting now.
    pub fn capture(clock: &dyn Clock, pid: u32) -> Self {
        Self {
            started_at: Some(clock.now()),
            pid,
            version: VERSION.to_string(),
        }
    }
}

// ============================================================================
// Application State
// ============================================================================

/// Everything the daemon knows, as persisted and broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AppState {
    pub sessions: BTreeMap<SessionId, Session>,
    #[serde(default)]
    pub projects: BTreeMap<String, Project>,
    #[serde(default)]
    pub daemon: DaemonInfo,
}

impl AppState {
    /// An empty state owned by the given daemon.
    pub fn empty(daemon: DaemonInfo) -> Self {
        Self {
            sessions: BTreeMap::new(),
            projects: BTreeMap::new(),
            daemon,
        }
    }

    pub fn session(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn session_mut(&mut self, id: &SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    /// Finds a session by worktree name.
    pub fn find_by_worktree(&self, worktree: &str) -> Option<&Session> {
        self.sessions.values().find(|s| s.worktree == worktree)
    }

    /// Inserts (or replaces) a session and records it in its project.
    ///
    /// The project is created on first use with its path derived from the
    /// session's working directory.
    pub fn insert_session(&mut self, session: Session) {
        let id = session.id.clone();

        // A re-registration under a different project must not leave the
        // old project holding a dangling member.
        if let Some(previous) = self.sessions.get(&id) {
            if previous.project != session.project {
                let old_project = previous.project.clone();
                self.detach(&id, &old_project);
            }
        }

        let project = self
            .projects
            .entry(session.project.clone())
            .or_insert_with(|| Project::new(session.project.clone(), session.project_path()));
        if !project.contains(&id) {
            project.sessions.push(id.clone());
        }

        self.sessions.insert(id, session);
    }

    /// Removes a session, pruning its project if it becomes empty.
    ///
    /// Returns the removed session, or `None` if the id was unknown.
    pub fn remove_session(&mut self, id: &SessionId) -> Option<Session> {
        let session = self.sessions.remove(id)?;
        self.detach(id, &session.project);
        Some(session)
    }

    /// Sets every session to `Idle`. Returns how many sessions changed.
    pub fn set_all_idle(&mut self, now: DateTime<Utc>) -> usize {
        let mut changed = 0;
        for session in self.sessions.values_mut() {
            if session.status != SessionStatus::Idle {
                session.set_status(SessionStatus::Idle);
                session.touch(now);
                changed += 1;
            }
        }
        changed
    }

    /// Sessions grouped by project name, in project name order.
    pub fn sessions_by_project(&self) -> Vec<(&str, Vec<&Session>)> {
        let mut groups: BTreeMap<&str, Vec<&Session>> = BTreeMap::new();
        for session in self.sessions.values() {
            groups.entry(session.project.as_str()).or_default().push(session);
        }
        groups.into_iter().collect()
    }

    /// True when sessions and projects are equal, ignoring daemon info.
    pub fn same_contents(&self, other: &AppState) -> bool {
        self.sessions == other.sessions && self.projects == other.projects
    }

    fn detach(&mut self, id: &SessionId, project_name: &str) {
        let now_empty = match self.projects.get_mut(project_name) {
            Some(project) => {
                project.sessions.retain(|member| member != id);
                project.sessions.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.projects.remove(project_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).single().unwrap()
    }

    fn session(id: &str, project: &str, worktree: &str) -> Session {
        Session::new(
            SessionId::new(id),
            project,
            worktree,
            format!("wt/{worktree}"),
            format!("/work/{project}/{worktree}"),
            at(0),
        )
    }

    #[test]
    fn test_insert_creates_project_with_derived_path() {
        let mut state = AppState::default();
        state.insert_session(session("s1", "myapp", "auth"));

        assert_eq!(state.projects.len(), 1);
        let project = state.projects.get("myapp").unwrap();
        assert_eq!(project.path, "/work/myapp");
        assert_eq!(project.sessions, vec![SessionId::new("s1")]);
    }

    #[test]
    fn test_reinsert_does_not_duplicate_membership() {
        let mut state = AppState::default();
        state.insert_session(session("s1", "myapp", "auth"));
        state.insert_session(session("s1", "myapp", "auth"));

        assert_eq!(state.projects.get("myapp").unwrap().sessions.len(), 1);
    }

    #[test]
    fn test_reinsert_under_other_project_moves_membership() {
        let mut state = AppState::default();
        state.insert_session(session("s1", "old", "auth"));
        state.insert_session(session("s1", "new", "auth"));

        assert!(!state.projects.contains_key("old"));
        assert!(state.projects.get("new").unwrap().contains(&SessionId::new("s1")));
    }

    #[test]
    fn test_project_cardinality() {
        let mut state = AppState::default();
        for i in 0..4 {
            state.insert_session(session(&format!("s{i}"), "myapp", &format!("wt{i}")));
        }
        for i in 0..3 {
            assert!(state.remove_session(&SessionId::new(format!("s{i}"))).is_some());
        }

        assert_eq!(state.projects.len(), 1);
        assert_eq!(state.projects.get("myapp").unwrap().sessions.len(), 1);

        state.remove_session(&SessionId::new("s3"));
        assert!(state.projects.is_empty());
        assert!(state.sessions.is_empty());
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut state = AppState::default();
        state.insert_session(session("s1", "myapp", "auth"));
        assert!(state.remove_session(&SessionId::new("nope")).is_none());
        assert_eq!(state.sessions.len(), 1);
    }

    #[test]
    fn test_set_all_idle() {
        let mut state = AppState::default();
        let mut busy = session("s1", "myapp", "auth");
        busy.set_status(SessionStatus::Flow);
        state.insert_session(busy);
        state.insert_session(session("s2", "myapp", "seo"));

        assert_eq!(state.set_all_idle(at(5)), 1);
        assert!(state
            .sessions
            .values()
            .all(|s| s.status == SessionStatus::Idle));
    }

    #[test]
    fn test_daemon_info_capture() {
        let info = DaemonInfo::capture(&FixedClock(at(42)), 1234);
        assert_eq!(info.pid, 1234);
        assert_eq!(info.started_at, Some(at(42)));
        assert_eq!(info.version, VERSION);
    }

    #[test]
    fn test_state_json_defaults() {
        let state: AppState = serde_json::from_str(r#"{"sessions":{}}"#).unwrap();
        assert!(state.projects.is_empty());
        assert_eq!(state.daemon.pid, 0);
    }

    #[test]
    fn test_sessions_by_project_groups() {
        let mut state = AppState::default();
        state.insert_session(session("s1", "b", "x"));
        state.insert_session(session("s2", "a", "y"));
        state.insert_session(session("s3", "b", "z"));

        let groups = state.sessions_by_project();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "a");
        assert_eq!(groups[1].1.len(), 2);
    }
}
