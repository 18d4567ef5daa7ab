//! Dashboard application state.
//!
//! The dashboard has two sources of truth that agree eventually: live
//! `state_update` broadcasts and a periodic read of the snapshot file. Either
//! one replaces the whole state; the most recent wins.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

use chrono::{DateTime, Utc};
use elementerm_core::{AppState, Session, SessionStatus};

use crate::poll::SnapshotRead;

// ============================================================================
// Connection State
// ============================================================================

/// State of the dashboard's streaming connection to the daemon.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ConnectionState {
    /// Connected and receiving broadcasts.
    Connected,

    /// Lost connection, attempting reconnect.
    Disconnected {
        since: DateTime<Utc>,
        retry_count: u32,
    },

    /// Initial connection in progress.
    #[default]
    Connecting,
}

// ============================================================================
// Application
// ============================================================================

#[derive(Debug, Clone)]
pub struct App {
    pub connection: ConnectionState,

    /// Last known state; `None` until the first broadcast or snapshot read.
    pub state: Option<AppState>,

    /// True once a snapshot read found no file and nothing else was known.
    pub snapshot_missing: bool,

    /// Index into [`App::rows`].
    pub selected_index: usize,

    pub should_quit: bool,

    pub last_update: Option<DateTime<Utc>>,

    /// Last snapshot read error, shown in the footer.
    pub last_error: Option<String>,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        Self {
            connection: ConnectionState::Connecting,
            state: None,
            snapshot_missing: false,
            selected_index: 0,
            should_quit: false,
            last_update: None,
            last_error: None,
        }
    }

    /// Replaces the displayed state wholesale.
    pub fn apply_state(&mut self, state: AppState) {
        self.state = Some(state);
        self.snapshot_missing = false;
        self.last_error = None;
        self.last_update = Some(Utc::now());
        self.clamp_selection();
    }

    /// Applies the result of reading the snapshot file.
    ///
    /// A missing or unreadable file keeps whatever was shown before.
    pub fn apply_snapshot(&mut self, read: SnapshotRead) {
        match read {
            SnapshotRead::Loaded(state) => self.apply_state(*state),
            SnapshotRead::Missing => {
                if self.state.is_none() {
                    self.snapshot_missing = true;
                }
            }
            SnapshotRead::Unreadable(reason) => {
                self.last_error = Some(reason);
            }
        }
    }

    pub fn mark_connected(&mut self) {
        self.connection = ConnectionState::Connected;
    }

    /// Marks the connection as lost, counting consecutive failures.
    pub fn mark_disconnected(&mut self) {
        match &self.connection {
            ConnectionState::Disconnected { since, retry_count } => {
                self.connection = ConnectionState::Disconnected {
                    since: *since,
                    retry_count: retry_count.saturating_add(1),
                };
            }
            ConnectionState::Connected | ConnectionState::Connecting => {
                self.connection = ConnectionState::Disconnected {
                    since: Utc::now(),
                    retry_count: 1,
                };
            }
        }
    }

    /// Sessions in display order: grouped by project name, then by worktree.
    pub fn rows(&self) -> Vec<&Session> {
        let Some(state) = &self.state else {
            return Vec::new();
        };
        state
            .sessions_by_project()
            .into_iter()
            .flat_map(|(_, mut sessions)| {
                sessions.sort_by(|a, b| a.worktree.cmp(&b.worktree));
                sessions
            })
            .collect()
    }

    pub fn session_count(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.sessions.len())
    }

    pub fn project_count(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.projects.len())
    }

    /// Sessions in a status that wants a human.
    pub fn attention_count(&self) -> usize {
        self.count_where(|s| s.status.needs_attention())
    }

    pub fn flow_count(&self) -> usize {
        self.count_where(|s| s.status == SessionStatus::Flow)
    }

    fn count_where(&self, predicate: impl Fn(&Session) -> bool) -> usize {
        self.state
            .as_ref()
            .map_or(0, |s| s.sessions.values().filter(|session| predicate(session)).count())
    }

    pub fn selected_session(&self) -> Option<&Session> {
        self.rows().get(self.selected_index).copied()
    }

    /// Moves the selection down, wrapping at the end.
    pub fn select_next(&mut self) {
        let count = self.session_count();
        if count == 0 {
            return;
        }
        self.selected_index = (self.selected_index + 1) % count;
    }

    /// Moves the selection up, wrapping at the start.
    pub fn select_previous(&mut self) {
        let count = self.session_count();
        if count == 0 {
            return;
        }
        self.selected_index = if self.selected_index == 0 {
            count.saturating_sub(1)
        } else {
            self.selected_index - 1
        };
    }

    fn clamp_selection(&mut self) {
        let count = self.session_count();
        if count == 0 {
            self.selected_index = 0;
        } else if self.selected_index >= count {
            self.selected_index = count.saturating_sub(1);
        }
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }
}
