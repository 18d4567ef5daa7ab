//! Keyboard input handling for the dashboard.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use elementerm_core::AppState;

use crate::app::App;
use crate::poll::SnapshotRead;

// ============================================================================
// Event Types
// ============================================================================

/// Events that drive the dashboard's main loop.
#[derive(Debug, Clone)]
pub enum Event {
    /// Keyboard input from the user.
    Key(KeyEvent),

    /// Terminal window resize event.
    Resize(u16, u16),

    /// A `state_update` broadcast from the daemon.
    StateUpdate(Box<AppState>),

    /// Result of a periodic read of the snapshot file.
    Snapshot(SnapshotRead),

    /// The streaming connection to the daemon is up.
    DaemonConnected,

    /// Connection to the daemon was lost.
    DaemonDisconnected,
}

// ============================================================================
// Action Types
// ============================================================================

/// What the main loop should do in response to user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    Quit,
    /// Re-read the snapshot file now.
    Refresh,
}

// ============================================================================
// Input Handler
// ============================================================================

/// Handles a keyboard event and updates application state accordingly.
///
/// # Key Bindings
///
/// | Key          | Action                      |
/// |--------------|-----------------------------|
/// | `q`, `Q`     | Quit                        |
/// | `Esc`        | Quit                        |
/// | `Ctrl+C`     | Quit                        |
/// | `j`, `Down`  | Select the next session     |
/// | `k`, `Up`    | Select the previous session |
/// | `r`, `R`     | Re-read the snapshot file   |
#[must_use]
pub fn handle_key_event(key: KeyEvent, app: &mut App) -> Action {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        app.quit();
        return Action::Quit;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
            app.quit();
            Action::Quit
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.select_next();
            Action::None
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.select_previous();
            Action::None
        }
        KeyCode::Char('r') | KeyCode::Char('R') => Action::Refresh,
        _ => Action::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crossterm::event::{KeyEventKind, KeyEventState};
    use elementerm_core::{DaemonInfo, Session, SessionId};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn app_with_sessions(count: usize) -> App {
        let mut state = AppState::empty(DaemonInfo::default());
        for i in 0..count {
            state.insert_session(Session::new(
                SessionId::new(format!("s{i}")),
                "myapp",
                format!("wt{i}"),
                format!("wt/wt{i}"),
                format!("/w/myapp/wt{i}"),
                Utc::now(),
            ));
        }
        let mut app = App::new();
        app.apply_state(state);
        app
    }

    #[test]
    fn test_quit_keys() {
        for code in [KeyCode::Char('q'), KeyCode::Char('Q'), KeyCode::Esc] {
            let mut app = App::new();
            assert_eq!(handle_key_event(key(code), &mut app), Action::Quit);
            assert!(app.should_quit);
        }
    }

    #[test]
    fn test_ctrl_c_quits() {
        let mut app = App::new();
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(handle_key_event(ctrl_c, &mut app), Action::Quit);
        assert!(app.should_quit);
    }

    #[test]
    fn test_navigation_wraps() {
        let mut app = app_with_sessions(3);

        assert_eq!(handle_key_event(key(KeyCode::Char('j')), &mut app), Action::None);
        assert_eq!(app.selected_index, 1);
        let _ = handle_key_event(key(KeyCode::Down), &mut app);
        let _ = handle_key_event(key(KeyCode::Down), &mut app);
        assert_eq!(app.selected_index, 0);

        let _ = handle_key_event(key(KeyCode::Up), &mut app);
        assert_eq!(app.selected_index, 2);
        let _ = handle_key_event(key(KeyCode::Char('k')), &mut app);
        assert_eq!(app.selected_index, 1);
    }

    #[test]
    fn test_refresh_key() {
        let mut app = App::new();
        assert_eq!(handle_key_event(key(KeyCode::Char('r')), &mut app), Action::Refresh);
        assert!(!app.should_quit);
    }

    #[test]
    fn test_unbound_key_is_noop() {
        let mut app = app_with_sessions(2);
        assert_eq!(handle_key_event(key(KeyCode::Char('x')), &mut app), Action::None);
        assert_eq!(app.selected_index, 0);
    }
}
