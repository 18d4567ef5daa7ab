//! Session status state machine.
//!
//! Pure functions only: no I/O, no clock. The daemon's router turns the
//! resulting [`SessionUpdate`]s into store mutations.
//!
//! ```text
//!   PostToolUse  ──▶ flow   (+ file path, if any)
//!   Stop         ──▶ ready
//!   SessionEnd   ──▶ idle
//!   anything else──▶ (ignored)
//! ```
//!
//! `waiting`, `attention` and `blocked` are never produced here.

use crate::hook::{HookEvent, HookEventKind};
use crate::session::{SessionStatus, SessionUpdate};

/// Status a session moves to on the given event, whatever its current status.
pub fn transition(kind: &HookEventKind) -> Option<SessionStatus> {
    match kind {
        HookEventKind::PostToolUse => Some(SessionStatus::Flow),
        HookEventKind::Stop => Some(SessionStatus::Ready),
        HookEventKind::SessionEnd => Some(SessionStatus::Idle),
        HookEventKind::Other(_) => None,
    }
}

/// Field updates a hook event implies, or `None` if the event is ignored.
pub fn updates_for(event: &HookEvent) -> Option<Vec<SessionUpdate>> {
    let status = transition(&event.event)?;
    let mut updates = vec![SessionUpdate::Status(status)];

    if event.event == HookEventKind::PostToolUse {
        if let Some(path) = event.file_path.as_deref().filter(|p| !p.is_empty()) {
            updates.push(SessionUpdate::FileModified(path.to_string()));
        }
    }

    Some(updates)
}
