//! Application state using the Actor pattern.
//!
//! The state actor is the single owner of the `StateStore`. It receives
//! commands via a tokio mpsc channel, so every mutation is serialized, and
//! publishes the full state on a broadcast channel after each change.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │   Connections   │────▶│   StateActor    │────▶│ Broadcast Channel│
//! └─────────────────┘     └─────────────────┘     └──────────────────┘
//!         │                       │                       │
//!         │   StateCommand        │   StateEvent          │
//!         │   (mpsc channel)      │   (broadcast)         │
//!         ▼                       ▼                       ▼
//!    hook_event /           StateStore            BroadcastServer
//!    session_* records      (+ snapshot file)     fans out to clients
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval_at, Instant};
use tracing::debug;

mod actor;
mod commands;
mod handle;

pub use actor::StateActor;
pub use commands::{StateCommand, StateError, StateEvent};
pub use handle::StateHandle;

use crate::store::StateStore;

/// Channel buffer sizes
const COMMAND_BUFFER: usize = 256;
const EVENT_BUFFER: usize = 64;

/// Spawn the state actor around a loaded store and return a handle.
///
/// When `reconcile_every` is set, a background task asks the actor to
/// re-read the snapshot file at that period.
pub fn spawn_state_actor(store: StateStore, reconcile_every: Option<Duration>) -> StateHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

    let actor = StateActor::new(cmd_rx, store, event_tx.clone());
    tokio::spawn(actor.run());

    if let Some(period) = reconcile_every {
        spawn_reconcile_task(cmd_tx.clone(), period);
    }

    StateHandle::new(cmd_tx, event_tx)
}

/// Spawn a background task that triggers periodic reconciliation.
fn spawn_reconcile_task(sender: mpsc::Sender<StateCommand>, period: Duration) {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);

        loop {
            ticker.tick().await;

            if sender.send(StateCommand::Reconcile).await.is_err() {
                debug!("Reconcile task stopping: state channel closed");
                break;
            }
        }
    });
}
