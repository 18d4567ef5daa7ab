//! Periodic reads of the snapshot file for the dashboard.
//!
//! Broadcasts only reach a dashboard that is connected; the poll picks up
//! states written while it was not, including direct writes by CLI commands
//! when no daemon runs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use elementerm_core::{read_snapshot, AppState};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::input::Event;

/// Default period between snapshot reads.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Outcome of one snapshot read.
#[derive(Debug, Clone)]
pub enum SnapshotRead {
    /// No daemon has written a snapshot yet.
    Missing,
    Loaded(Box<AppState>),
    Unreadable(String),
}

/// Reads the snapshot at `path` once.
pub fn read_current(path: &Path) -> SnapshotRead {
    match read_snapshot(path) {
        Ok(Some(state)) => SnapshotRead::Loaded(Box::new(state)),
        Ok(None) => SnapshotRead::Missing,
        Err(e) => SnapshotRead::Unreadable(e.to_string()),
    }
}

/// Spawns a task that reads the snapshot every `period` and forwards the
/// result, starting with an immediate read.
pub fn spawn_snapshot_poller(
    path: PathBuf,
    period: Duration,
    event_tx: mpsc::UnboundedSender<Event>,
    cancel_token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now(), period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    debug!("Snapshot poller shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let read = read_current(&path);
                    if event_tx.send(Event::Snapshot(read)).is_err() {
                        break;
                    }
                }
            }
        }
    })
}
