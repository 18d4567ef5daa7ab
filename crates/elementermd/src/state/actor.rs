//! State actor - owns the `StateStore` and processes commands.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Store errors are logged and reported to the caller, never fatal
//! - Channel send failures are ignored (callers may have gone away)

use std::ops::ControlFlow;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use elementerm_protocol::IpcMessage;

use super::commands::{StateCommand, StateError, StateEvent};
use crate::router::{self, Routed};
use crate::store::StateStore;

/// The state actor - single owner of the application state.
///
/// Receives commands via mpsc, processes them sequentially, and publishes
/// the full state after every dispatched record.
pub struct StateActor {
    receiver: mpsc::Receiver<StateCommand>,
    store: StateStore,
    event_publisher: broadcast::Sender<StateEvent>,
}

impl StateActor {
    pub fn new(
        receiver: mpsc::Receiver<StateCommand>,
        store: StateStore,
        event_publisher: broadcast::Sender<StateEvent>,
    ) -> Self {
        Self {
            receiver,
            store,
            event_publisher,
        }
    }

    /// Runs until a `Shutdown` command arrives or every handle is dropped.
    pub async fn run(mut self) {
        info!(sessions = self.store.snapshot().sessions.len(), "State actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            if self.handle_command(cmd).is_break() {
                info!("State actor stopped (shutdown)");
                return;
            }
        }

        info!("State actor stopped (all handles dropped)");
    }

    fn handle_command(&mut self, cmd: StateCommand) -> ControlFlow<()> {
        match cmd {
            StateCommand::Dispatch {
                message,
                respond_to,
            } => {
                let result = self.handle_dispatch(message);
                if let Some(tx) = respond_to {
                    let _ = tx.send(result);
                }
            }
            StateCommand::GetSnapshot { respond_to } => {
                let _ = respond_to.send(self.store.snapshot().clone());
            }
            StateCommand::Reconcile => self.handle_reconcile(),
            StateCommand::Shutdown { respond_to } => {
                let result = self.store.cleanup().map_err(StateError::from);
                if let Err(ref e) = result {
                    warn!(error = %e, "Failed to remove snapshot on shutdown");
                }
                let _ = respond_to.send(result);
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Routes a record and always republishes the full state afterwards.
    fn handle_dispatch(&mut self, message: IpcMessage) -> Result<Routed, StateError> {
        let kind = message.kind().to_string();
        let result = router::route(&mut self.store, message).map_err(StateError::from);

        match &result {
            Ok(routed) => debug!(kind = %kind, outcome = ?routed, "Dispatched message"),
            Err(e) => error!(kind = %kind, error = %e, "Failed to apply message"),
        }

        self.publish();
        result
    }

    fn handle_reconcile(&mut self) {
        match self.store.reload() {
            Ok(true) => {
                info!("Snapshot changed on disk, adopting external state");
                self.publish();
            }
            Ok(false) => debug!("Reconcile: no external changes"),
            Err(e) => warn!(error = %e, "Reconcile failed, keeping in-memory state"),
        }
    }

    fn publish(&self) {
        let state = Arc::new(self.store.snapshot().clone());
        // No subscribers is fine
        let _ = self.event_publisher.send(StateEvent::Changed(state));
    }
}
