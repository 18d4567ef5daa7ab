//! Client interface for interacting with the StateActor.
//!
//! The `StateHandle` provides a cheap-to-clone interface for sending commands
//! to the state actor and subscribing to state events.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel errors are mapped to `StateError::ChannelClosed`

use tokio::sync::{broadcast, mpsc, oneshot};

use elementerm_core::AppState;
use elementerm_protocol::IpcMessage;

use super::commands::{StateCommand, StateError, StateEvent};
use crate::router::Routed;

// ============================================================================
// State Handle
// ============================================================================

/// Handle for interacting with the state actor.
///
/// # Usage
///
/// ```ignore
/// let handle = state_handle.clone();
///
/// // Route a record and wait for the outcome
/// let routed = handle.dispatch(message).await?;
///
/// // Subscribe to state changes
/// let mut rx = handle.subscribe();
/// while let Ok(StateEvent::Changed(state)) = rx.recv().await {
///     // broadcast `state`
/// }
/// ```
#[derive(Clone)]
pub struct StateHandle {
    sender: mpsc::Sender<StateCommand>,
    event_sender: broadcast::Sender<StateEvent>,
}

impl StateHandle {
    pub fn new(sender: mpsc::Sender<StateCommand>, event_sender: broadcast::Sender<StateEvent>) -> Self {
        Self {
            sender,
            event_sender,
        }
    }

    /// Routes a record and waits until it has been applied.
    ///
    /// # Errors
    ///
    /// - `StateError::Store` if persisting the change failed
    /// - `StateError::ChannelClosed` if the actor has shut down
    pub async fn dispatch(&self, message: IpcMessage) -> Result<Routed, StateError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(StateCommand::Dispatch {
                message,
                respond_to: Some(tx),
            })
            .await
            .map_err(|_| StateError::ChannelClosed)?;

        rx.await.map_err(|_| StateError::ChannelClosed)?
    }

    /// Queues a record for routing without waiting for the outcome.
    ///
    /// Records submitted from one task are applied in submission order.
    pub async fn submit(&self, message: IpcMessage) -> Result<(), StateError> {
        self.sender
            .send(StateCommand::Dispatch {
                message,
                respond_to: None,
            })
            .await
            .map_err(|_| StateError::ChannelClosed)
    }

    /// Returns a copy of the current state.
    pub async fn snapshot(&self) -> Result<AppState, StateError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(StateCommand::GetSnapshot { respond_to: tx })
            .await
            .map_err(|_| StateError::ChannelClosed)?;

        rx.await.map_err(|_| StateError::ChannelClosed)
    }

    /// Triggers a reconciliation sweep (fire-and-forget).
    pub async fn reconcile(&self) -> Result<(), StateError> {
        self.sender
            .send(StateCommand::Reconcile)
            .await
            .map_err(|_| StateError::ChannelClosed)
    }

    /// Deletes the snapshot file and stops the actor.
    pub async fn shutdown(&self) -> Result<(), StateError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(StateCommand::Shutdown { respond_to: tx })
            .await
            .map_err(|_| StateError::ChannelClosed)?;

        rx.await.map_err(|_| StateError::ChannelClosed)?
    }

    /// Subscribe to state events.
    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.event_sender.subscribe()
    }

    /// Returns `true` while the actor is still running.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_handle() -> (StateHandle, mpsc::Receiver<StateCommand>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (event_tx, _event_rx) = broadcast::channel(16);
        (StateHandle::new(cmd_tx, event_tx), cmd_rx)
    }

    #[tokio::test]
    async fn test_submit_sends_dispatch_without_reply() {
        let (handle, mut rx) = create_test_handle();

        handle.submit(IpcMessage::DaemonShutdown).await.unwrap();

        match rx.recv().await {
            Some(StateCommand::Dispatch {
                message,
                respond_to,
            }) => {
                assert_eq!(message, IpcMessage::DaemonShutdown);
                assert!(respond_to.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_closed_channel_maps_to_error() {
        let (handle, rx) = create_test_handle();
        drop(rx);

        assert!(!handle.is_connected());
        assert!(matches!(
            handle.snapshot().await,
            Err(StateError::ChannelClosed)
        ));
        assert!(matches!(
            handle.dispatch(IpcMessage::DaemonShutdown).await,
            Err(StateError::ChannelClosed)
        ));
    }
}
