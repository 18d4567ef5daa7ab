//! State actor commands, errors, and events.
//!
//! This module defines the message types for communicating with the `StateActor`:
//! - `StateCommand`: Commands sent to the actor
//! - `StateError`: Errors that can occur during state operations
//! - `StateEvent`: Events published by the actor for subscribers

use std::sync::Arc;

use elementerm_core::AppState;
use elementerm_protocol::IpcMessage;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::router::Routed;
use crate::store::StoreError;

// ============================================================================
// State Commands
// ============================================================================

/// Commands sent to the state actor.
///
/// Commands are processed strictly in arrival order, which is what keeps the
/// daemon's mutations single-writer.
#[derive(Debug)]
pub enum StateCommand {
    /// Route one inbound IPC record, then publish the resulting state.
    ///
    /// `respond_to` is `None` for fire-and-forget delivery from connections.
    Dispatch {
        message: IpcMessage,
        respond_to: Option<oneshot::Sender<Result<Routed, StateError>>>,
    },

    /// Get a copy of the current state.
    GetSnapshot {
        respond_to: oneshot::Sender<AppState>,
    },

    /// Re-read the snapshot file and publish if it differs from memory.
    ///
    /// Fire-and-forget; sent by the reconciliation task.
    Reconcile,

    /// Delete the snapshot file and stop the actor.
    Shutdown {
        respond_to: oneshot::Sender<Result<(), StateError>>,
    },
}

// ============================================================================
// State Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum StateError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The actor has stopped.
    #[error("State actor channel closed")]
    ChannelClosed,
}

// ============================================================================
// State Events
// ============================================================================

/// Events published by the state actor.
#[derive(Debug, Clone)]
pub enum StateEvent {
    /// The state after a dispatched record or a reconciliation that found
    /// external changes. Shared so every subscriber reuses one allocation.
    Changed(Arc<AppState>),
}
