//! Unix socket Broadcast Server for the elementerm daemon.
//!
//! The server:
//! - Listens on a Unix socket for client connections
//! - Spawns a ConnectionHandler for each client
//! - Feeds every decoded record to the state actor
//! - Fans every published state out to all connected clients
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ BroadcastServer │
//! │                 │
//! │  UnixListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐  submit   ┌─────────────────┐
//! │ConnectionHandler│──────────▶│   StateHandle   │
//! │   (per client)  │           └────────┬────────┘
//! └───────┬─────────┘                    │ StateEvent
//!         │ register                     ▼
//!         ▼                     ┌─────────────────┐
//! ┌─────────────────┐ try_send  │   broadcaster   │
//! │ ClientRegistry  │◀──────────│      task       │
//! └───────┬─────────┘           └─────────────────┘
//!         │ per-client queue
//!         ▼
//!   writer task ──▶ socket
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Server errors are logged and allow continued operation

mod connection;

pub use connection::{ConnectionError, ConnectionHandler};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::UnixListener;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use elementerm_core::AppState;
use elementerm_protocol::IpcMessage;

use crate::state::{StateEvent, StateHandle};

/// Default depth of each client's outbound queue.
pub const DEFAULT_CLIENT_BUFFER: usize = 64;

/// Identifier assigned to each accepted connection.
pub type ClientId = u64;

/// One queued outbound line, shared by every client it is sent to.
pub type OutboundLine = Arc<str>;

// ============================================================================
// Client Registry
// ============================================================================

/// Registry of connected clients, keyed by connection id.
///
/// Each entry is the sending side of that client's bounded outbound queue.
/// A client whose queue is full or closed is dropped from the registry on
/// the next broadcast.
#[derive(Clone, Default)]
pub struct ClientRegistry {
    clients: Arc<RwLock<HashMap<ClientId, mpsc::Sender<OutboundLine>>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, id: ClientId, queue: mpsc::Sender<OutboundLine>) {
        self.clients.write().await.insert(id, queue);
        debug!(client_id = id, "Registered client");
    }

    /// Removes a client. Returns `true` if it was registered.
    pub async fn deregister(&self, id: ClientId) -> bool {
        let removed = self.clients.write().await.remove(&id).is_some();
        if removed {
            debug!(client_id = id, "Removed client");
        }
        removed
    }

    /// Serializes `message` once and queues it for every client.
    ///
    /// Returns the number of clients the line was queued for.
    pub async fn broadcast(&self, message: &IpcMessage) -> usize {
        let line: OutboundLine = match message.encode_line() {
            Ok(line) => Arc::from(line),
            Err(e) => {
                error!(kind = %message.kind(), error = %e, "Failed to serialize broadcast");
                return 0;
            }
        };

        let mut delivered = 0;
        let mut failed = Vec::new();
        {
            let clients = self.clients.read().await;
            for (id, queue) in clients.iter() {
                match queue.try_send(Arc::clone(&line)) {
                    Ok(()) => delivered += 1,
                    Err(e) => {
                        debug!(client_id = id, error = %e, "Failed to queue broadcast");
                        failed.push(*id);
                    }
                }
            }
        }

        if !failed.is_empty() {
            let mut clients = self.clients.write().await;
            for id in failed {
                clients.remove(&id);
                debug!(client_id = id, "Removed failed client");
            }
        }

        delivered
    }

    /// Broadcasts the full state wrapped in a `state_update` record.
    pub async fn broadcast_state(&self, state: &AppState) -> usize {
        self.broadcast(&IpcMessage::state_update(state.clone())).await
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Drops every outbound queue, which ends each client's writer task.
    pub async fn close_all(&self) {
        let mut clients = self.clients.write().await;
        let count = clients.len();
        clients.clear();
        if count > 0 {
            debug!(count, "Closed all client queues");
        }
    }
}

// ============================================================================
// Broadcast Server
// ============================================================================

/// Unix socket server for the elementerm daemon.
pub struct BroadcastServer {
    /// Path to the Unix socket
    socket_path: PathBuf,

    /// Handle to the state actor
    state: StateHandle,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Connection counter for generating client IDs
    connection_counter: AtomicU64,

    /// Connected clients
    clients: ClientRegistry,

    /// Outbound queue depth per client
    client_buffer: usize,
}

impl BroadcastServer {
    /// Creates a new server.
    ///
    /// # Arguments
    ///
    /// * `socket_path` - Path where the Unix socket will be created
    /// * `state` - Handle to the state actor
    /// * `cancel_token` - Token for graceful shutdown
    pub fn new(
        socket_path: impl Into<PathBuf>,
        state: StateHandle,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            socket_path: socket_path.into(),
            state,
            cancel_token,
            connection_counter: AtomicU64::new(0),
            clients: ClientRegistry::new(),
            client_buffer: DEFAULT_CLIENT_BUFFER,
        }
    }

    /// Sets the per-client outbound queue depth (minimum 1).
    pub fn with_client_buffer(mut self, client_buffer: usize) -> Self {
        self.client_buffer = client_buffer.max(1);
        self
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Returns a handle to the client registry.
    pub fn clients(&self) -> ClientRegistry {
        self.clients.clone()
    }

    /// Runs the server.
    ///
    /// Listens for connections until the cancellation token is triggered,
    /// then closes every client and removes the socket file.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = self.bind()?;

        info!(
            socket = %self.socket_path.display(),
            "Broadcast server listening"
        );

        self.spawn_state_broadcaster();

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            let id = self.connection_counter.fetch_add(1, Ordering::Relaxed);
                            self.handle_connection(stream, id);
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }

        drop(listener);
        self.cleanup().await;
        Ok(())
    }

    /// Removes a stale socket left by a crashed instance, then binds.
    fn bind(&self) -> Result<UnixListener, ServerError> {
        let setup_error = |source: std::io::Error| ServerError::SocketSetup {
            path: self.socket_path.clone(),
            source,
        };

        if self.socket_path.exists() {
            debug!(socket = %self.socket_path.display(), "Removing stale socket");
            std::fs::remove_file(&self.socket_path).map_err(setup_error)?;
        }

        if let Some(parent) = self.socket_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(setup_error)?;
            }
        }

        UnixListener::bind(&self.socket_path).map_err(setup_error)
    }

    /// Handles a new client connection by spawning a handler task.
    fn handle_connection(&self, stream: tokio::net::UnixStream, id: ClientId) {
        let handler = ConnectionHandler::new(
            stream,
            id,
            self.state.clone(),
            self.clients.clone(),
            self.cancel_token.clone(),
            self.client_buffer,
        );

        tokio::spawn(handler.run());
    }

    /// Spawns the task that fans published state out to every client.
    fn spawn_state_broadcaster(&self) {
        let mut events = self.state.subscribe();
        let clients = self.clients.clone();
        let cancel_token = self.cancel_token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        debug!("State broadcaster shutting down");
                        break;
                    }

                    result = events.recv() => {
                        match result {
                            Ok(StateEvent::Changed(state)) => {
                                let delivered = clients.broadcast_state(&state).await;
                                debug!(clients = delivered, sessions = state.sessions.len(), "Broadcast state");
                            }
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                // Every event carries the full state, so the next one catches clients up.
                                warn!(skipped = n, "State broadcaster lagged, skipped updates");
                            }
                            Err(broadcast::error::RecvError::Closed) => {
                                debug!("State event channel closed");
                                break;
                            }
                        }
                    }
                }
            }
        });
    }

    /// Performs cleanup on shutdown.
    async fn cleanup(&self) {
        self.clients.close_all().await;

        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(
                    socket = %self.socket_path.display(),
                    error = %e,
                    "Failed to remove socket file"
                );
            }
        }

        info!("Server cleanup complete");
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to set up socket at {}: {source}", path.display())]
    SocketSetup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use elementerm_core::DaemonInfo;

    #[test]
    fn test_server_error_display() {
        let err = ServerError::SocketSetup {
            path: PathBuf::from("/tmp/test.sock"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "permission denied"),
        };
        assert!(err.to_string().contains("/tmp/test.sock"));
        assert!(err.to_string().contains("permission denied"));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_client() {
        let registry = ClientRegistry::new();
        let (tx1, mut rx1) = mpsc::channel(4);
        let (tx2, mut rx2) = mpsc::channel(4);
        registry.register(1, tx1).await;
        registry.register(2, tx2).await;

        let delivered = registry.broadcast(&IpcMessage::DaemonShutdown).await;
        assert_eq!(delivered, 2);

        let line1 = rx1.recv().await.unwrap();
        let line2 = rx2.recv().await.unwrap();
        assert_eq!(&*line1, "{\"type\":\"daemon_shutdown\"}\n");
        assert!(Arc::ptr_eq(&line1, &line2));
    }

    #[tokio::test]
    async fn test_closed_client_removed_others_still_served() {
        let registry = ClientRegistry::new();
        let (tx1, rx1) = mpsc::channel(4);
        let (tx2, mut rx2) = mpsc::channel(4);
        registry.register(1, tx1).await;
        registry.register(2, tx2).await;
        drop(rx1);

        let state = AppState::empty(DaemonInfo::default());
        let delivered = registry.broadcast_state(&state).await;

        assert_eq!(delivered, 1);
        assert_eq!(registry.client_count().await, 1);
        let line = rx2.recv().await.unwrap();
        assert!(line.starts_with("{\"type\":\"state_update\""));
    }

    #[tokio::test]
    async fn test_full_queue_drops_slow_client() {
        let registry = ClientRegistry::new();
        let (slow_tx, _slow_rx) = mpsc::channel(1);
        registry.register(7, slow_tx).await;

        assert_eq!(registry.broadcast(&IpcMessage::DaemonShutdown).await, 1);
        // Queue is now full and nobody drains it.
        assert_eq!(registry.broadcast(&IpcMessage::DaemonShutdown).await, 0);
        assert_eq!(registry.client_count().await, 0);
    }

    #[tokio::test]
    async fn test_close_all_empties_registry() {
        let registry = ClientRegistry::new();
        let (tx, mut rx) = mpsc::channel(1);
        registry.register(1, tx).await;

        registry.close_all().await;

        assert_eq!(registry.client_count().await, 0);
        assert!(rx.recv().await.is_none());
    }
}
