//! Daemon socket clients.
//!
//! Two shapes of client talk to the daemon:
//! - [`send_message`] is a one-shot writer used by CLI commands and the hook
//!   reporter: connect, write one record, close, all under one deadline.
//! - [`DaemonClient`] is the dashboard's long-lived reader: it reconnects
//!   with exponential backoff and forwards every `state_update` to the event
//!   loop.
//!
//! **Panic-Free Policy:** This module follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use elementerm_protocol::IpcMessage;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{CliError, Result};
use crate::input::Event;

// ============================================================================
// One-Shot Sender
// ============================================================================

/// Connects to the daemon, writes one framed record and closes.
///
/// Connecting and writing together must finish within `deadline`.
///
/// # Errors
///
/// `CliError::DaemonUnavailable` when nothing listens on `socket_path`,
/// `CliError::Timeout` when the deadline passes first.
pub async fn send_message(socket_path: &Path, message: &IpcMessage, deadline: Duration) -> Result<()> {
    let line = message.encode_line()?;

    let exchange = async {
        let mut stream = UnixStream::connect(socket_path)
            .await
            .map_err(|source| CliError::DaemonUnavailable {
                path: socket_path.to_path_buf(),
                source,
            })?;
        stream.write_all(line.as_bytes()).await?;
        stream.flush().await?;
        stream.shutdown().await?;
        Ok::<(), CliError>(())
    };

    timeout(deadline, exchange)
        .await
        .map_err(|_| CliError::Timeout { after: deadline })??;

    debug!(kind = message.kind(), socket = %socket_path.display(), "Sent record to daemon");
    Ok(())
}

// ============================================================================
// Configuration
// ============================================================================

/// Connection behavior of the streaming client.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Path to the Unix socket where the daemon listens.
    pub socket_path: PathBuf,

    /// Initial delay before first retry after connection failure.
    pub retry_initial_delay: Duration,

    /// Maximum delay between retry attempts.
    pub retry_max_delay: Duration,

    /// Multiplier for exponential backoff (e.g., 2.0 doubles delay each retry).
    pub retry_multiplier: f64,
}

impl DaemonConfig {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            retry_initial_delay: Duration::from_secs(1),
            retry_max_delay: Duration::from_secs(30),
            retry_multiplier: 2.0,
        }
    }
}

// ============================================================================
// Streaming Client
// ============================================================================

/// Dashboard client: subscribes to the daemon's broadcasts.
///
/// The daemon treats every connection as a broadcast target, so there is no
/// handshake: connecting is subscribing. The client never writes.
pub struct DaemonClient {
    config: DaemonConfig,
    event_tx: mpsc::UnboundedSender<Event>,
    cancel_token: CancellationToken,
}

impl DaemonClient {
    #[must_use]
    pub fn new(config: DaemonConfig, event_tx: mpsc::UnboundedSender<Event>, cancel_token: CancellationToken) -> Self {
        Self {
            config,
            event_tx,
            cancel_token,
        }
    }

    /// Maintains the connection until the cancellation token fires.
    pub async fn run(&self) {
        info!(
            socket_path = %self.config.socket_path.display(),
            "Daemon client starting"
        );

        loop {
            if self.cancel_token.is_cancelled() {
                info!("Daemon client shutting down (cancelled)");
                return;
            }

            match self.connect_with_retry().await {
                Some(stream) => {
                    info!("Connected to daemon");
                    let _ = self.event_tx.send(Event::DaemonConnected);

                    if let Err(e) = self.message_loop(stream).await {
                        warn!(error = %e, "Connection ended with error");
                    }

                    // The UI may already be gone.
                    let _ = self.event_tx.send(Event::DaemonDisconnected);
                }
                None => {
                    info!("Daemon client shutting down (cancelled)");
                    return;
                }
            }
        }
    }

    /// Retries with exponential backoff. Returns `None` once cancelled.
    async fn connect_with_retry(&self) -> Option<UnixStream> {
        let mut delay = self.config.retry_initial_delay;
        let mut attempt = 0u32;

        loop {
            attempt = attempt.saturating_add(1);

            match UnixStream::connect(&self.config.socket_path).await {
                Ok(stream) => {
                    debug!(attempt, "Connection successful");
                    return Some(stream);
                }
                Err(e) => {
                    if attempt == 1 {
                        warn!(
                            socket_path = %self.config.socket_path.display(),
                            error = %e,
                            "Daemon not reachable, will retry"
                        );
                    } else {
                        debug!(attempt, error = %e, "Connection attempt failed");
                    }
                }
            }

            tokio::select! {
                _ = sleep(delay) => {
                    let next_delay_ms = (delay.as_millis() as f64 * self.config.retry_multiplier) as u64;
                    delay = Duration::from_millis(next_delay_ms).min(self.config.retry_max_delay);
                }
                _ = self.cancel_token.cancelled() => {
                    return None;
                }
            }
        }
    }

    /// Reads broadcasts until EOF, an I/O error or cancellation.
    async fn message_loop(&self, stream: UnixStream) -> Result<()> {
        let mut reader = BufReader::new(stream);
        let mut line = String::new();

        loop {
            line.clear();
            tokio::select! {
                read_result = reader.read_line(&mut line) => {
                    match read_result {
                        Ok(0) => {
                            info!("Daemon closed connection");
                            return Ok(());
                        }
                        Ok(_) => self.handle_line(&line),
                        Err(e) => return Err(CliError::Io(e)),
                    }
                }
                _ = self.cancel_token.cancelled() => {
                    debug!("Message loop cancelled");
                    return Ok(());
                }
            }
        }
    }

    fn handle_line(&self, line: &str) {
        match IpcMessage::decode_line(line) {
            Ok(Some(IpcMessage::StateUpdate(state))) => {
                debug!(sessions = state.sessions.len(), "Received state update");
                let _ = self.event_tx.send(Event::StateUpdate(state));
            }
            Ok(Some(other)) => {
                debug!(kind = other.kind(), "Ignoring record");
            }
            Ok(None) => {}
            Err(e) => {
                // A single bad line never drops the connection.
                warn!(error = %e, "Failed to decode broadcast");
            }
        }
    }
}
