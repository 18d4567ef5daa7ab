//! Connection handler for individual client connections.
//!
//! Each client connection gets its own `ConnectionHandler` that:
//! - Registers an outbound queue with the `ClientRegistry`
//! - Runs a writer task draining that queue onto the socket
//! - Splits the inbound byte stream on newlines and decodes each record
//! - Submits decoded records to the state actor
//!
//! Records are fire-and-forget: nothing is ever written back in reply, and
//! malformed lines are dropped without closing the connection.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Connection errors are logged and result in graceful disconnect

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use elementerm_protocol::{IpcMessage, MAX_LINE_BYTES};

use super::{ClientId, ClientRegistry, OutboundLine};
use crate::state::StateHandle;

/// Write timeout for one queued line (10 seconds)
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection handler for a single client.
pub struct ConnectionHandler {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    id: ClientId,
    state: StateHandle,
    clients: ClientRegistry,
    cancel_token: CancellationToken,
    client_buffer: usize,
}

impl ConnectionHandler {
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The accepted Unix stream
    /// * `id` - Unique number for this connection
    /// * `state` - Handle to the state actor
    /// * `clients` - Registry the connection is broadcast through
    /// * `cancel_token` - Server shutdown token; cancelling closes the connection
    /// * `client_buffer` - Outbound queue depth
    pub fn new(
        stream: UnixStream,
        id: ClientId,
        state: StateHandle,
        clients: ClientRegistry,
        cancel_token: CancellationToken,
        client_buffer: usize,
    ) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
            id,
            state,
            clients,
            cancel_token,
            client_buffer: client_buffer.max(1),
        }
    }

    /// Runs the connection until EOF, a read error, or server shutdown.
    pub async fn run(self) {
        let Self {
            mut reader,
            writer,
            id,
            state,
            clients,
            cancel_token,
            client_buffer,
        } = self;

        debug!(client_id = id, "Client connected");

        let (queue_tx, queue_rx) = mpsc::channel(client_buffer);
        clients.register(id, queue_tx).await;
        let writer_task = tokio::spawn(write_loop(id, writer, queue_rx));

        let result = tokio::select! {
            _ = cancel_token.cancelled() => {
                debug!(client_id = id, "Closing connection for shutdown");
                Ok(())
            }
            result = read_loop(id, &mut reader, &state) => result,
        };

        if let Err(e) = result {
            debug!(client_id = id, error = %e, "Connection closed with error");
        }

        // Dropping the queue sender ends the writer once it has drained.
        clients.deregister(id).await;
        let _ = writer_task.await;
        debug!(client_id = id, "Client disconnected");
    }
}

/// Reads records until EOF and submits each one to the state actor.
async fn read_loop(
    id: ClientId,
    reader: &mut BufReader<OwnedReadHalf>,
    state: &StateHandle,
) -> Result<(), ConnectionError> {
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = read_record(reader, &mut buf).await?;
        if read == 0 {
            trace!(client_id = id, "Client sent EOF");
            return Ok(());
        }

        let Some(message) = decode(id, &buf) else {
            continue;
        };

        trace!(client_id = id, kind = %message.kind(), "Received record");

        if state.submit(message).await.is_err() {
            return Err(ConnectionError::StateClosed);
        }
    }
}

/// Reads one newline-terminated record, bounded by `MAX_LINE_BYTES`.
///
/// Returns the number of bytes read; `0` means EOF. A final record without
/// a trailing newline is still returned.
async fn read_record(
    reader: &mut BufReader<OwnedReadHalf>,
    buf: &mut Vec<u8>,
) -> Result<usize, ConnectionError> {
    let limit = (MAX_LINE_BYTES + 1) as u64;
    let read = (&mut *reader)
        .take(limit)
        .read_until(b'\n', buf)
        .await
        .map_err(ConnectionError::Io)?;

    if read > MAX_LINE_BYTES && buf.last() != Some(&b'\n') {
        return Err(ConnectionError::MessageTooLarge {
            size: read,
            max: MAX_LINE_BYTES,
        });
    }

    Ok(read)
}

/// Decodes one raw line. Malformed input is dropped.
fn decode(id: ClientId, raw: &[u8]) -> Option<IpcMessage> {
    let text = match std::str::from_utf8(raw) {
        Ok(text) => text,
        Err(_) => {
            debug!(client_id = id, "Dropping non-UTF-8 record");
            return None;
        }
    };

    match IpcMessage::decode_line(text) {
        Ok(message) => message,
        Err(e) => {
            debug!(client_id = id, error = %e, "Dropping malformed record");
            None
        }
    }
}

/// Drains the client's outbound queue onto the socket.
async fn write_loop(id: ClientId, mut writer: OwnedWriteHalf, mut queue: mpsc::Receiver<OutboundLine>) {
    while let Some(line) = queue.recv().await {
        match timeout(WRITE_TIMEOUT, writer.write_all(line.as_bytes())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(client_id = id, error = %e, "Write failed, stopping writer");
                break;
            }
            Err(_) => {
                warn!(client_id = id, "Write timed out, stopping writer");
                break;
            }
        }
    }

    let _ = writer.shutdown().await;
}

/// Errors that can occur during connection handling.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[source] std::io::Error),

    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("State actor is no longer running")]
    StateClosed,
}
