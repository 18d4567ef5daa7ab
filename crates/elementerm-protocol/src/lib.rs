//! Elementerm Protocol - Wire protocol for daemon communication
//!
//! This crate provides the newline-delimited JSON records exchanged between
//! hook reporters, CLI commands and dashboards on one side and the daemon
//! on the other, plus parsing of the raw hook JSON supplied by the agent tool.

pub mod message;
pub mod parse;

pub use message::{IpcMessage, SessionRef};
pub use parse::{HookEnv, RawHookInput, RawToolInput};

/// Maximum accepted length of one record (1 MB).
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Errors encoding or decoding a record.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),
}
