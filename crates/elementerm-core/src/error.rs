//! Domain-specific error types following panic-free policy.

use std::path::PathBuf;

use crate::SessionId;
use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Session not found in the state
    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: SessionId },

    /// Invalid field value
    #[error("Invalid {field}: {value} (expected {expected})")]
    InvalidFieldValue {
        field: String,
        value: String,
        expected: String,
    },

    /// Parse error for incoming data
    #[error("Failed to parse {field}: {reason}")]
    ParseError { field: String, reason: String },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

/// Errors reading or writing the persisted snapshot file.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Failed to access snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The bytes are not JSON at all.
    #[error("Snapshot {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Valid JSON, but not an application state.
    #[error("Snapshot {path} has an invalid structure: {reason}")]
    InvalidShape { path: PathBuf, reason: String },

    #[error("Failed to serialize snapshot: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Errors loading `config.toml`.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Could not determine home directory (set ELEMENTERM_DIR)")]
    NoHomeDir,
}
