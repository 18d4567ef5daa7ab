//! Elementerm Core - Shared types for coding-agent session state
//!
//! This crate provides the domain model shared between the daemon
//! (elementermd), the CLI and the dashboard:
//! - `session` / `state` - sessions, projects and the `AppState` aggregate
//! - `machine` - the pure session status state machine
//! - `hook` - hook events reported by the agent tool
//! - `paths` / `config` / `snapshot` - on-disk layout and persistence helpers
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod config;
pub mod error;
pub mod hook;
pub mod machine;
pub mod paths;
pub mod process;
pub mod session;
pub mod snapshot;
pub mod state;

// Re-exports for convenience
pub use config::Config;
pub use error::{ConfigError, DomainError, DomainResult, SnapshotError};
pub use hook::{HookEvent, HookEventKind, UnrecognizedEvent};
pub use paths::Paths;
pub use process::is_process_alive;
pub use session::{CommitInfo, DomainTag, Session, SessionId, SessionStatus, SessionUpdate};
pub use snapshot::{read_snapshot, read_snapshot_entries, remove_snapshot, write_snapshot, LoadedSnapshot};
pub use state::{AppState, Clock, DaemonInfo, Project, SystemClock, VERSION};
