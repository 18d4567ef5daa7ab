//! Elementerm Daemon - State store and broadcast server
//!
//! This crate provides the core infrastructure for the elementerm daemon:
//! - `store` - authoritative in-memory state persisted to the snapshot file
//! - `router` - maps inbound records onto store mutations
//! - `state` - actor that serializes every mutation and publishes snapshots
//! - `server` - Unix socket Broadcast Server
//! - `lock` / `supervisor` - single-instance lock, startup and shutdown
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    elementermd daemon                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │ BroadcastServer │────▶│     StateActor              │   │
//! │  │ (Unix Socket)   │     │  router + StateStore        │   │
//! │  └────────┬────────┘     └──────────────┬──────────────┘   │
//! │           │                             │                   │
//! │           │ connections                 │ full snapshots    │
//! │           ▼                             ▼                   │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │ConnectionHandler│     │   broadcast::Sender         │   │
//! │  │  (per client)   │     │   (state distribution)      │   │
//! │  └─────────────────┘     └─────────────────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod lock;
pub mod router;
pub mod server;
pub mod state;
pub mod store;
pub mod supervisor;

pub use supervisor::{Daemon, DaemonOptions, ShutdownSignals, SupervisorError};
