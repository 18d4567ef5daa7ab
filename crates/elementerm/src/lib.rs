//! Elementerm CLI - client side of the session state sync
//!
//! This library backs the `elementerm` and `elementerm-hook` binaries:
//! - `sessions` / `status` / `daemon` / `setup` - the one-shot CLI commands
//! - `hook` - reads a hook payload from stdin and forwards it to the daemon
//! - `client` / `poll` / `app` / `ui` / `input` - the live dashboard
//!
//! # Dashboard Architecture
//!
//! The dashboard is event-driven with four cooperating pieces:
//!
//! 1. **Keyboard Task**: polls for terminal input and forwards key events
//! 2. **Daemon Client Task**: holds the broadcast subscription and forwards state updates
//! 3. **Snapshot Poller**: re-reads the state file so the view stays useful without a daemon
//! 4. **Main Event Loop**: applies events to `App` and renders the UI
//!
//! All tasks respect a shared `CancellationToken` for graceful shutdown.

pub mod app;
pub mod client;
pub mod daemon;
pub mod error;
pub mod hook;
pub mod input;
pub mod poll;
pub mod sessions;
pub mod setup;
pub mod status;
pub mod ui;

// Re-export commonly used types
pub use app::App;
pub use client::DaemonClient;
pub use error::{CliError, Result};
