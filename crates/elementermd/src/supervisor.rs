//! Daemon supervisor: startup, the serving loop, and graceful shutdown.
//!
//! Startup order is lock, load, mark every session idle, then serve. A
//! restarted daemon cannot know what its agents did while it was away, so
//! nothing stays in `flow` or `ready` across a restart.
//!
//! Shutdown order is the reverse: the server closes every client and removes
//! the socket, the state actor deletes the snapshot, the lock file goes last.

use std::sync::Arc;

use thiserror::Error;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use elementerm_core::{Clock, Config, DaemonInfo, Paths, SystemClock};

use crate::lock::{DaemonLock, LockError};
use crate::server::{BroadcastServer, ServerError};
use crate::state::{spawn_state_actor, StateError};
use crate::store::{LoadOutcome, StateStore, StoreError};

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("Failed to create {}: {source}", path.display())]
    CreateDir {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Everything a daemon instance needs, injected rather than ambient.
#[derive(Clone)]
pub struct DaemonOptions {
    pub paths: Paths,
    pub config: Config,
    pub pid: u32,
    pub clock: Arc<dyn Clock>,
}

impl DaemonOptions {
    /// Options for the current process with the system clock.
    pub fn new(paths: Paths, config: Config) -> Self {
        Self {
            paths,
            config,
            pid: std::process::id(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// A daemon that holds the lock and has loaded its state, ready to serve.
pub struct Daemon {
    options: DaemonOptions,
    lock: DaemonLock,
    store: StateStore,
}

impl Daemon {
    /// Acquires the single-instance lock and loads the persisted state.
    ///
    /// # Errors
    ///
    /// `LockError::AlreadyRunning` if another live daemon owns the pid file.
    /// The existing daemon and its files are left untouched.
    pub fn start(options: DaemonOptions) -> Result<Self, SupervisorError> {
        options
            .paths
            .ensure_dir()
            .map_err(|source| SupervisorError::CreateDir {
                path: options.paths.dir.clone(),
                source,
            })?;

        let lock = DaemonLock::acquire(&options.paths.pid_file, options.pid)?;

        match Self::load_store(&options) {
            Ok(store) => Ok(Self {
                options,
                lock,
                store,
            }),
            Err(e) => {
                lock.release();
                Err(e)
            }
        }
    }

    fn load_store(options: &DaemonOptions) -> Result<StateStore, SupervisorError> {
        let daemon = DaemonInfo::capture(options.clock.as_ref(), options.pid);
        let mut store = StateStore::new(&options.paths.state_file, daemon, Arc::clone(&options.clock));

        match store.load()? {
            LoadOutcome::Fresh => info!("No snapshot found, starting with empty state"),
            LoadOutcome::Restored { sessions } => info!(sessions, "Restored sessions from snapshot"),
            LoadOutcome::RestoredPartial {
                sessions,
                skipped,
                backup,
            } => warn!(
                sessions,
                skipped,
                backup = %backup.display(),
                "Restored sessions from snapshot, dropped unreadable entries"
            ),
            LoadOutcome::DiscardedInvalid => warn!("Snapshot had an invalid structure, starting fresh"),
            LoadOutcome::RecoveredCorrupt { backup } => {
                warn!(backup = %backup.display(), "Snapshot was corrupt, starting fresh")
            }
        }

        let idled = store.set_all_sessions_idle()?;
        if idled > 0 {
            info!(sessions = idled, "Reset sessions to idle after restart");
        }

        Ok(store)
    }

    pub fn pid(&self) -> u32 {
        self.lock.pid()
    }

    pub fn paths(&self) -> &Paths {
        &self.options.paths
    }

    /// Serves until `cancel` fires, then shuts down gracefully.
    ///
    /// On a server error the lock is released but the snapshot is kept.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), SupervisorError> {
        let Self {
            options,
            lock,
            store,
        } = self;

        let state = spawn_state_actor(store, options.config.reconcile_interval());
        let server = BroadcastServer::new(&options.paths.socket_path, state.clone(), cancel.clone())
            .with_client_buffer(options.config.client_buffer);

        if let Err(e) = server.run().await {
            error!(error = %e, "Server error");
            cancel.cancel();
            lock.release();
            return Err(e.into());
        }

        let result = state.shutdown().await;
        if let Err(ref e) = result {
            warn!(error = %e, "State actor shutdown failed");
        }

        lock.release();
        info!("Elementerm daemon stopped");
        result.map_err(SupervisorError::from)
    }
}

/// SIGTERM and SIGINT handlers, installed up front.
///
/// Register before `Daemon::start` so a registration failure aborts startup.
pub struct ShutdownSignals {
    sigterm: Signal,
    sigint: Signal,
}

impl ShutdownSignals {
    pub fn register() -> std::io::Result<Self> {
        Ok(Self {
            sigterm: signal(SignalKind::terminate())?,
            sigint: signal(SignalKind::interrupt())?,
        })
    }

    /// Resolves on the first SIGTERM or SIGINT.
    pub async fn recv(mut self) {
        tokio::select! {
            _ = self.sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = self.sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }
}
