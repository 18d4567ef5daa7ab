//! Elementerm Daemon - session state store and broadcast server
//!
//! This binary runs as a background daemon: it owns the session state,
//! accepts records from the CLI and hook reporters, and broadcasts every
//! state change to connected dashboards.
//!
//! # Usage
//!
//! ```bash
//! # Start the daemon (foreground)
//! elementermd start
//!
//! # Start the daemon (background/daemonized)
//! elementermd start -d
//!
//! # Stop the daemon
//! elementermd stop
//!
//! # Check daemon status
//! elementermd status
//! ```

use std::fs::OpenOptions;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use elementerm_core::{is_process_alive, Config, Paths};
use elementermd::lock::{read_pid, LockError};
use elementermd::{Daemon, DaemonOptions, ShutdownSignals, SupervisorError};

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);
const STOP_POLL_ATTEMPTS: u32 = 50;

/// Elementerm daemon - coding-agent session state sync
#[derive(Parser, Debug)]
#[command(name = "elementermd", version, about)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the daemon
    Start {
        /// Run as a background daemon (fork to background)
        #[arg(short = 'd', long)]
        daemon: bool,
    },
    /// Stop the running daemon
    Stop,
    /// Show daemon status
    Status,
}

fn running_pid(paths: &Paths) -> Option<u32> {
    read_pid(&paths.pid_file).filter(|pid| *pid != 0 && is_process_alive(*pid))
}

fn send_sigterm(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: kill(2) has no memory-safety preconditions.
    unsafe { libc::kill(pid, libc::SIGTERM) == 0 }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let paths = Paths::from_env().context("Failed to resolve the elementerm directory")?;

    let command = args.command.unwrap_or(Command::Start { daemon: false });

    match command {
        Command::Start { daemon } => {
            if let Some(pid) = running_pid(&paths) {
                println!("Elementerm daemon already running (PID: {pid}).");
                process::exit(1);
            }

            let config = Config::load(&paths.config_file)?;

            if daemon {
                daemonize(&paths)?;
            }

            run_daemon(paths, config)
        }
        Command::Stop => {
            let Some(pid) = running_pid(&paths) else {
                println!("Elementerm daemon is not running.");
                return Ok(());
            };

            println!("Stopping daemon (PID {pid})...");
            if !send_sigterm(pid) {
                eprintln!("Failed to send SIGTERM to process {pid}");
                process::exit(1);
            }

            for _ in 0..STOP_POLL_ATTEMPTS {
                if !is_process_alive(pid) {
                    println!("Daemon stopped.");
                    return Ok(());
                }
                std::thread::sleep(STOP_POLL_INTERVAL);
            }

            eprintln!("Daemon did not stop within 5 seconds.");
            process::exit(1);
        }
        Command::Status => {
            let Some(pid) = running_pid(&paths) else {
                println!("Elementerm daemon is not running.");
                process::exit(1);
            };

            println!("Daemon is running (PID {pid})");
            if paths.socket_path.exists() {
                println!("Socket: {}", paths.socket_path.display());
            }
            println!("State: {}", paths.state_file.display());
            Ok(())
        }
    }
}

fn daemonize(paths: &Paths) -> Result<()> {
    use daemonize::Daemonize;

    paths
        .ensure_dir()
        .with_context(|| format!("Failed to create {}", paths.dir.display()))?;

    let log_path = paths.log_file("daemon");
    let open_log = || {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open log file {}", log_path.display()))
    };
    let stdout = open_log()?;
    let stderr = open_log()?;

    Daemonize::new()
        .working_directory("/")
        .stdout(stdout)
        .stderr(stderr)
        .start()
        .context("Failed to daemonize")?;

    Ok(())
}

#[tokio::main]
async fn run_daemon(paths: Paths, config: Config) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("elementermd=info".parse()?)
                .add_directive("elementerm_core=info".parse()?)
                .add_directive("elementerm_protocol=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        dir = %paths.dir.display(),
        "Elementerm daemon starting"
    );

    let signals = ShutdownSignals::register().context("Failed to install signal handlers")?;

    let daemon = match Daemon::start(DaemonOptions::new(paths, config)) {
        Ok(daemon) => daemon,
        Err(SupervisorError::Lock(LockError::AlreadyRunning { pid })) => {
            println!("Elementerm daemon already running (PID: {pid}).");
            process::exit(1);
        }
        Err(e) => return Err(e).context("Failed to start daemon"),
    };

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        signals.recv().await;
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    info!(socket = %daemon.paths().socket_path.display(), "Starting server");

    daemon.run(cancel_token).await.context("Daemon stopped with an error")
}
