//! Elementerm - coordinate coding-agent sessions across worktrees
//!
//! # Usage
//!
//! ```text
//! elementerm start                                  # start the daemon
//! elementerm stop                                   # stop the daemon
//! elementerm new -w feat-auth -d BACK               # register a session
//! elementerm rm -w feat-auth | --all                # remove sessions
//! elementerm status                                 # plain-text summary
//! elementerm dash                                   # live dashboard
//! ```

use std::fs::OpenOptions;
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::process;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{ArgGroup, Parser, Subcommand};
use crossterm::{
    event::{self, Event as CrosstermEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use elementerm_cli::app::App;
use elementerm_cli::client::{DaemonClient, DaemonConfig};
use elementerm_cli::daemon::{self, StartOutcome, StopOutcome};
use elementerm_cli::error::{CliError, Result as CliResult};
use elementerm_cli::input::{handle_key_event, Action, Event};
use elementerm_cli::poll::{read_current, spawn_snapshot_poller, DEFAULT_POLL_INTERVAL};
use elementerm_cli::sessions::{
    generate_session_id, register_session, remove_sessions, NewSession, Registration, RemoveOutcome,
    RemoveSelector,
};
use elementerm_cli::setup::{hook_command, install_hooks};
use elementerm_cli::status::status_report;
use elementerm_cli::ui;
use elementerm_core::{Config, DomainTag, Paths};

// ============================================================================
// CLI Arguments
// ============================================================================

/// Elementerm - state sync for coding-agent sessions across worktrees
#[derive(Parser, Debug)]
#[command(name = "elementerm", version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the daemon in the background
    Start,
    /// Stop the running daemon
    Stop,
    /// Open the live dashboard
    Dash,
    /// Register a new session for a worktree
    New {
        /// Worktree name
        #[arg(short = 'w', long)]
        worktree: String,
        /// Project name (default: name of the working directory's parent)
        #[arg(short = 'p', long)]
        project: Option<String>,
        /// Domain tag: BACK, FRONT, SEO, SEC, TEST, INFRA or DOC
        #[arg(short = 'd', long)]
        domain: Option<String>,
        /// Branch name (default: wt/<worktree>)
        #[arg(short = 'b', long)]
        branch: Option<String>,
        /// Worktree directory (default: current directory)
        #[arg(long)]
        cwd: Option<PathBuf>,
    },
    /// Remove a session, or all of them
    #[command(group(ArgGroup::new("target").required(true).args(["worktree", "all"])))]
    Rm {
        /// Worktree of the session to remove
        #[arg(short = 'w', long)]
        worktree: Option<String>,
        /// Remove every session
        #[arg(long)]
        all: bool,
    },
    /// Show sessions grouped by project
    Status,
}

// ============================================================================
// One-shot Commands
// ============================================================================

fn cmd_start(paths: &Paths) -> Result<()> {
    match daemon::start_daemon(paths)? {
        StartOutcome::AlreadyRunning { pid } => println!("Elementerm daemon already running (PID: {pid})."),
        StartOutcome::Started { pid } => println!("Elementerm daemon started (PID: {pid})."),
    }
    Ok(())
}

fn cmd_stop(paths: &Paths) -> Result<()> {
    match daemon::stop_daemon(paths)? {
        StopOutcome::NotRunning => println!("Elementerm daemon is not running."),
        StopOutcome::Stopped { pid } => println!("Elementerm daemon stopped (PID: {pid})."),
        StopOutcome::ProcessNotFound { .. } => println!("Daemon process not found. Cleaning up..."),
    }
    Ok(())
}

async fn cmd_new(
    paths: &Paths,
    config: &Config,
    worktree: String,
    project: Option<String>,
    domain: Option<String>,
    branch: Option<String>,
    cwd: Option<PathBuf>,
) -> Result<()> {
    let domain = match domain {
        Some(raw) => match raw.parse::<DomainTag>() {
            Ok(tag) => Some(tag),
            Err(_) => {
                eprintln!("Invalid domain: {raw}. Valid: {}", DomainTag::valid_values());
                process::exit(1);
            }
        },
        None => None,
    };

    let cwd = match cwd {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to read the current directory")?,
    };

    let new = NewSession::with_defaults(worktree, project, branch, domain, cwd);
    let id = generate_session_id();

    let settings = install_hooks(&new.cwd, &id, &hook_command())?;
    println!("  Hooks installed in {}", settings.display());

    let label = format!(
        "{}/{}{} ({})",
        new.project,
        new.worktree,
        new.domain.map(|d| format!(" [{d}]")).unwrap_or_default(),
        new.branch
    );

    let session = new.into_session(id.clone(), Utc::now());
    match register_session(paths, session, config.ipc_timeout()).await? {
        Registration::Daemon => {}
        Registration::Direct => println!("  Daemon not reachable, wrote {}", paths.state_file.display()),
    }

    println!("  Session registered: {label}");
    println!("  Session id: {id}");
    Ok(())
}

async fn cmd_rm(paths: &Paths, config: &Config, worktree: Option<String>) -> Result<()> {
    let selector = match worktree {
        Some(worktree) => RemoveSelector::Worktree(worktree),
        None => RemoveSelector::All,
    };

    match remove_sessions(paths, &selector, config.ipc_timeout()).await {
        Ok(RemoveOutcome::NoSnapshot) => println!("No sessions to remove."),
        Ok(RemoveOutcome::Removed(removed)) => match (&selector, removed.first()) {
            (RemoveSelector::Worktree(_), Some(session)) => {
                println!("Removed session: {}/{}", session.project, session.worktree)
            }
            _ => println!("Removed {} session(s).", removed.len()),
        },
        Err(e @ CliError::SessionNotFound { .. }) => {
            eprintln!("{e}");
            process::exit(1);
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

// ============================================================================
// Terminal Setup / Cleanup
// ============================================================================

fn setup_terminal() -> CliResult<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().map_err(|e| CliError::TerminalInit(e.to_string()))?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).map_err(|e| CliError::TerminalInit(e.to_string()))?;

    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(|e| CliError::TerminalInit(e.to_string()))
}

fn cleanup_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> CliResult<()> {
    disable_raw_mode().map_err(|e| CliError::TerminalCleanup(e.to_string()))?;

    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .map_err(|e| CliError::TerminalCleanup(e.to_string()))?;

    terminal
        .show_cursor()
        .map_err(|e| CliError::TerminalCleanup(e.to_string()))?;

    Ok(())
}

// ============================================================================
// Keyboard Input Task
// ============================================================================

fn spawn_keyboard_task(
    event_tx: mpsc::UnboundedSender<Event>,
    cancel_token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if cancel_token.is_cancelled() {
                debug!("Keyboard task shutting down");
                break;
            }

            let poll_result = tokio::task::spawn_blocking(|| {
                if event::poll(Duration::from_millis(50)).unwrap_or(false) {
                    event::read().ok()
                } else {
                    None
                }
            })
            .await;

            let forwarded = match poll_result {
                Ok(Some(CrosstermEvent::Key(key))) => Some(Event::Key(key)),
                Ok(Some(CrosstermEvent::Resize(width, height))) => Some(Event::Resize(width, height)),
                Ok(_) => None,
                Err(e) => {
                    error!(error = %e, "Keyboard polling task panicked");
                    break;
                }
            };

            if let Some(event) = forwarded {
                if event_tx.send(event).is_err() {
                    debug!("Event channel closed, keyboard task exiting");
                    break;
                }
            }
        }
    })
}

// ============================================================================
// Dashboard Event Loop
// ============================================================================

async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    paths: &Paths,
    event_rx: &mut mpsc::UnboundedReceiver<Event>,
    cancel_token: &CancellationToken,
) -> Result<()> {
    let tick_rate = Duration::from_millis(100);

    loop {
        terminal.draw(|frame| ui::render(frame, app))?;

        match tokio::time::timeout(tick_rate, event_rx.recv()).await {
            Ok(Some(Event::Key(key))) => match handle_key_event(key, app) {
                Action::Quit => {
                    info!("User requested quit");
                    break;
                }
                Action::Refresh => {
                    debug!("User requested snapshot reload");
                    app.apply_snapshot(read_current(&paths.state_file));
                }
                Action::None => {}
            },
            Ok(Some(Event::Resize(_, _))) => debug!("Terminal resized"),
            Ok(Some(Event::StateUpdate(state))) => {
                debug!(sessions = state.sessions.len(), "Received state update");
                app.apply_state(*state);
            }
            Ok(Some(Event::Snapshot(read))) => app.apply_snapshot(read),
            Ok(Some(Event::DaemonConnected)) => {
                info!("Daemon connected");
                app.mark_connected();
            }
            Ok(Some(Event::DaemonDisconnected)) => {
                warn!("Daemon disconnected");
                app.mark_disconnected();
            }
            Ok(None) => {
                warn!("Event channel closed");
                break;
            }
            Err(_) => {}
        }

        if app.should_quit || cancel_token.is_cancelled() {
            break;
        }
    }

    cancel_token.cancel();
    Ok(())
}

async fn cmd_dash(paths: &Paths) -> Result<()> {
    info!("Elementerm dashboard starting");

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();
    let cancel_token = CancellationToken::new();

    let mut terminal = match setup_terminal() {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "Failed to initialize terminal");
            return Err(e.into());
        }
    };

    let mut app = App::new();

    let daemon_client = DaemonClient::new(
        DaemonConfig::new(&paths.socket_path),
        event_tx.clone(),
        cancel_token.clone(),
    );
    let daemon_handle = tokio::spawn(async move {
        daemon_client.run().await;
    });

    let poller_handle = spawn_snapshot_poller(
        paths.state_file.clone(),
        DEFAULT_POLL_INTERVAL,
        event_tx.clone(),
        cancel_token.clone(),
    );

    let keyboard_handle = spawn_keyboard_task(event_tx, cancel_token.clone());

    let result = run_event_loop(&mut terminal, &mut app, paths, &mut event_rx, &cancel_token).await;

    cancel_token.cancel();

    let _ = tokio::time::timeout(Duration::from_millis(100), daemon_handle).await;
    let _ = tokio::time::timeout(Duration::from_millis(100), poller_handle).await;
    let _ = tokio::time::timeout(Duration::from_millis(100), keyboard_handle).await;

    if let Err(e) = cleanup_terminal(&mut terminal) {
        error!(error = %e, "Failed to cleanup terminal");
    }

    info!("Elementerm dashboard stopped");

    result
}

// ============================================================================
// Logging Setup
// ============================================================================

/// Dashboard logs go to `dash.log`; the terminal belongs to the UI.
fn init_dash_logging(paths: &Paths) {
    let log_path = paths.log_file("dash");
    let log_file = paths.ensure_dir().and_then(|()| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
    });

    match log_file {
        Ok(file) => {
            let filter = EnvFilter::from_default_env().add_directive(
                "elementerm_cli=info"
                    .parse()
                    .unwrap_or_else(|_| tracing_subscriber::filter::Directive::from(tracing::Level::INFO)),
            );

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        Err(e) => {
            eprintln!("Warning: Failed to open log file {}: {e}", log_path.display());
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new("off"))
                .init();
        }
    }
}

/// One-shot commands log warnings to stderr unless `RUST_LOG` says otherwise.
fn init_cli_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() {
    if let Err(e) = run(Args::parse()).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let paths = Paths::from_env().context("Failed to resolve the elementerm directory")?;

    if matches!(args.command, Command::Dash) {
        init_dash_logging(&paths);
    } else {
        init_cli_logging();
    }
    let config = Config::load(&paths.config_file)?;

    match args.command {
        Command::Start => cmd_start(&paths),
        Command::Stop => cmd_stop(&paths),
        Command::New {
            worktree,
            project,
            domain,
            branch,
            cwd,
        } => cmd_new(&paths, &config, worktree, project, domain, branch, cwd).await,
        Command::Rm { worktree, all: _ } => cmd_rm(&paths, &config, worktree).await,
        Command::Status => {
            println!("{}", status_report(&paths, Utc::now())?);
            Ok(())
        }
        Command::Dash => cmd_dash(&paths).await,
    }
}
