//! Elementerm hook reporter
//!
//! Invoked by the agent tool for every configured hook with the hook JSON
//! on stdin. Forwards one `hook_event` record to the daemon.
//!
//! The process always exits 0 and never writes to stdout or stderr: the
//! agent must not notice whether a daemon is running.

use std::process::ExitCode;

use elementerm_cli::hook::report;
use elementerm_core::{Config, Paths};
use elementerm_protocol::HookEnv;

fn main() -> ExitCode {
    let Ok(runtime) = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    else {
        return ExitCode::SUCCESS;
    };

    if let Ok(paths) = Paths::from_env() {
        let deadline = Config::load(&paths.config_file)
            .unwrap_or_default()
            .hook_timeout();
        let env = HookEnv::from_env();

        let _ = runtime.block_on(report(&paths.socket_path, tokio::io::stdin(), &env, deadline));
    }

    // A blocked stdin read would otherwise hold the process open.
    runtime.shutdown_background();
    ExitCode::SUCCESS
}
