//! Optional `config.toml` settings.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Tunables read from `config.toml`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Seconds between reconciliation sweeps of the snapshot file; 0 disables.
    pub reconcile_interval_secs: u64,

    /// Deadline for CLI registration/removal round-trips.
    pub ipc_timeout_ms: u64,

    /// Hard deadline of the hook reporter.
    pub hook_timeout_ms: u64,

    /// Outbound queue depth per connected client.
    pub client_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reconcile_interval_secs: 30,
            ipc_timeout_ms: 2000,
            hook_timeout_ms: 1000,
            client_buffer: 64,
        }
    }
}

impl Config {
    /// Loads `path`, or defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn reconcile_interval(&self) -> Option<Duration> {
        (self.reconcile_interval_secs > 0).then(|| Duration::from_secs(self.reconcile_interval_secs))
    }

    pub fn ipc_timeout(&self) -> Duration {
        Duration::from_millis(self.ipc_timeout_ms)
    }

    pub fn hook_timeout(&self) -> Duration {
        Duration::from_millis(self.hook_timeout_ms)
    }
}
