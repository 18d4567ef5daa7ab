//! Filesystem layout shared by the daemon, the CLI and the hook reporter.
//!
//! Everything lives under one user-scoped directory, `~/.elementerm` by
//! default. `ELEMENTERM_DIR` moves the whole directory (tests rely on this),
//! `ELEMENTERM_SOCKET` moves only the socket.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Environment variable overriding the base directory.
pub const DIR_ENV: &str = "ELEMENTERM_DIR";

/// Environment variable overriding the socket path.
pub const SOCKET_ENV: &str = "ELEMENTERM_SOCKET";

const DIR_NAME: &str = ".elementerm";
const STATE_FILE: &str = "state.json";
const PID_FILE: &str = "daemon.pid";
const SOCKET_FILE: &str = "elementerm.sock";
const CONFIG_FILE: &str = "config.toml";

/// Resolved paths of every on-disk artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub dir: PathBuf,
    pub state_file: PathBuf,
    pub pid_file: PathBuf,
    pub socket_path: PathBuf,
    pub config_file: PathBuf,
}

impl Paths {
    /// Lays out all artifacts under `dir`.
    pub fn under(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            state_file: dir.join(STATE_FILE),
            pid_file: dir.join(PID_FILE),
            socket_path: dir.join(SOCKET_FILE),
            config_file: dir.join(CONFIG_FILE),
            dir,
        }
    }

    /// Resolves paths from the environment, falling back to `~/.elementerm`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut paths = match std::env::var_os(DIR_ENV) {
            Some(dir) if !dir.is_empty() => Self::under(PathBuf::from(dir)),
            _ => {
                let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
                Self::under(home.join(DIR_NAME))
            }
        };

        if let Some(socket) = std::env::var_os(SOCKET_ENV).filter(|s| !s.is_empty()) {
            paths.socket_path = PathBuf::from(socket);
        }

        Ok(paths)
    }

    /// Sidecar path a corrupt snapshot is copied to.
    pub fn backup_file(&self) -> PathBuf {
        backup_path(&self.state_file)
    }

    pub fn log_file(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.log"))
    }

    /// Creates the base directory (mode 0700 on Unix).
    pub fn ensure_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.dir, std::fs::Permissions::from_mode(0o700))?;
        }

        Ok(())
    }
}

/// `<file>.bak` next to `path`.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}
