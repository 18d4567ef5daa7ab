//! Process liveness probe used for the daemon's pid file.

/// Returns true if a process with `pid` currently exists.
///
/// Pid 0 is never considered alive.
pub fn is_process_alive(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }

    #[cfg(unix)]
    {
        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };
        // Signal 0 performs the existence and permission checks only.
        let result = unsafe { libc::kill(raw, 0) };
        if result == 0 {
            return true;
        }
        // EPERM: the process exists but belongs to someone else.
        std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }

    #[cfg(not(unix))]
    {
        use sysinfo::{Pid, System};

        let mut system = System::new();
        system.refresh_all();
        system.process(Pid::from_u32(pid)).is_some()
    }
}
