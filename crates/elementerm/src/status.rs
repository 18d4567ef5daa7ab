//! The `status` command: a plain-text summary read straight from the
//! snapshot file.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use elementerm_core::{read_snapshot, AppState, Paths, Session};

use crate::error::Result;

pub const DAEMON_NOT_RUNNING: &str = "Elementerm daemon is not running. Run 'elementerm start' first.";
pub const NO_SNAPSHOT: &str = "No sessions found.";
pub const NO_SESSIONS: &str = "No active sessions.";

/// Produces the full `status` output.
pub fn status_report(paths: &Paths, now: DateTime<Utc>) -> Result<String> {
    if !paths.pid_file.exists() {
        return Ok(DAEMON_NOT_RUNNING.to_string());
    }

    let Some(state) = read_snapshot(&paths.state_file)? else {
        return Ok(NO_SNAPSHOT.to_string());
    };

    if state.sessions.is_empty() {
        return Ok(NO_SESSIONS.to_string());
    }

    Ok(render_status(&state, now))
}

/// Renders sessions grouped by project.
pub fn render_status(state: &AppState, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n  Elementerm - {} session(s)\n", state.sessions.len());

    for (project, mut sessions) in state.sessions_by_project() {
        sessions.sort_by(|a, b| a.worktree.cmp(&b.worktree));
        let _ = writeln!(out, "  {project}");
        for session in sessions {
            let _ = writeln!(out, "    {}", session_line(session, now));
        }
        out.push('\n');
    }

    out
}

/// `icon worktree [DOMAIN] branch "last commit" age`
pub fn session_line(session: &Session, now: DateTime<Utc>) -> String {
    let domain = session
        .domain
        .map(|d| format!("[{d}]"))
        .unwrap_or_default();
    let commit = session
        .last_commit
        .as_ref()
        .map_or("-", |c| c.message.as_str());

    format!(
        "{} {:<12} {:<7} {:<20} \"{}\" {}",
        session.status.icon(),
        session.worktree,
        domain,
        session.branch,
        commit,
        time_since(session.last_activity, now)
    )
}

/// Compact age: `42s`, `5min`, `2h13min`.
pub fn time_since(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds().max(0);
    if seconds < 60 {
        return format!("{seconds}s");
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{minutes}min");
    }
    format!("{}h{}min", minutes / 60, minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use elementerm_core::{write_snapshot, CommitInfo, DaemonInfo, DomainTag, SessionId, SessionStatus};
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).single().unwrap()
    }

    fn session(id: &str, project: &str, worktree: &str) -> Session {
        Session::new(
            SessionId::new(id),
            project,
            worktree,
            format!("wt/{worktree}"),
            format!("/w/{project}/{worktree}"),
            now() - Duration::seconds(90),
        )
    }

    #[test]
    fn test_time_since_units() {
        assert_eq!(time_since(now() - Duration::seconds(42), now()), "42s");
        assert_eq!(time_since(now() - Duration::seconds(300), now()), "5min");
        assert_eq!(time_since(now() - Duration::minutes(133), now()), "2h13min");
        assert_eq!(time_since(now() + Duration::seconds(5), now()), "0s");
    }

    #[test]
    fn test_session_line_layout() {
        let mut s = session("s1", "myapp", "auth");
        s.set_status(SessionStatus::Flow);
        s.set_domain(Some(DomainTag::Back));
        s.set_last_commit(Some(CommitInfo {
            hash: "abc123".to_string(),
            message: "add login".to_string(),
            timestamp: now(),
        }));

        assert_eq!(
            session_line(&s, now()),
            format!("● {:<12} {:<7} {:<20} \"add login\" 1min", "auth", "[BACK]", "wt/auth")
        );
    }

    #[test]
    fn test_session_line_without_domain_or_commit() {
        let line = session_line(&session("s1", "myapp", "auth"), now());
        assert!(line.starts_with("○ auth"));
        assert!(line.contains("\"-\""));
    }

    #[test]
    fn test_render_groups_by_project() {
        let mut state = AppState::empty(DaemonInfo::default());
        state.insert_session(session("a", "web", "ui"));
        state.insert_session(session("b", "api", "auth"));
        state.insert_session(session("c", "api", "billing"));

        let out = render_status(&state, now());
        assert!(out.contains("Elementerm - 3 session(s)"));

        let api = out.find("  api\n").unwrap();
        let auth = out.find("auth").unwrap();
        let billing = out.find("billing").unwrap();
        let web = out.find("  web\n").unwrap();
        assert!(api < auth && auth < billing && billing < web);
    }

    #[test]
    fn test_report_messages() {
        let dir = TempDir::new().unwrap();
        let paths = Paths::under(dir.path());

        assert_eq!(status_report(&paths, now()).unwrap(), DAEMON_NOT_RUNNING);

        std::fs::write(&paths.pid_file, "1").unwrap();
        assert_eq!(status_report(&paths, now()).unwrap(), NO_SNAPSHOT);

        write_snapshot(&paths.state_file, &AppState::empty(DaemonInfo::default())).unwrap();
        assert_eq!(status_report(&paths, now()).unwrap(), NO_SESSIONS);

        let mut state = AppState::empty(DaemonInfo::default());
        state.insert_session(session("a", "web", "ui"));
        write_snapshot(&paths.state_file, &state).unwrap();
        assert!(status_report(&paths, now()).unwrap().contains("  web\n"));
    }
}
