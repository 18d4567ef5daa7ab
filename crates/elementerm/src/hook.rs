//! Hook reporter: turns one agent-tool hook invocation into one
//! `hook_event` record on the daemon socket.
//!
//! The reporter runs inside the agent's hook pipeline, so it must never
//! slow the agent down or disturb it: everything happens under a single
//! deadline and every failure is swallowed by the caller.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use elementerm_core::HookEvent;
use elementerm_protocol::{HookEnv, IpcMessage, RawHookInput, MAX_LINE_BYTES};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;

use crate::client::send_message;
use crate::error::{CliError, Result};

/// Reads hook JSON from `input` and builds the event.
pub async fn read_event<R>(input: R, env: &HookEnv) -> HookEvent
where
    R: AsyncRead + Unpin,
{
    let mut raw = String::new();
    // Non-UTF-8 input is treated like missing input.
    if input.take(MAX_LINE_BYTES as u64).read_to_string(&mut raw).await.is_err() {
        raw.clear();
    }

    let parsed = RawHookInput::parse_lenient(&raw);
    parsed.into_event(env, Utc::now().timestamp_millis())
}

/// Reads the hook input and delivers it, all within `deadline`.
pub async fn report<R>(socket_path: &Path, input: R, env: &HookEnv, deadline: Duration) -> Result<HookEvent>
where
    R: AsyncRead + Unpin,
{
    let work = async {
        let event = read_event(input, env).await;
        send_message(socket_path, &IpcMessage::HookEvent(event.clone()), deadline).await?;
        Ok::<HookEvent, CliError>(event)
    };

    timeout(deadline, work)
        .await
        .map_err(|_| CliError::Timeout { after: deadline })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use elementerm_core::HookEventKind;

    fn env(session: &str) -> HookEnv {
        HookEnv {
            session_id: Some(session.to_string()),
            event: None,
        }
    }

    #[tokio::test]
    async fn test_read_event_from_stdin_json() {
        let input: &[u8] = br#"{"hook_event_name":"PostToolUse","tool_name":"Edit","tool_input":{"file_path":"src/main.rs"}}"#;
        let event = read_event(input, &env("s1")).await;

        assert_eq!(event.session_id.as_str(), "s1");
        assert_eq!(event.event, HookEventKind::PostToolUse);
        assert_eq!(event.file_path.as_deref(), Some("src/main.rs"));
        assert!(event.timestamp > 0);
    }

    #[tokio::test]
    async fn test_read_event_with_invalid_utf8() {
        let input: &[u8] = &[0xff, 0xfe, 0x00];
        let event = read_event(input, &env("s1")).await;
        assert_eq!(event.event, HookEventKind::PostToolUse);
        assert!(event.file_path.is_none());
    }

    #[tokio::test]
    async fn test_report_without_daemon_fails_fast() {
        let dir = tempfile::TempDir::new().unwrap();
        let start = std::time::Instant::now();

        let result = report(
            &dir.path().join("missing.sock"),
            &b"{}"[..],
            &env("s1"),
            Duration::from_secs(1),
        )
        .await;

        assert!(result.unwrap_err().is_unreachable());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_report_stalled_stdin_hits_deadline() {
        let (_writer, reader) = tokio::io::duplex(64);
        let dir = tempfile::TempDir::new().unwrap();

        let result = report(
            &dir.path().join("missing.sock"),
            reader,
            &env("s1"),
            Duration::from_millis(50),
        )
        .await;

        assert!(matches!(result, Err(CliError::Timeout { .. })));
    }
}
