//! Hook events reported by the agent tool.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::session::SessionId;

/// Kind of lifecycle signal carried by a hook event.
///
/// Only three kinds drive the state machine. Anything else is kept verbatim
/// in `Other` so it survives a round trip and is ignored by the router.
/// `Other` can only be built through [`HookEventKind::from_event_name`], so
/// it never holds one of the three recognized names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HookEventKind {
    /// A tool call completed.
    PostToolUse,
    /// The agent finished its turn.
    Stop,
    /// The agent session ended.
    SessionEnd,
    Other(UnrecognizedEvent),
}

/// Name of a hook event outside the recognized set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnrecognizedEvent(String);

impl UnrecognizedEvent {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl HookEventKind {
    /// Parses from a hook event name string.
    pub fn from_event_name(name: &str) -> Self {
        match name {
            "PostToolUse" => Self::PostToolUse,
            "Stop" => Self::Stop,
            "SessionEnd" => Self::SessionEnd,
            other => Self::Other(UnrecognizedEvent(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::PostToolUse => "PostToolUse",
            Self::Stop => "Stop",
            Self::SessionEnd => "SessionEnd",
            Self::Other(name) => name.as_str(),
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl Default for HookEventKind {
    fn default() -> Self {
        Self::PostToolUse
    }
}

impl From<String> for HookEventKind {
    fn from(name: String) -> Self {
        Self::from_event_name(&name)
    }
}

impl From<HookEventKind> for String {
    fn from(kind: HookEventKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for HookEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One hook notification as sent over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookEvent {
    pub session_id: SessionId,
    pub event: HookEventKind,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    /// Unix time in milliseconds.
    pub timestamp: i64,
}

impl HookEvent {
    pub fn new(session_id: impl Into<SessionId>, event: HookEventKind, timestamp: i64) -> Self {
        Self {
            session_id: session_id.into(),
            event,
            tool: None,
            file_path: None,
            timestamp,
        }
    }

    #[must_use]
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    #[must_use]
    pub fn with_file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }
}
