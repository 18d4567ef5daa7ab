//! IPC records exchanged over the daemon socket.
//!
//! Every record is one JSON object on its own line:
//!
//! ```text
//! {"type":"hook_event","payload":{"sessionId":"…","event":"PostToolUse",…}}\n
//! ```
//!
//! The set of types is closed. A record with an unknown `type` still decodes,
//! into [`IpcMessage::Unrecognized`], so newer senders never break an older
//! daemon.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use elementerm_core::{AppState, HookEvent, Session, SessionId};

use crate::ProtocolError;

// ============================================================================
// Message Types
// ============================================================================

/// Wire names of the recognized record types.
pub mod kind {
    pub const STATE_UPDATE: &str = "state_update";
    pub const SESSION_CREATED: &str = "session_created";
    pub const SESSION_REMOVED: &str = "session_removed";
    pub const HOOK_EVENT: &str = "hook_event";
    pub const DAEMON_SHUTDOWN: &str = "daemon_shutdown";
}

/// Minimal reference to a removed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRef {
    pub id: SessionId,
    #[serde(default)]
    pub worktree: String,
    #[serde(default)]
    pub project: String,
}

impl From<&Session> for SessionRef {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            worktree: session.worktree.clone(),
            project: session.project.clone(),
        }
    }
}

/// One framed IPC record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpcMessage {
    /// Daemon → clients: the full application state.
    StateUpdate(Box<AppState>),

    /// CLI → daemon: register a fully-formed session.
    SessionCreated(Box<Session>),

    /// CLI → daemon: a session was removed from the snapshot file.
    SessionRemoved(SessionRef),

    /// Hook reporter → daemon.
    HookEvent(HookEvent),

    /// Reserved; no sender emits it yet.
    DaemonShutdown,

    /// Any record whose `type` is not one of the above.
    Unrecognized { kind: String },
}

impl IpcMessage {
    pub fn state_update(state: AppState) -> Self {
        Self::StateUpdate(Box::new(state))
    }

    pub fn session_created(session: Session) -> Self {
        Self::SessionCreated(Box::new(session))
    }

    pub fn session_removed(session: impl Into<SessionRef>) -> Self {
        Self::SessionRemoved(session.into())
    }

    /// The wire `type` tag.
    pub fn kind(&self) -> &str {
        match self {
            Self::StateUpdate(_) => kind::STATE_UPDATE,
            Self::SessionCreated(_) => kind::SESSION_CREATED,
            Self::SessionRemoved(_) => kind::SESSION_REMOVED,
            Self::HookEvent(_) => kind::HOOK_EVENT,
            Self::DaemonShutdown => kind::DAEMON_SHUTDOWN,
            Self::Unrecognized { kind } => kind,
        }
    }

    /// Serializes to one line, newline included.
    pub fn encode_line(&self) -> Result<String, ProtocolError> {
        let mut line = serde_json::to_string(self).map_err(ProtocolError::Encode)?;
        line.push('\n');
        Ok(line)
    }

    /// Parses one line. Blank lines yield `Ok(None)`.
    pub fn decode_line(line: &str) -> Result<Option<Self>, ProtocolError> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        serde_json::from_str(trimmed)
            .map(Some)
            .map_err(ProtocolError::Decode)
    }
}

// ============================================================================
// Envelope (de)serialization
// ============================================================================

#[derive(Serialize)]
struct EnvelopeRef<'a, T: Serialize> {
    #[serde(rename = "type")]
    kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<&'a T>,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

impl Serialize for IpcMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        fn envelope<'a, T: Serialize>(kind: &'a str, payload: Option<&'a T>) -> EnvelopeRef<'a, T> {
            EnvelopeRef { kind, payload }
        }

        match self {
            Self::StateUpdate(state) => envelope(self.kind(), Some(state.as_ref())).serialize(serializer),
            Self::SessionCreated(session) => {
                envelope(self.kind(), Some(session.as_ref())).serialize(serializer)
            }
            Self::SessionRemoved(session) => envelope(self.kind(), Some(session)).serialize(serializer),
            Self::HookEvent(event) => envelope(self.kind(), Some(event)).serialize(serializer),
            Self::DaemonShutdown | Self::Unrecognized { .. } => {
                envelope::<Value>(self.kind(), None).serialize(serializer)
            }
        }
    }
}

impl<'de> Deserialize<'de> for IpcMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let Envelope { kind, payload } = Envelope::deserialize(deserializer)?;

        let message = match kind.as_str() {
            kind::STATE_UPDATE => {
                Self::StateUpdate(Box::new(serde_json::from_value(payload).map_err(D::Error::custom)?))
            }
            kind::SESSION_CREATED => {
                Self::SessionCreated(Box::new(serde_json::from_value(payload).map_err(D::Error::custom)?))
            }
            kind::SESSION_REMOVED => {
                Self::SessionRemoved(serde_json::from_value(payload).map_err(D::Error::custom)?)
            }
            kind::HOOK_EVENT => Self::HookEvent(serde_json::from_value(payload).map_err(D::Error::custom)?),
            kind::DAEMON_SHUTDOWN => Self::DaemonShutdown,
            _ => Self::Unrecognized { kind },
        };

        Ok(message)
    }
}
