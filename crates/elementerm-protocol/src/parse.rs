//! Parsing the JSON the agent tool pipes into hook commands.
//!
//! Only the handful of fields the reporter needs are modelled; everything else
//! in the document is ignored. Every field is optional because the document
//! varies by hook type and may be missing entirely.

use elementerm_core::{HookEvent, HookEventKind, SessionId};
use serde::Deserialize;

/// Session id used when the hook environment carries none.
pub const UNKNOWN_SESSION: &str = "unknown";

/// Raw hook input from the agent tool's stdin.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawHookInput {
    #[serde(default)]
    pub hook_event_name: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,

    // === Tool Events ===
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Option<RawToolInput>,

    /// Some hook types put the path at the top level.
    #[serde(default)]
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawToolInput {
    #[serde(default)]
    pub file_path: Option<String>,
}

/// Values the reporter reads from its environment.
#[derive(Debug, Clone, Default)]
pub struct HookEnv {
    /// `ELEMENTERM_SESSION_ID`
    pub session_id: Option<String>,
    /// `ELEMENTERM_EVENT`
    pub event: Option<String>,
}

impl HookEnv {
    pub const SESSION_ID_VAR: &'static str = "ELEMENTERM_SESSION_ID";
    pub const EVENT_VAR: &'static str = "ELEMENTERM_EVENT";

    pub fn from_env() -> Self {
        let non_empty = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            session_id: non_empty(Self::SESSION_ID_VAR),
            event: non_empty(Self::EVENT_VAR),
        }
    }
}

impl RawHookInput {
    /// Lenient parse: anything that is not a JSON object yields empty input.
    pub fn parse_lenient(text: &str) -> Self {
        serde_json::from_str(text).unwrap_or_default()
    }

    /// The modified file path: `tool_input.file_path`, else `file_path`.
    pub fn modified_file(&self) -> Option<&str> {
        self.tool_input
            .as_ref()
            .and_then(|input| input.file_path.as_deref())
            .or(self.file_path.as_deref())
            .filter(|p| !p.is_empty())
    }

    /// Builds the wire event.
    ///
    /// The event kind comes from the input, else the environment, else
    /// `PostToolUse`.
    pub fn into_event(self, env: &HookEnv, timestamp_ms: i64) -> HookEvent {
        let session_id = env
            .session_id
            .clone()
            .unwrap_or_else(|| UNKNOWN_SESSION.to_string());

        let kind = self
            .hook_event_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(env.event.as_deref())
            .map(HookEventKind::from_event_name)
            .unwrap_or_default();

        HookEvent {
            session_id: SessionId::new(session_id),
            event: kind,
            file_path: self.modified_file().map(str::to_string),
            tool: self.tool_name,
            timestamp: timestamp_ms,
        }
    }
}
