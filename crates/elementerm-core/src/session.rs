//! Session domain entities and value objects.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// Unique identifier for a tracked session.
///
/// Generated once by whoever registers the session (a v4 UUID in practice)
/// and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a new SessionId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a shortened display form (first 8 characters).
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Status
// ============================================================================

/// Coarse activity status of a session.
///
/// `Idle` is the initial state. `Flow`, `Ready` and `Idle` are driven by hook
/// events (see [`crate::machine`]); `Waiting`, `Attention` and `Blocked` are
/// only ever set through explicit field updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    Waiting,
    Flow,
    Ready,
    Attention,
    Blocked,
}

impl SessionStatus {
    pub const ALL: [SessionStatus; 6] = [
        Self::Idle,
        Self::Waiting,
        Self::Flow,
        Self::Ready,
        Self::Attention,
        Self::Blocked,
    ];

    /// Single-glyph icon for compact display.
    pub fn icon(&self) -> &'static str {
        match self {
            Self::Flow => "●",
            Self::Waiting => "◐",
            Self::Ready => "◉",
            Self::Attention => "◈",
            Self::Blocked => "✖",
            Self::Idle => "○",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Waiting => "waiting",
            Self::Flow => "flow",
            Self::Ready => "ready",
            Self::Attention => "attention",
            Self::Blocked => "blocked",
        }
    }

    /// Returns true if the session wants a human to look at it.
    pub fn needs_attention(&self) -> bool {
        matches!(self, Self::Ready | Self::Attention | Self::Blocked)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SessionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::InvalidFieldValue {
                field: "status".to_string(),
                value: s.to_string(),
                expected: Self::ALL
                    .iter()
                    .map(SessionStatus::label)
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

// ============================================================================
// Domain Tag
// ============================================================================

/// Area of work a session is dedicated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DomainTag {
    Back,
    Front,
    Seo,
    Sec,
    Test,
    Infra,
    Doc,
}

impl DomainTag {
    pub const ALL: [DomainTag; 7] = [
        Self::Back,
        Self::Front,
        Self::Seo,
        Self::Sec,
        Self::Test,
        Self::Infra,
        Self::Doc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Back => "BACK",
            Self::Front => "FRONT",
            Self::Seo => "SEO",
            Self::Sec => "SEC",
            Self::Test => "TEST",
            Self::Infra => "INFRA",
            Self::Doc => "DOC",
        }
    }

    /// Comma-separated list of accepted values, for error messages.
    pub fn valid_values() -> String {
        Self::ALL
            .iter()
            .map(DomainTag::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for DomainTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DomainTag {
    type Err = DomainError;

    /// Case-insensitive: `back`, `Back` and `BACK` are all accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::InvalidFieldValue {
                field: "domain".to_string(),
                value: s.to_string(),
                expected: Self::valid_values(),
            })
    }
}

// ============================================================================
// Commit Summary
// ============================================================================

/// Summary of the most recent commit made in a session's worktree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub hash: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Session
// ============================================================================

/// One tracked coding-agent working copy, bound to a single worktree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub project: String,
    pub worktree: String,
    pub branch: String,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub domain: Option<DomainTag>,
    #[serde(default)]
    pub last_commit: Option<CommitInfo>,
    pub last_activity: DateTime<Utc>,
    #[serde(default)]
    pub files_modified: BTreeSet<String>,
    #[serde(default)]
    pub terminal_pid: Option<u32>,
    #[serde(default)]
    pub claude_session_id: Option<String>,
    pub cwd: String,
}

impl Session {
    /// Creates an idle session with no recorded activity beyond `now`.
    pub fn new(
        id: SessionId,
        project: impl Into<String>,
        worktree: impl Into<String>,
        branch: impl Into<String>,
        cwd: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            project: project.into(),
            worktree: worktree.into(),
            branch: branch.into(),
            status: SessionStatus::Idle,
            domain: None,
            last_commit: None,
            last_activity: now,
            files_modified: BTreeSet::new(),
            terminal_pid: None,
            claude_session_id: None,
            cwd: cwd.into(),
        }
    }

    /// Builder-style domain setter used at registration time.
    #[must_use]
    pub fn with_domain(mut self, domain: Option<DomainTag>) -> Self {
        self.domain = domain;
        self
    }

    /// Directory the session's project lives in: the parent of its worktree.
    pub fn project_path(&self) -> String {
        Path::new(&self.cwd)
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.cwd.clone())
    }

    // ------------------------------------------------------------------------
    // Typed setters
    // ------------------------------------------------------------------------

    pub fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
    }

    pub fn set_branch(&mut self, branch: impl Into<String>) {
        self.branch = branch.into();
    }

    pub fn set_domain(&mut self, domain: Option<DomainTag>) {
        self.domain = domain;
    }

    pub fn set_last_commit(&mut self, commit: Option<CommitInfo>) {
        self.last_commit = commit;
    }

    pub fn set_terminal_pid(&mut self, pid: Option<u32>) {
        self.terminal_pid = pid;
    }

    pub fn set_claude_session_id(&mut self, id: Option<String>) {
        self.claude_session_id = id;
    }

    /// Records a modified file. Returns false if it was already tracked.
    pub fn add_modified_file(&mut self, path: impl Into<String>) -> bool {
        self.files_modified.insert(path.into())
    }

    /// Applies one enumerated field update.
    pub fn apply(&mut self, update: SessionUpdate) {
        match update {
            SessionUpdate::Status(status) => self.set_status(status),
            SessionUpdate::Branch(branch) => self.set_branch(branch),
            SessionUpdate::Domain(domain) => self.set_domain(domain),
            SessionUpdate::LastCommit(commit) => self.set_last_commit(commit),
            SessionUpdate::TerminalPid(pid) => self.set_terminal_pid(pid),
            SessionUpdate::ClaudeSessionId(id) => self.set_claude_session_id(id),
            SessionUpdate::FileModified(path) => {
                self.add_modified_file(path);
            }
        }
    }

    /// Stamps `last_activity`, never moving it backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_activity {
            self.last_activity = now;
        }
    }
}

/// The closed set of fields that may change after a session is registered.
///
/// `id`, `project`, `worktree` and `cwd` are fixed for the session's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    Status(SessionStatus),
    Branch(String),
    Domain(Option<DomainTag>),
    LastCommit(Option<CommitInfo>),
    TerminalPid(Option<u32>),
    ClaudeSessionId(Option<String>),
    /// Adds one path to the modified-file set.
    FileModified(String),
}
