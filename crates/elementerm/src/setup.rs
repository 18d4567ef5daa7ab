//! Per-worktree hook installation for the agent tool.
//!
//! `elementerm new` writes `<worktree>/.claude/settings.json` so that every
//! `PostToolUse` and `Stop` event in that worktree runs `elementerm-hook`,
//! with the session id passed through the settings' `env` block.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use elementerm_core::SessionId;
use elementerm_protocol::HookEnv;
use serde_json::{json, Map, Value};

/// Name of the hook reporter binary.
pub const HOOK_BINARY: &str = "elementerm-hook";

/// Hook types the reporter is registered for.
pub const HOOK_TYPES: &[&str] = &["PostToolUse", "Stop"];

/// Path of `.claude/settings.json` under `worktree`.
pub fn settings_path(worktree: &Path) -> PathBuf {
    worktree.join(".claude").join("settings.json")
}

/// Command line the agent tool runs for each hook.
///
/// Prefers the reporter installed next to the running executable.
pub fn hook_command() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.join(HOOK_BINARY)))
        .filter(|p| p.exists())
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_else(|| HOOK_BINARY.to_string())
}

/// Reads settings, returns an empty object if the file doesn't exist.
fn read_settings(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Ok(json!({}));
    }

    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;

    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn write_settings(path: &Path, settings: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let content = serde_json::to_string_pretty(settings)?;
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

fn create_hook_entry(command: &str) -> Value {
    json!({
        "matcher": "",
        "hooks": [{
            "type": "command",
            "command": command
        }]
    })
}

/// True if an entry runs the elementerm reporter.
fn is_elementerm_entry(entry: &Value) -> bool {
    entry
        .get("hooks")
        .and_then(Value::as_array)
        .is_some_and(|hooks| {
            hooks.iter().any(|hook| {
                hook.get("command")
                    .and_then(Value::as_str)
                    .is_some_and(|cmd| cmd.contains(HOOK_BINARY))
            })
        })
}

/// Merges the reporter hooks and the session id into `settings`.
///
/// Unrelated settings and hooks are kept. An earlier elementerm entry is
/// replaced, never duplicated.
pub fn merge_hook_settings(settings: &mut Value, session_id: &SessionId, command: &str) -> Result<()> {
    if !settings.is_object() {
        *settings = json!({});
    }
    let root = settings.as_object_mut().context("settings is not an object")?;

    let hooks = object_entry(root, "hooks")?;
    for &hook_type in HOOK_TYPES {
        let entries = hooks
            .entry(hook_type)
            .or_insert_with(|| json!([]));
        if !entries.is_array() {
            *entries = json!([]);
        }
        let entries = entries.as_array_mut().context("hook type is not an array")?;
        entries.retain(|entry| !is_elementerm_entry(entry));
        entries.push(create_hook_entry(command));
    }

    let env = object_entry(root, "env")?;
    env.insert(HookEnv::SESSION_ID_VAR.to_string(), json!(session_id.as_str()));

    Ok(())
}

/// The object at `key`, replacing a non-object value.
fn object_entry<'a>(root: &'a mut Map<String, Value>, key: &str) -> Result<&'a mut Map<String, Value>> {
    let value = root.entry(key).or_insert_with(|| json!({}));
    if !value.is_object() {
        *value = json!({});
    }
    value
        .as_object_mut()
        .with_context(|| format!("{key} is not an object"))
}

/// Installs the reporter hooks for `session_id` in `worktree`.
///
/// Returns the settings file path.
pub fn install_hooks(worktree: &Path, session_id: &SessionId, command: &str) -> Result<PathBuf> {
    let path = settings_path(worktree);
    let mut settings = read_settings(&path)?;
    merge_hook_settings(&mut settings, session_id, command)?;
    write_settings(&path, &settings)?;
    Ok(path)
}
