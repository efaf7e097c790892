//! Typed values for CLI options.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Model passed to `--model`. `Custom` carries any full model name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Model {
    Sonnet,
    Opus,
    Haiku,
    #[serde(untagged)]
    Custom(String),
}

impl Model {
    /// The value given to the CLI.
    pub fn as_str(&self) -> &str {
        match self {
            Model::Sonnet => "sonnet",
            Model::Opus => "opus",
            Model::Haiku => "haiku",
            Model::Custom(name) => name,
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Model {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "sonnet" => Model::Sonnet,
            "opus" => Model::Opus,
            "haiku" => Model::Haiku,
            _ => Model::Custom(s.to_string()),
        }
    }
}

impl From<String> for Model {
    fn from(s: String) -> Self {
        Model::from(s.as_str())
    }
}

/// Permission modes for CLI tool execution (`--permission-mode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    /// Ask before potentially dangerous operations. Not passed on the command line.
    #[default]
    Default,
    /// Read-only planning, no tool execution.
    Plan,
    /// Auto-approve file edits, ask for other tools.
    AcceptEdits,
    /// Auto-approve all tool calls.
    BypassPermissions,
}

impl PermissionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PermissionMode::Default => "default",
            PermissionMode::Plan => "plan",
            PermissionMode::AcceptEdits => "acceptEdits",
            PermissionMode::BypassPermissions => "bypassPermissions",
        }
    }
}

impl fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            PermissionMode::Default,
            PermissionMode::Plan,
            PermissionMode::AcceptEdits,
            PermissionMode::BypassPermissions,
        ]
        .into_iter()
        .find(|mode| mode.as_str().eq_ignore_ascii_case(s))
        .ok_or_else(|| Error::InvalidConfig(format!("unknown permission mode: {s}")))
    }
}

/// Opaque conversation identifier, as reported by the CLI and accepted by
/// `--resume`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        SessionId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        SessionId(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        SessionId(s.to_string())
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Names of built-in CLI tools, for `allowed_tools` / `disallowed_tools`.
///
/// MCP servers add tools at runtime, so these are plain strings.
pub mod tools {
    pub const READ: &str = "Read";
    pub const WRITE: &str = "Write";
    pub const EDIT: &str = "Edit";
    pub const MULTI_EDIT: &str = "MultiEdit";
    pub const BASH: &str = "Bash";
    pub const GLOB: &str = "Glob";
    pub const GREP: &str = "Grep";
    pub const LS: &str = "LS";
    pub const TASK: &str = "Task";
    pub const WEB_FETCH: &str = "WebFetch";
    pub const WEB_SEARCH: &str = "WebSearch";
    pub const TODO_WRITE: &str = "TodoWrite";
    pub const NOTEBOOK_EDIT: &str = "NotebookEdit";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_names() {
        assert_eq!(Model::Opus.to_string(), "opus");
        assert_eq!(Model::from("HAIKU"), Model::Haiku);
        assert_eq!(
            Model::from("claude-sonnet-4-5"),
            Model::Custom("claude-sonnet-4-5".into())
        );
        assert_eq!(Model::Custom("x-1".into()).as_str(), "x-1");
    }

    #[test]
    fn model_serde() {
        assert_eq!(serde_json::to_string(&Model::Sonnet).unwrap(), "\"sonnet\"");
        let parsed: Model = serde_json::from_str("\"claude-opus-4-1\"").unwrap();
        assert_eq!(parsed, Model::Custom("claude-opus-4-1".into()));
    }

    #[test]
    fn permission_mode_round_trip() {
        for mode in [
            PermissionMode::Default,
            PermissionMode::Plan,
            PermissionMode::AcceptEdits,
            PermissionMode::BypassPermissions,
        ] {
            assert_eq!(mode.to_string().parse::<PermissionMode>().unwrap(), mode);
        }
        assert_eq!(
            "bypasspermissions".parse::<PermissionMode>().unwrap(),
            PermissionMode::BypassPermissions
        );
        assert!(matches!(
            "yolo".parse::<PermissionMode>(),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn session_id_is_transparent() {
        let id = SessionId::from("abc-123");
        assert_eq!(id.as_str(), "abc-123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc-123\"");
    }

    #[test]
    fn types_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Model>();
        assert_send_sync::<PermissionMode>();
        assert_send_sync::<SessionId>();
    }
}
