//! Command-line arguments for a stream-json CLI session.

use super::builder::ClientConfig;
use super::options::PermissionMode;

/// Build the argument list in CLI order.
///
/// Output and input formats are fixed; everything in between is emitted only
/// when configured. Empty tool lists produce no flag.
pub(crate) fn build_args(config: &ClientConfig) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "--output-format".into(),
        "stream-json".into(),
        "--verbose".into(),
    ];

    let mut push = |flag: &str, value: Option<String>| {
        args.push(flag.to_string());
        if let Some(value) = value {
            args.push(value);
        }
    };

    if let Some(ref prompt) = config.system_prompt {
        push("--system-prompt", Some(prompt.clone()));
    }
    if let Some(ref prompt) = config.append_system_prompt {
        push("--append-system-prompt", Some(prompt.clone()));
    }
    if !config.allowed_tools.is_empty() {
        push("--allowedTools", Some(config.allowed_tools.join(",")));
    }
    if !config.disallowed_tools.is_empty() {
        push("--disallowedTools", Some(config.disallowed_tools.join(",")));
    }
    if let Some(turns) = config.max_turns {
        push("--max-turns", Some(turns.to_string()));
    }
    if let Some(ref model) = config.model {
        push("--model", Some(model.to_string()));
    }
    if let Some(ref tool) = config.permission_prompt_tool {
        push("--permission-prompt-tool", Some(tool.clone()));
    }
    if config.permission_mode != PermissionMode::Default {
        push("--permission-mode", Some(config.permission_mode.to_string()));
    }
    if config.continue_conversation {
        push("--continue", None);
    }
    if let Some(ref id) = config.resume {
        push("--resume", Some(id.to_string()));
    }
    if let Some(ref path) = config.settings {
        push("--settings", Some(path.display().to_string()));
    }
    for dir in &config.add_dirs {
        push("--add-dir", Some(dir.display().to_string()));
    }
    for (key, value) in &config.extra_args {
        push(&format!("--{}", key.trim_start_matches('-')), value.clone());
    }

    args.push("--input-format".into());
    args.push("stream-json".into());
    args
}

#[cfg(test)]
mod tests {
    use crate::config::{ClientConfig, Model, PermissionMode};

    #[test]
    fn minimal_args() {
        let config = ClientConfig::builder().build().unwrap();
        assert_eq!(
            config.cli_args(),
            [
                "--output-format",
                "stream-json",
                "--verbose",
                "--input-format",
                "stream-json"
            ]
        );
    }

    #[test]
    fn all_options_in_order() {
        let config = ClientConfig::builder()
            .system_prompt("be terse")
            .append_system_prompt("and kind")
            .allowed_tools(["Read", "Glob"])
            .disallowed_tools(["Bash"])
            .max_turns(3)
            .model(Model::Haiku)
            .permission_prompt_tool("mcp__perm")
            .permission_mode(PermissionMode::AcceptEdits)
            .continue_conversation(true)
            .resume("sess-1")
            .settings("/etc/claude.json")
            .add_dir("/srv/a")
            .add_dir("/srv/b")
            .extra_arg("debug-to-stderr", None)
            .extra_arg("--mcp-config", Some("mcp.json".into()))
            .build()
            .unwrap();

        let expected = [
            "--output-format",
            "stream-json",
            "--verbose",
            "--system-prompt",
            "be terse",
            "--append-system-prompt",
            "and kind",
            "--allowedTools",
            "Read,Glob",
            "--disallowedTools",
            "Bash",
            "--max-turns",
            "3",
            "--model",
            "haiku",
            "--permission-prompt-tool",
            "mcp__perm",
            "--permission-mode",
            "acceptEdits",
            "--continue",
            "--resume",
            "sess-1",
            "--settings",
            "/etc/claude.json",
            "--add-dir",
            "/srv/a",
            "--add-dir",
            "/srv/b",
            "--debug-to-stderr",
            "--mcp-config",
            "mcp.json",
            "--input-format",
            "stream-json",
        ];
        assert_eq!(config.cli_args(), expected);
    }

    #[test]
    fn default_permission_mode_is_omitted() {
        let config = ClientConfig::builder()
            .permission_mode(PermissionMode::Default)
            .build()
            .unwrap();
        assert!(!config.cli_args().iter().any(|a| a == "--permission-mode"));
    }
}
