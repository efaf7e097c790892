//! Client configuration and builder.
//!
//! # Example
//!
//! ```ignore
//! use claude_subprocess::config::{ClientConfig, Model, PermissionMode};
//!
//! let config = ClientConfig::builder()
//!     .model(Model::Opus)
//!     .permission_mode(PermissionMode::AcceptEdits)
//!     .system_prompt("You are a helpful assistant.")
//!     .max_turns(4)
//!     .build()?;
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use super::args;
use super::auth::{resolve_auth, AuthMethod, ResolvedAuth};
use super::options::{Model, PermissionMode, SessionId};
use crate::process::LaunchSpec;
use crate::{Error, Result};

/// Marks the subprocess as driven by this library.
pub const ENV_ENTRYPOINT: &str = "CLAUDE_CODE_ENTRYPOINT";
/// Value of [`ENV_ENTRYPOINT`].
pub const ENTRYPOINT: &str = "sdk-rust";
/// API endpoint override.
pub const ENV_BASE_URL: &str = "ANTHROPIC_BASE_URL";

const DEFAULT_CLI: &str = "claude";

/// Configuration for the Claude CLI client.
///
/// Use [`ClientConfig::builder()`] to create a new configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // Authentication
    pub(crate) resolved_auth: ResolvedAuth,

    // Model and permissions
    pub(crate) model: Option<Model>,
    pub(crate) permission_mode: PermissionMode,
    pub(crate) permission_prompt_tool: Option<String>,

    // System prompts
    pub(crate) system_prompt: Option<String>,
    pub(crate) append_system_prompt: Option<String>,

    // Tools and limits
    pub(crate) allowed_tools: Vec<String>,
    pub(crate) disallowed_tools: Vec<String>,
    pub(crate) max_turns: Option<u32>,

    // Conversation
    pub(crate) continue_conversation: bool,
    pub(crate) resume: Option<SessionId>,
    pub(crate) settings: Option<PathBuf>,
    pub(crate) add_dirs: Vec<PathBuf>,
    pub(crate) extra_args: Vec<(String, Option<String>)>,

    // Process options
    pub(crate) cli_path: Option<PathBuf>,
    pub(crate) working_directory: Option<PathBuf>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) env_vars: BTreeMap<String, Option<String>>,
    pub(crate) inherit_env: bool,
    pub(crate) base_url: Option<String>,
    pub(crate) version_check: bool,
}

impl ClientConfig {
    /// Create a new builder for ClientConfig.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    pub fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    pub fn permission_mode(&self) -> PermissionMode {
        self.permission_mode
    }

    /// Bound on request writes and on collected one-shot queries.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn working_directory(&self) -> Option<&PathBuf> {
        self.working_directory.as_ref()
    }

    /// Whether the CLI version is probed before the first launch.
    pub fn version_check(&self) -> bool {
        self.version_check
    }

    /// The CLI program, `claude` unless overridden.
    pub fn cli_program(&self) -> PathBuf {
        self.cli_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CLI))
    }

    /// Full argument list for a stream-json session.
    pub fn cli_args(&self) -> Vec<String> {
        args::build_args(self)
    }

    /// Environment overrides for the subprocess.
    ///
    /// Library-managed variables win over the caller's map; variables not
    /// mentioned here come from the parent when `inherit_env` is set.
    pub fn build_env(&self) -> BTreeMap<String, Option<String>> {
        let mut env = self.env_vars.clone();

        env.insert(ENV_ENTRYPOINT.to_string(), Some(ENTRYPOINT.to_string()));
        if let Some((var, secret)) = self.resolved_auth.env_pair() {
            env.insert(var.to_string(), Some(secret.to_string()));
        }
        if let Some(ref url) = self.base_url {
            env.insert(ENV_BASE_URL.to_string(), Some(url.clone()));
        }

        env
    }

    /// Everything the process layer needs to launch the CLI.
    pub fn launch_spec(&self) -> LaunchSpec {
        LaunchSpec {
            program: self.cli_program(),
            args: self.cli_args(),
            working_directory: self.working_directory.clone(),
            env: self.build_env(),
            inherit_env: self.inherit_env,
        }
    }
}

/// Builder for [`ClientConfig`]. Validation happens in
/// [`build()`](ClientConfigBuilder::build).
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    auth_method: AuthMethod,
    fallbacks: Vec<AuthMethod>,
    model: Option<Model>,
    permission_mode: PermissionMode,
    permission_prompt_tool: Option<String>,
    system_prompt: Option<String>,
    append_system_prompt: Option<String>,
    allowed_tools: Vec<String>,
    disallowed_tools: Vec<String>,
    max_turns: Option<u32>,
    continue_conversation: bool,
    resume: Option<SessionId>,
    settings: Option<PathBuf>,
    add_dirs: Vec<PathBuf>,
    extra_args: Vec<(String, Option<String>)>,
    cli_path: Option<PathBuf>,
    working_directory: Option<PathBuf>,
    timeout: Option<Duration>,
    env_vars: BTreeMap<String, Option<String>>,
    inherit_env: bool,
    base_url: Option<String>,
    version_check: bool,
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self {
            auth_method: AuthMethod::default(),
            fallbacks: Vec::new(),
            model: None,
            permission_mode: PermissionMode::default(),
            permission_prompt_tool: None,
            system_prompt: None,
            append_system_prompt: None,
            allowed_tools: Vec::new(),
            disallowed_tools: Vec::new(),
            max_turns: None,
            continue_conversation: false,
            resume: None,
            settings: None,
            add_dirs: Vec::new(),
            extra_args: Vec::new(),
            cli_path: None,
            working_directory: None,
            timeout: None,
            env_vars: BTreeMap::new(),
            inherit_env: true,
            base_url: None,
            version_check: true,
        }
    }
}

impl ClientConfigBuilder {
    // -------------------------------------------------------------------------
    // Authentication
    // -------------------------------------------------------------------------

    /// Pass an API key as ANTHROPIC_API_KEY.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.auth_method = AuthMethod::ApiKey(key.into());
        self
    }

    /// Read ANTHROPIC_API_KEY from this process's environment at build time.
    pub fn api_key_from_env(mut self) -> Self {
        self.auth_method = AuthMethod::ApiKeyFromEnv;
        self
    }

    /// Pass an OAuth token (from `claude setup-token`) as CLAUDE_CODE_OAUTH_TOKEN.
    pub fn oauth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_method = AuthMethod::OAuthToken(token.into());
        self
    }

    /// Read CLAUDE_CODE_OAUTH_TOKEN from this process's environment at build time.
    pub fn oauth_token_from_env(mut self) -> Self {
        self.auth_method = AuthMethod::OAuthTokenFromEnv;
        self
    }

    pub fn auth(mut self, method: AuthMethod) -> Self {
        self.auth_method = method;
        self
    }

    /// Tried in order when the primary method finds no credential.
    pub fn fallback(mut self, auth: AuthMethod) -> Self {
        self.fallbacks.push(auth);
        self
    }

    // -------------------------------------------------------------------------
    // Model and permissions
    // -------------------------------------------------------------------------

    pub fn model(mut self, model: impl Into<Model>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn permission_mode(mut self, mode: PermissionMode) -> Self {
        self.permission_mode = mode;
        self
    }

    /// MCP tool the CLI asks for permission decisions.
    pub fn permission_prompt_tool(mut self, tool: impl Into<String>) -> Self {
        self.permission_prompt_tool = Some(tool.into());
        self
    }

    // -------------------------------------------------------------------------
    // System prompts
    // -------------------------------------------------------------------------

    /// Replace the default system prompt.
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Add to the end of the default system prompt.
    pub fn append_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.append_system_prompt = Some(prompt.into());
        self
    }

    // -------------------------------------------------------------------------
    // Tools and limits
    // -------------------------------------------------------------------------

    /// Whitelist. Use constants from [`crate::config::tools`].
    pub fn allowed_tools(mut self, tools: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.allowed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Blacklist. Use constants from [`crate::config::tools`].
    pub fn disallowed_tools(mut self, tools: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.disallowed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn max_turns(mut self, turns: u32) -> Self {
        self.max_turns = Some(turns);
        self
    }

    // -------------------------------------------------------------------------
    // Conversation
    // -------------------------------------------------------------------------

    /// Continue the most recent conversation in the working directory.
    pub fn continue_conversation(mut self, cont: bool) -> Self {
        self.continue_conversation = cont;
        self
    }

    /// Resume a conversation by ID.
    pub fn resume(mut self, id: impl Into<SessionId>) -> Self {
        self.resume = Some(id.into());
        self
    }

    /// Settings file passed to `--settings`.
    pub fn settings(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings = Some(path.into());
        self
    }

    /// Extra directory the CLI may access. Can be repeated.
    pub fn add_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.add_dirs.push(path.into());
        self
    }

    /// Arbitrary `--key [value]` flag, appended after the known options.
    pub fn extra_arg(mut self, key: impl Into<String>, value: Option<String>) -> Self {
        self.extra_args.push((key.into(), value));
        self
    }

    // -------------------------------------------------------------------------
    // Process options
    // -------------------------------------------------------------------------

    /// Path to the CLI binary (default: `claude` from PATH).
    pub fn cli_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cli_path = Some(path.into());
        self
    }

    /// Working directory for the CLI process. Must exist.
    pub fn working_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(path.into());
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Set or override a variable for the subprocess.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(key.into(), Some(value.into()));
        self
    }

    /// Remove an inherited variable from the subprocess environment.
    pub fn remove_env(mut self, key: impl Into<String>) -> Self {
        self.env_vars.insert(key.into(), None);
        self
    }

    /// Start from the parent environment (default) or from an empty one.
    pub fn inherit_env(mut self, inherit: bool) -> Self {
        self.inherit_env = inherit;
        self
    }

    /// API endpoint, passed as ANTHROPIC_BASE_URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Probe `<cli> -v` once before the first launch (default: on).
    pub fn version_check(mut self, check: bool) -> Self {
        self.version_check = check;
        self
    }

    // -------------------------------------------------------------------------
    // Build
    // -------------------------------------------------------------------------

    /// Build the configuration.
    ///
    /// Fails when authentication cannot be resolved, `max_turns` or `timeout`
    /// is zero, an extra argument has an empty key, or the working directory
    /// does not exist. The CLI binary itself is only looked up at launch.
    pub fn build(self) -> Result<ClientConfig> {
        let resolved_auth = resolve_auth(&self.auth_method, &self.fallbacks)?;

        if self.max_turns == Some(0) {
            return Err(Error::InvalidConfig("max_turns must be positive".into()));
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(Error::InvalidConfig("timeout must be non-zero".into()));
        }
        if let Some((key, _)) = self
            .extra_args
            .iter()
            .find(|(key, _)| key.trim_start_matches('-').is_empty())
        {
            return Err(Error::InvalidConfig(format!(
                "extra argument has no name: {key:?}"
            )));
        }
        if let Some(ref dir) = self.working_directory {
            if !dir.is_dir() {
                return Err(Error::InvalidConfig(format!(
                    "working directory does not exist: {}",
                    dir.display()
                )));
            }
        }

        Ok(ClientConfig {
            resolved_auth,
            model: self.model,
            permission_mode: self.permission_mode,
            permission_prompt_tool: self.permission_prompt_tool,
            system_prompt: self.system_prompt,
            append_system_prompt: self.append_system_prompt,
            allowed_tools: self.allowed_tools,
            disallowed_tools: self.disallowed_tools,
            max_turns: self.max_turns,
            continue_conversation: self.continue_conversation,
            resume: self.resume,
            settings: self.settings,
            add_dirs: self.add_dirs,
            extra_args: self.extra_args,
            cli_path: self.cli_path,
            working_directory: self.working_directory,
            timeout: self.timeout,
            env_vars: self.env_vars,
            inherit_env: self.inherit_env,
            base_url: self.base_url,
            version_check: self.version_check,
        })
    }
}
