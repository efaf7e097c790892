//! Authentication methods for the Claude CLI.
//!
//! The CLI authenticates itself. This module only decides which credential,
//! if any, is handed to the subprocess through its environment:
//!
//! - [`AuthMethod::Inherit`] (default): pass nothing; the CLI uses its own
//!   login or whatever the inherited environment provides
//! - API keys (direct or from this process's environment)
//! - OAuth tokens from `claude setup-token` (direct or from the environment)
//!
//! # Example
//!
//! ```ignore
//! use claude_subprocess::config::{AuthMethod, ClientConfig};
//!
//! let config = ClientConfig::builder()
//!     .oauth_token_from_env()
//!     .fallback(AuthMethod::ApiKeyFromEnv)
//!     .build()?;
//! ```

use crate::{Error, Result};

/// Authentication method for the Claude CLI.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthMethod {
    /// Do not inject credentials.
    #[default]
    Inherit,
    /// Use API key directly (passed via ANTHROPIC_API_KEY env var to subprocess).
    ApiKey(String),
    /// Read API key from ANTHROPIC_API_KEY env var.
    ApiKeyFromEnv,
    /// Use OAuth token directly (passed via CLAUDE_CODE_OAUTH_TOKEN env var to subprocess).
    OAuthToken(String),
    /// Read OAuth token from CLAUDE_CODE_OAUTH_TOKEN env var.
    OAuthTokenFromEnv,
}

/// Environment variable name for API key.
pub const ENV_API_KEY: &str = "ANTHROPIC_API_KEY";
/// Environment variable name for OAuth token.
pub const ENV_OAUTH_TOKEN: &str = "CLAUDE_CODE_OAUTH_TOKEN";

/// Resolved authentication ready to pass to the subprocess.
#[derive(Clone, PartialEq, Eq)]
pub(crate) enum ResolvedAuth {
    Inherit,
    /// API key to pass via ANTHROPIC_API_KEY.
    ApiKey(String),
    /// OAuth token to pass via CLAUDE_CODE_OAUTH_TOKEN.
    OAuthToken(String),
}

impl std::fmt::Debug for ResolvedAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print secrets.
        match self {
            ResolvedAuth::Inherit => f.write_str("Inherit"),
            ResolvedAuth::ApiKey(_) => f.write_str("ApiKey(***)"),
            ResolvedAuth::OAuthToken(_) => f.write_str("OAuthToken(***)"),
        }
    }
}

impl ResolvedAuth {
    /// The environment variable and value to set, if any.
    pub fn env_pair(&self) -> Option<(&'static str, &str)> {
        match self {
            ResolvedAuth::Inherit => None,
            ResolvedAuth::ApiKey(s) => Some((ENV_API_KEY, s)),
            ResolvedAuth::OAuthToken(s) => Some((ENV_OAUTH_TOKEN, s)),
        }
    }
}

/// Resolve an AuthMethod to a concrete auth value.
///
/// Fallbacks are tried in order when the primary method reads an unset
/// environment variable. If nothing resolves, the primary method's variable
/// is reported as [`Error::EnvVarNotFound`].
pub(crate) fn resolve_auth(method: &AuthMethod, fallbacks: &[AuthMethod]) -> Result<ResolvedAuth> {
    std::iter::once(method)
        .chain(fallbacks)
        .find_map(try_resolve_single)
        .ok_or_else(|| Error::EnvVarNotFound {
            var: env_var_of(method).unwrap_or(ENV_API_KEY),
        })
}

/// Try to resolve a single auth method. `None` means an unset variable.
fn try_resolve_single(method: &AuthMethod) -> Option<ResolvedAuth> {
    match method {
        AuthMethod::Inherit => Some(ResolvedAuth::Inherit),
        AuthMethod::ApiKey(key) => Some(ResolvedAuth::ApiKey(key.clone())),
        AuthMethod::ApiKeyFromEnv => read_env(ENV_API_KEY).map(ResolvedAuth::ApiKey),
        AuthMethod::OAuthToken(token) => Some(ResolvedAuth::OAuthToken(token.clone())),
        AuthMethod::OAuthTokenFromEnv => read_env(ENV_OAUTH_TOKEN).map(ResolvedAuth::OAuthToken),
    }
}

fn env_var_of(method: &AuthMethod) -> Option<&'static str> {
    match method {
        AuthMethod::ApiKeyFromEnv => Some(ENV_API_KEY),
        AuthMethod::OAuthTokenFromEnv => Some(ENV_OAUTH_TOKEN),
        _ => None,
    }
}

fn read_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.is_empty())
}
