use std::time::Duration;

use serde_json::Value;

/// Maximum number of characters of a raw line or JSON fragment kept in an error.
const MAX_CONTEXT_CHARS: usize = 200;

/// Errors that can occur while driving the Claude CLI subprocess.
///
/// Errors are organized by category:
/// - Configuration errors: detected at `build()` time
/// - Lifecycle errors: misuse of start/connect/send/receive ordering
/// - Process errors: launch and termination failures
/// - Protocol errors: malformed lines or schema violations in CLI output
/// - Runtime errors: timeouts, cancellation, error results
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    // -------------------------------------------------------------------------
    // Configuration errors (detected at build() time)
    // -------------------------------------------------------------------------
    /// Environment variable required for authentication is not set.
    #[error("environment variable {var} not set")]
    EnvVarNotFound { var: &'static str },

    /// Invalid configuration provided to builder.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // -------------------------------------------------------------------------
    // Lifecycle errors
    // -------------------------------------------------------------------------
    /// An operation was called in a state that does not allow it.
    ///
    /// Starting a process twice, connecting twice, or sending before
    /// connecting are programming errors and are never retried.
    #[error("invalid connection state: {0}")]
    ConnectionState(String),

    // -------------------------------------------------------------------------
    // Process errors
    // -------------------------------------------------------------------------
    /// The OS refused to launch the CLI, or it died right after launch.
    #[error(
        "failed to start `{}`: {} (verify the Claude Code CLI is installed: npm install -g @anthropic-ai/claude-code){}",
        .program,
        .source,
        stderr_suffix(.stderr)
    )]
    ProcessStart {
        program: String,
        /// Captured stderr output, when the process produced any.
        stderr: Option<String>,
        #[source]
        source: std::io::Error,
    },

    /// Killing the process tree failed.
    #[error("failed to interrupt claude process: {0}")]
    Interrupt(#[source] std::io::Error),

    /// IO error communicating with the claude subprocess.
    #[error("IO error: {0}")]
    Io(#[source] std::io::Error),

    // -------------------------------------------------------------------------
    // Protocol errors
    // -------------------------------------------------------------------------
    /// A non-blank output line was not valid JSON.
    #[error("failed to decode line `{line}`: {source}")]
    Decode {
        /// The offending line, truncated for display.
        line: String,
        #[source]
        source: serde_json::Error,
    },

    /// A JSON object did not match the message schema.
    #[error("invalid message field `{field}`: {reason} (in {fragment})")]
    MessageParse {
        /// Dotted path of the missing or invalid field.
        field: String,
        reason: String,
        /// The offending JSON fragment, truncated for display.
        fragment: String,
    },

    /// Failed to serialize an outbound request.
    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),

    // -------------------------------------------------------------------------
    // Runtime errors
    // -------------------------------------------------------------------------
    /// Operation exceeded the configured timeout.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Operation was cancelled through its cancellation token.
    #[error("operation cancelled")]
    Cancelled,

    /// The CLI reported an error result.
    #[error("CLI error: {message}")]
    CliError { message: String },

    /// The CLI output ended before a result message arrived.
    #[error("CLI output ended without a result message")]
    MissingResult,
}

/// A specialized Result type for claude-subprocess operations.
pub type Result<T> = std::result::Result<T, Error>;

fn stderr_suffix(stderr: &Option<String>) -> String {
    match stderr.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => format!("; stderr: {}", truncate(text)),
        _ => String::new(),
    }
}

fn truncate(raw: &str) -> String {
    if raw.chars().count() <= MAX_CONTEXT_CHARS {
        return raw.to_string();
    }
    let mut out: String = raw.chars().take(MAX_CONTEXT_CHARS).collect();
    out.push('…');
    out
}

impl Error {
    /// Create a decode error for a malformed line.
    pub fn decode(source: serde_json::Error, raw: &str) -> Self {
        Self::Decode {
            line: truncate(raw),
            source,
        }
    }

    /// Create a parse error for a required field that is absent or null.
    pub fn missing_field(field: impl Into<String>, fragment: &Value) -> Self {
        Self::MessageParse {
            field: field.into(),
            reason: "missing required field".to_string(),
            fragment: truncate(&fragment.to_string()),
        }
    }

    /// Create a parse error for a field holding the wrong JSON kind.
    pub fn invalid_field(field: impl Into<String>, expected: &str, fragment: &Value) -> Self {
        Self::MessageParse {
            field: field.into(),
            reason: format!("expected {expected}"),
            fragment: truncate(&fragment.to_string()),
        }
    }

    /// Create a parse error for an unrecognized `type` discriminator.
    pub fn unknown_type(field: impl Into<String>, value: &str, fragment: &Value) -> Self {
        Self::MessageParse {
            field: field.into(),
            reason: format!("unknown type `{value}`"),
            fragment: truncate(&fragment.to_string()),
        }
    }

    /// Create an IO error.
    pub fn io(source: std::io::Error) -> Self {
        Self::Io(source)
    }

    /// Check if this error came from malformed CLI output.
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Error::Decode { .. } | Error::MessageParse { .. })
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Timeout(_) | Error::Io(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Encode(err)
    }
}
