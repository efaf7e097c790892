//! One-shot queries against the Claude CLI.
//!
//! Each query launches a fresh CLI process, writes the request, streams the
//! reply and disposes the process. Nothing survives the call.
//!
//! # Example
//!
//! ```ignore
//! use claude_subprocess::{ClaudeClient, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = ClaudeClient::new()?;
//!     let text = client.query_text("What is 2+2?").await?;
//!     println!("{text}");
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, BoxStream};
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::codec;
use crate::config::{AuthMethod, ClientConfig, ClientConfigBuilder, Model, PermissionMode, SessionId};
use crate::process::{self, LineSource, ProcessReader, ProcessSession, ProcessWriter};
use crate::protocol::{UserRequest, DEFAULT_SESSION_ID};
use crate::session::Session;
use crate::stream::{with_timeout, CollectedResponse, MessageStream};
use crate::{Error, Result};

/// How long a query waits for the CLI to exit once its stdout closes.
const EXIT_WAIT: Duration = Duration::from_secs(2);

/// What a one-shot query writes to the CLI.
pub enum QueryInput {
    /// Sent as a single user envelope.
    Text(String),
    /// Pre-built request objects, forwarded verbatim one per line.
    Stream(BoxStream<'static, Value>),
}

impl QueryInput {
    /// Forward every item of `messages` as a request line.
    pub fn stream<S>(messages: S) -> Self
    where
        S: futures::Stream<Item = Value> + Send + 'static,
    {
        QueryInput::Stream(messages.boxed())
    }
}

impl std::fmt::Debug for QueryInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryInput::Text(text) => f.debug_tuple("Text").field(text).finish(),
            QueryInput::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<&str> for QueryInput {
    fn from(s: &str) -> Self {
        QueryInput::Text(s.to_string())
    }
}

impl From<String> for QueryInput {
    fn from(s: String) -> Self {
        QueryInput::Text(s)
    }
}

impl From<Vec<Value>> for QueryInput {
    fn from(messages: Vec<Value>) -> Self {
        QueryInput::stream(stream::iter(messages))
    }
}

/// Entry point for talking to the Claude CLI.
///
/// `ClaudeClient` is `Send + Sync` and cheap to clone. Every query spawns
/// its own CLI process, so concurrent queries do not interfere.
///
/// # Example
///
/// ```ignore
/// use claude_subprocess::{ClaudeClient, Model};
///
/// let client = ClaudeClient::builder()
///     .model(Model::Haiku)
///     .max_turns(1)
///     .build()?;
///
/// let response = client.query_collect("Hello!").await?;
/// println!("{}", response.text());
/// ```
#[derive(Debug, Clone)]
pub struct ClaudeClient {
    config: Arc<ClientConfig>,
}

impl ClaudeClient {
    /// A client with default configuration: `claude` from PATH, its own login.
    pub fn new() -> Result<Self> {
        let config = ClientConfig::builder().build()?;
        Ok(Self::with_config(config))
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Run one query and stream the reply.
    ///
    /// The stream ends after the result message. Dropping it early kills the
    /// subprocess and everything it spawned.
    pub async fn query(&self, input: impl Into<QueryInput>) -> Result<MessageStream> {
        self.query_with_cancellation(input, CancellationToken::new())
            .await
    }

    /// Like [`query`](Self::query), stopped early when `cancel` fires.
    pub async fn query_with_cancellation(
        &self,
        input: impl Into<QueryInput>,
        cancel: CancellationToken,
    ) -> Result<MessageStream> {
        let mut process = launch(&self.config).await?;

        let writer_task = match input.into() {
            QueryInput::Text(prompt) => {
                let line = UserRequest::text(prompt, DEFAULT_SESSION_ID).encode();
                let written = match line {
                    Ok(line) => {
                        bounded(self.config.timeout(), process.write_line(&line, &cancel)).await
                    }
                    Err(e) => Err(e),
                };
                let closed = match written {
                    Ok(()) => process.close_input().await,
                    Err(e) => Err(e),
                };
                if let Err(e) = closed {
                    // A broken pipe usually means the CLI died; its exit says why.
                    let e = match e {
                        Error::Io(_) => process.check_exit(EXIT_WAIT).await.err().unwrap_or(e),
                        e => e,
                    };
                    process.dispose().await;
                    return Err(e);
                }
                None
            }
            QueryInput::Stream(messages) => {
                let writer = process
                    .take_writer()
                    .ok_or_else(|| Error::ConnectionState("process input is not available".into()))?;
                Some(tokio::spawn(forward_requests(
                    messages,
                    writer,
                    cancel.clone(),
                )))
            }
        };

        let reader = process
            .take_reader()
            .ok_or_else(|| Error::ConnectionState("process output is not available".into()))?;

        let source = QuerySource {
            reader,
            process,
            writer_task,
        };
        Ok(MessageStream::new(source, cancel))
    }

    /// Run one query and gather every message, bounded by the configured
    /// timeout.
    pub async fn query_collect(&self, input: impl Into<QueryInput>) -> Result<CollectedResponse> {
        let input = input.into();
        bounded(self.config.timeout(), async move {
            self.query(input).await?.collect_all().await
        })
        .await
    }

    /// Run one query and return the assistant text.
    ///
    /// An error result from the CLI becomes [`Error::CliError`].
    pub async fn query_text(&self, input: impl Into<QueryInput>) -> Result<String> {
        let input = input.into();
        bounded(self.config.timeout(), async move {
            self.query(input).await?.collect_text().await
        })
        .await
    }

    /// An unconnected interactive session sharing this client's config.
    pub fn session(&self) -> Session {
        Session::from_shared(Arc::clone(&self.config))
    }
}

/// Launch the CLI described by `config`, probing its version first if asked.
pub(crate) async fn launch(config: &ClientConfig) -> Result<ProcessSession> {
    let spec = config.launch_spec();
    if config.version_check() {
        process::check_version_once(&spec.program).await;
    }
    ProcessSession::spawn(&spec).await
}

/// Apply `limit` to `future` when one is configured.
pub(crate) async fn bounded<F, T>(limit: Option<Duration>, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(limit) => with_timeout(limit, future).await,
        None => future.await,
    }
}

async fn forward_requests(
    mut messages: BoxStream<'static, Value>,
    mut writer: ProcessWriter,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            next = messages.next() => next,
        };
        let Some(message) = next else { break };

        let line = match codec::encode(&message) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "dropping request that failed to encode");
                continue;
            }
        };
        if let Err(e) = writer.write_line(&line).await {
            tracing::debug!(error = %e, "request stream stopped: stdin closed");
            return;
        }
    }
    if let Err(e) = writer.close().await {
        tracing::debug!(error = %e, "failed to close CLI stdin");
    }
}

/// Output side of a one-shot query. Owns the process, so closing the
/// stream tears the process down.
struct QuerySource {
    reader: ProcessReader,
    process: ProcessSession,
    writer_task: Option<JoinHandle<()>>,
}

impl LineSource for QuerySource {
    async fn next_line(&mut self) -> Result<Option<String>> {
        match self.reader.read_line().await? {
            Some(line) => Ok(Some(line)),
            None => {
                self.process.check_exit(EXIT_WAIT).await?;
                Ok(None)
            }
        }
    }

    async fn close(&mut self) {
        if let Some(task) = self.writer_task.take() {
            task.abort();
        }
        self.process.dispose().await;
    }
}

impl Drop for QuerySource {
    fn drop(&mut self) {
        if let Some(task) = self.writer_task.take() {
            task.abort();
        }
    }
}

/// Builder for [`ClaudeClient`], delegating to [`ClientConfigBuilder`].
#[derive(Debug, Clone, Default)]
pub struct ClientBuilder {
    inner: ClientConfigBuilder,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            inner: ClientConfigBuilder::default(),
        }
    }

    /// Validate the configuration and create the client.
    pub fn build(self) -> Result<ClaudeClient> {
        let config = self.inner.build()?;
        Ok(ClaudeClient::with_config(config))
    }

    // -------------------------------------------------------------------------
    // Authentication
    // -------------------------------------------------------------------------

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.inner = self.inner.api_key(key);
        self
    }

    pub fn api_key_from_env(mut self) -> Self {
        self.inner = self.inner.api_key_from_env();
        self
    }

    pub fn oauth_token(mut self, token: impl Into<String>) -> Self {
        self.inner = self.inner.oauth_token(token);
        self
    }

    pub fn oauth_token_from_env(mut self) -> Self {
        self.inner = self.inner.oauth_token_from_env();
        self
    }

    pub fn auth(mut self, method: AuthMethod) -> Self {
        self.inner = self.inner.auth(method);
        self
    }

    pub fn fallback(mut self, auth: AuthMethod) -> Self {
        self.inner = self.inner.fallback(auth);
        self
    }

    // -------------------------------------------------------------------------
    // Model, permissions and prompts
    // -------------------------------------------------------------------------

    pub fn model(mut self, model: impl Into<Model>) -> Self {
        self.inner = self.inner.model(model);
        self
    }

    pub fn permission_mode(mut self, mode: PermissionMode) -> Self {
        self.inner = self.inner.permission_mode(mode);
        self
    }

    pub fn permission_prompt_tool(mut self, tool: impl Into<String>) -> Self {
        self.inner = self.inner.permission_prompt_tool(tool);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.inner = self.inner.system_prompt(prompt);
        self
    }

    pub fn append_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.inner = self.inner.append_system_prompt(prompt);
        self
    }

    // -------------------------------------------------------------------------
    // Tools, limits and conversation
    // -------------------------------------------------------------------------

    pub fn allowed_tools(mut self, tools: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.inner = self.inner.allowed_tools(tools);
        self
    }

    pub fn disallowed_tools(mut self, tools: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.inner = self.inner.disallowed_tools(tools);
        self
    }

    pub fn max_turns(mut self, turns: u32) -> Self {
        self.inner = self.inner.max_turns(turns);
        self
    }

    pub fn continue_conversation(mut self, cont: bool) -> Self {
        self.inner = self.inner.continue_conversation(cont);
        self
    }

    pub fn resume(mut self, id: impl Into<SessionId>) -> Self {
        self.inner = self.inner.resume(id);
        self
    }

    pub fn settings(mut self, path: impl Into<PathBuf>) -> Self {
        self.inner = self.inner.settings(path);
        self
    }

    pub fn add_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.inner = self.inner.add_dir(path);
        self
    }

    pub fn extra_arg(mut self, key: impl Into<String>, value: Option<String>) -> Self {
        self.inner = self.inner.extra_arg(key, value);
        self
    }

    // -------------------------------------------------------------------------
    // Process options
    // -------------------------------------------------------------------------

    pub fn cli_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.inner = self.inner.cli_path(path);
        self
    }

    pub fn working_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.inner = self.inner.working_directory(path);
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.inner = self.inner.timeout(duration);
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner = self.inner.env(key, value);
        self
    }

    pub fn remove_env(mut self, key: impl Into<String>) -> Self {
        self.inner = self.inner.remove_env(key);
        self
    }

    pub fn inherit_env(mut self, inherit: bool) -> Self {
        self.inner = self.inner.inherit_env(inherit);
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.inner = self.inner.base_url(url);
        self
    }

    pub fn version_check(mut self, check: bool) -> Self {
        self.inner = self.inner.version_check(check);
        self
    }
}
