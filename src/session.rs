//! Interactive sessions over one long-lived CLI process.
//!
//! A [`Session`] keeps the CLI running with its stdin open, so several
//! prompts can be sent and answered in the same conversation.
//!
//! ```text
//! Unconnected ──connect──▶ Connected ──disconnect──▶ Disconnected
//!      │                                                  ▲
//!      └──────────────────────disconnect──────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use claude_subprocess::{ClaudeClient, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = ClaudeClient::new()?;
//!     let mut session = client.session();
//!     session.connect().await?;
//!
//!     let first = session.send_and_collect("My name is Alice").await?;
//!     let second = session.send_and_collect("What's my name?").await?;
//!     println!("{}", second.text());
//!     println!("Total cost: ${:.4}", session.total_cost_usd());
//!
//!     session.disconnect().await;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::client::{bounded, launch};
use crate::config::ClientConfig;
use crate::process::{ProcessReader, ProcessSession};
use crate::protocol::{Prompt, Usage, DEFAULT_SESSION_ID};
use crate::stream::{CollectedResponse, MessageStream};
use crate::{Error, Result};

/// Lifecycle of a [`Session`]. There is no way back to `Unconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unconnected,
    Connected,
    Disconnected,
}

/// A multi-turn conversation with one CLI process.
///
/// # Receiving
///
/// At most one receive view ([`receive_all`](Self::receive_all) or
/// [`receive_until_result`](Self::receive_until_result)) may be alive at a
/// time; a second one fails with [`Error::ConnectionState`] until the first
/// is dropped. Each view ends after a result message, so one view per
/// `send` is the usual pattern.
///
/// # Cleanup
///
/// [`disconnect`](Self::disconnect) ends every live view and kills the
/// process tree. Dropping a connected session kills the process as well.
pub struct Session {
    config: Arc<ClientConfig>,
    state: SessionState,
    process: Option<ProcessSession>,
    reader: Option<Arc<Mutex<ProcessReader>>>,
    cancel: CancellationToken,
    /// Last session ID reported by the CLI.
    session_id: Option<String>,
    usage: Usage,
    cost_usd: f64,
}

impl Session {
    /// An unconnected session for `config`.
    pub fn new(config: ClientConfig) -> Self {
        Self::from_shared(Arc::new(config))
    }

    pub(crate) fn from_shared(config: Arc<ClientConfig>) -> Self {
        Self {
            config,
            state: SessionState::Unconnected,
            process: None,
            reader: None,
            cancel: CancellationToken::new(),
            session_id: None,
            usage: Usage::default(),
            cost_usd: 0.0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// OS process ID of the CLI while connected.
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(ProcessSession::pid)
    }

    /// Stderr collected from the CLI so far.
    pub fn stderr_output(&self) -> String {
        self.process
            .as_ref()
            .map(ProcessSession::stderr_output)
            .unwrap_or_default()
    }

    /// Session ID reported by the CLI in the last collected exchange.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Usage summed over exchanges collected with
    /// [`send_and_collect`](Self::send_and_collect).
    pub fn total_usage(&self) -> &Usage {
        &self.usage
    }

    /// Cost summed over exchanges collected with
    /// [`send_and_collect`](Self::send_and_collect).
    pub fn total_cost_usd(&self) -> f64 {
        self.cost_usd
    }

    /// Start the CLI and keep its input open.
    ///
    /// Only valid once, from [`SessionState::Unconnected`]. A launch failure
    /// leaves the session unconnected.
    pub async fn connect(&mut self) -> Result<()> {
        match self.state {
            SessionState::Unconnected => {}
            SessionState::Connected => {
                return Err(Error::ConnectionState("session is already connected".into()))
            }
            SessionState::Disconnected => {
                return Err(Error::ConnectionState(
                    "session was disconnected; create a new session".into(),
                ))
            }
        }

        let mut process = launch(&self.config).await?;
        let reader = process
            .take_reader()
            .ok_or_else(|| Error::ConnectionState("process output is not available".into()))?;

        tracing::debug!(pid = ?process.pid(), "session connected");
        self.reader = Some(Arc::new(Mutex::new(reader)));
        self.process = Some(process);
        self.state = SessionState::Connected;
        Ok(())
    }

    /// Write a prompt, stamping `session_id` (default `"default"`) on every
    /// request that lacks one.
    ///
    /// Batches are written with a single flush. The configured timeout
    /// bounds the write; [`disconnect`](Self::disconnect) cancels it.
    pub async fn send(&mut self, prompt: impl Into<Prompt>, session_id: Option<&str>) -> Result<()> {
        self.ensure_connected("send")?;
        let lines = prompt
            .into()
            .into_lines(session_id.unwrap_or(DEFAULT_SESSION_ID))?;
        let limit = self.config.timeout();
        let cancel = self.cancel.clone();
        let process = self.process_mut()?;
        bounded(limit, process.write_lines(&lines, &cancel)).await
    }

    /// Everything the CLI emits, up to and including the next result.
    pub fn receive_all(&self) -> Result<MessageStream> {
        self.ensure_connected("receive")?;
        let reader = self
            .reader
            .as_ref()
            .ok_or_else(|| Error::ConnectionState("process output is not available".into()))?;
        let guard = Arc::clone(reader).try_lock_owned().map_err(|_| {
            Error::ConnectionState("another receive stream is still active".into())
        })?;
        Ok(MessageStream::new(guard, self.cancel.child_token()))
    }

    /// Like [`receive_all`](Self::receive_all), stopping right after the
    /// result message.
    pub fn receive_until_result(&self) -> Result<MessageStream> {
        Ok(self.receive_all()?.until_result())
    }

    /// Send a prompt and collect the reply, adding its usage and cost to the
    /// session totals.
    pub async fn send_and_collect(&mut self, prompt: impl Into<Prompt>) -> Result<CollectedResponse> {
        let session_id = self.session_id.clone();
        self.send(prompt, session_id.as_deref()).await?;
        let stream = self.receive_until_result()?;
        let response = bounded(self.config.timeout(), stream.collect_all()).await?;

        if let Some(id) = response.session_id.clone() {
            self.session_id = Some(id);
        }
        self.usage += response.usage.clone();
        self.cost_usd += response.cost_usd.unwrap_or(0.0);
        Ok(response)
    }

    /// Kill the CLI and everything it spawned, keeping the session object.
    ///
    /// The CLI has no softer stop signal. Later sends fail and receive views
    /// run to EOF.
    pub async fn interrupt(&mut self) -> Result<()> {
        self.ensure_connected("interrupt")?;
        tracing::debug!(pid = ?self.pid(), "interrupting session");
        self.process_mut()?.terminate().await
    }

    /// Tear everything down. Valid in any state; always ends in
    /// [`SessionState::Disconnected`].
    pub async fn disconnect(&mut self) {
        self.cancel.cancel();
        if let Some(mut process) = self.process.take() {
            process.dispose().await;
        }
        self.reader = None;
        if self.state != SessionState::Disconnected {
            tracing::debug!("session disconnected");
        }
        self.state = SessionState::Disconnected;
    }

    fn ensure_connected(&self, op: &str) -> Result<()> {
        match self.state {
            SessionState::Connected => Ok(()),
            state => Err(Error::ConnectionState(format!(
                "cannot {op}: session is {state:?}"
            ))),
        }
    }

    fn process_mut(&mut self) -> Result<&mut ProcessSession> {
        self.process
            .as_mut()
            .ok_or_else(|| Error::ConnectionState("session has no process".into()))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("pid", &self.pid())
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
