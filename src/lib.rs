//! # claude-subprocess
//!
//! Async driver for the Claude Code CLI over its stream-json protocol.
//!
//! The CLI runs as a child process. Requests go to its stdin and typed
//! [`Message`]s come back from its stdout, one JSON object per line. The
//! process and everything it spawns are killed when the exchange ends.
//!
//! ## One-shot
//!
//! ```ignore
//! use claude_subprocess::{ClaudeClient, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = ClaudeClient::new()?;
//!     println!("{}", client.query_text("What is 2+2?").await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Streaming
//!
//! ```ignore
//! use futures::StreamExt;
//! use claude_subprocess::{ClaudeClient, Message};
//!
//! let client = ClaudeClient::new()?;
//! let mut stream = client.query("Write a poem").await?;
//! while let Some(message) = stream.next().await {
//!     if let Message::Assistant(a) = message? {
//!         print!("{}", a.text());
//!     }
//! }
//! ```
//!
//! ## Interactive
//!
//! ```ignore
//! let mut session = client.session();
//! session.connect().await?;
//! session.send("My name is Alice", None).await?;
//! let reply = session.receive_until_result()?.collect_text().await?;
//! session.disconnect().await;
//! ```

mod client;
pub mod codec;
pub mod config;
mod error;
pub mod process;
pub mod protocol;
mod session;
pub mod stream;

pub use error::{Error, Result};

pub use client::{ClaudeClient, ClientBuilder, QueryInput};
pub use session::{Session, SessionState};

pub use config::{AuthMethod, ClientConfig, ClientConfigBuilder, Model, PermissionMode, SessionId};

pub use protocol::{parse_message, ContentBlock, Message, Prompt, ResultMessage, Usage};

pub use process::{LaunchSpec, LineSource, ProcessSession};

pub use stream::{CollectedResponse, MessageStream};
