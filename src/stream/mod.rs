//! Streaming response handling.
//!
//! The pump turns lines from a [`LineSource`](crate::process::LineSource) into
//! typed [`Message`](crate::protocol::Message)s:
//!
//! - [`MessageStream`] - lazy, cancellable, ends at the result message
//! - [`CollectedResponse`] - everything from one exchange, gathered
//!
//! # Example
//!
//! ```ignore
//! use futures::StreamExt;
//! use claude_subprocess::protocol::Message;
//!
//! let mut stream = client.query("Hello, Claude!").await?;
//!
//! while let Some(message) = stream.next().await {
//!     match message? {
//!         Message::System(s) if s.is_init() => println!("Session: {}", s.session_id),
//!         Message::Assistant(a) => print!("{}", a.text()),
//!         Message::Result(r) => {
//!             println!("\nCost: ${:.4}", r.total_cost_usd.unwrap_or(0.0));
//!         }
//!         _ => {}
//!     }
//! }
//! ```

pub mod response;

pub use response::{with_timeout, CollectedResponse, MessageStream};
