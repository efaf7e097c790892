//! Stream-json protocol types for Claude CLI communication.
//!
//! The CLI, run with `--output-format stream-json --input-format stream-json`,
//! exchanges one JSON object per line in both directions.
//!
//! # Inbound messages
//!
//! - [`SystemMessage`]: session metadata (init, compaction...)
//! - [`AssistantMessage`]: model responses with content blocks
//! - [`UserMessage`]: tool results returned to the model
//! - [`ResultMessage`]: final summary with cost and usage; ends the exchange
//!
//! # Outbound requests
//!
//! [`UserRequest`] builds the user envelope; [`Prompt`] covers both plain text
//! and pre-built request batches.
//!
//! # Example
//!
//! ```
//! use claude_subprocess::protocol::{parse_message, Message};
//!
//! let value = serde_json::json!({
//!     "type": "assistant",
//!     "message": {"model": "claude-sonnet-4-5", "content": [{"type": "text", "text": "Hello!"}]},
//!     "session_id": "abc"
//! });
//! let msg = parse_message(&value).unwrap();
//!
//! if let Some(assistant) = msg.as_assistant() {
//!     assert_eq!(assistant.text(), "Hello!");
//! }
//! ```

mod content;
mod fields;
mod messages;
mod request;
mod usage;

pub use content::{
    ContentBlock, ErrorContentBlock, TextBlock, ThinkingBlock, ToolResultBlock, ToolUseBlock,
};
pub use messages::{
    parse_message, AssistantMessage, Message, ResultMessage, SystemMessage, UserContent,
    UserMessage,
};
pub use request::{inject_session_id, Prompt, UserRequest, DEFAULT_SESSION_ID};
pub use usage::{CacheCreation, ServerToolUse, Usage};

/// Decode one line of CLI output into a message.
///
/// Returns `Ok(None)` for blank lines.
pub fn decode_line(line: &str) -> crate::Result<Option<Message>> {
    match crate::codec::decode(line)? {
        Some(value) => parse_message(&value).map(Some),
        None => Ok(None),
    }
}
