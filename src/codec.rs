//! Line protocol codec.
//!
//! Every frame exchanged with the CLI is exactly one JSON document on one line.
//! Outbound frames use snake_case field names; inbound frames are decoded into a
//! generic [`Value`] and handed to [`crate::protocol::parse_message`], which
//! tolerates mixed naming conventions.

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Serialize a request as a single line of JSON, without the trailing newline.
///
/// `serde_json` escapes control characters inside strings, so the output never
/// contains a raw newline.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Error::Encode)
}

/// Decode one line of CLI output.
///
/// Returns `Ok(None)` for empty or whitespace-only lines so callers can skip
/// them. Malformed JSON yields [`Error::Decode`] carrying the raw line.
pub fn decode(line: &str) -> Result<Option<Value>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|e| Error::decode(e, line))
}
