//! Outbound request envelopes written to the CLI's stdin.

use serde::{Serialize, Serializer};
use serde_json::Value;

use super::fields::normalize;
use crate::codec;
use crate::error::Result;

/// Session ID used when the caller does not pick one.
pub const DEFAULT_SESSION_ID: &str = "default";

/// A user turn in the stream-json input format.
///
/// Serializes to
/// `{"type":"user","message":{"role":"user","content":...},"parent_tool_use_id":null,"session_id":"..."}`.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRequest {
    /// A prompt string or an array of content blocks.
    pub content: Value,
    pub session_id: String,
    pub parent_tool_use_id: Option<String>,
}

impl UserRequest {
    /// A plain text prompt.
    pub fn text(prompt: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            content: Value::String(prompt.into()),
            session_id: session_id.into(),
            parent_tool_use_id: None,
        }
    }

    /// A prompt made of raw content blocks.
    pub fn blocks(blocks: Vec<Value>, session_id: impl Into<String>) -> Self {
        Self {
            content: Value::Array(blocks),
            session_id: session_id.into(),
            parent_tool_use_id: None,
        }
    }

    /// Encode as one line of JSON.
    pub fn encode(&self) -> Result<String> {
        codec::encode(self)
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    message: Body<'a>,
    parent_tool_use_id: Option<&'a str>,
    session_id: &'a str,
}

#[derive(Serialize)]
struct Body<'a> {
    role: &'static str,
    content: &'a Value,
}

impl Serialize for UserRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        Envelope {
            kind: "user",
            message: Body {
                role: "user",
                content: &self.content,
            },
            parent_tool_use_id: self.parent_tool_use_id.as_deref(),
            session_id: &self.session_id,
        }
        .serialize(serializer)
    }
}

/// Input for one `send` on an interactive session.
#[derive(Debug, Clone, PartialEq)]
pub enum Prompt {
    /// Wrapped into a single user envelope.
    Text(String),
    /// Pre-built request objects, written verbatim apart from session ID
    /// injection.
    Messages(Vec<Value>),
}

impl Prompt {
    /// Render the prompt as wire lines, stamping `session_id` where missing.
    pub fn into_lines(self, session_id: &str) -> Result<Vec<String>> {
        match self {
            Prompt::Text(text) => Ok(vec![UserRequest::text(text, session_id).encode()?]),
            Prompt::Messages(messages) => messages
                .into_iter()
                .map(|mut message| {
                    inject_session_id(&mut message, session_id);
                    codec::encode(&message)
                })
                .collect(),
        }
    }
}

impl From<&str> for Prompt {
    fn from(s: &str) -> Self {
        Prompt::Text(s.to_string())
    }
}

impl From<String> for Prompt {
    fn from(s: String) -> Self {
        Prompt::Text(s)
    }
}

impl From<Vec<Value>> for Prompt {
    fn from(messages: Vec<Value>) -> Self {
        Prompt::Messages(messages)
    }
}

/// Set `session_id` on a request object that lacks one (or holds `null`).
///
/// Non-object values are left untouched.
pub fn inject_session_id(message: &mut Value, session_id: &str) {
    let Value::Object(map) = message else {
        return;
    };
    let present = map
        .iter()
        .any(|(k, v)| normalize(k) == "sessionid" && !v.is_null());
    if !present {
        map.insert("session_id".to_string(), Value::String(session_id.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_request_wire_format() {
        let line = UserRequest::text("Hello", "abc").encode().unwrap();
        assert_eq!(
            line,
            r#"{"type":"user","message":{"role":"user","content":"Hello"},"parent_tool_use_id":null,"session_id":"abc"}"#
        );
    }

    #[test]
    fn block_request_wire_format() {
        let request = UserRequest::blocks(vec![json!({"type": "text", "text": "hi"})], "s");
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["message"]["content"][0]["text"], "hi");
        assert_eq!(value["session_id"], "s");
    }

    #[test]
    fn multiline_prompt_stays_on_one_line() {
        let line = UserRequest::text("a\nb\n", DEFAULT_SESSION_ID)
            .encode()
            .unwrap();
        assert!(!line.contains('\n'));
    }

    #[test]
    fn inject_only_when_missing() {
        let mut missing = json!({"type": "user"});
        let mut null = json!({"type": "user", "session_id": null});
        let mut present = json!({"type": "user", "session_id": "keep"});
        let mut camel = json!({"type": "user", "sessionId": "keep"});
        for v in [&mut missing, &mut null, &mut present, &mut camel] {
            inject_session_id(v, "new");
        }
        assert_eq!(missing["session_id"], "new");
        assert_eq!(null["session_id"], "new");
        assert_eq!(present["session_id"], "keep");
        assert!(camel.get("session_id").is_none());
    }

    #[test]
    fn inject_ignores_non_objects() {
        let mut v = json!("plain");
        inject_session_id(&mut v, "s");
        assert_eq!(v, json!("plain"));
    }

    #[test]
    fn prompt_lines() {
        let lines = Prompt::from("hi").into_lines("s1").unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains(r#""session_id":"s1""#));

        let batch = Prompt::from(vec![
            json!({"type": "user", "message": {"role": "user", "content": "one"}}),
            json!({"type": "user", "message": {"role": "user", "content": "two"}, "session_id": "other"}),
        ]);
        let lines = batch.into_lines("s1").unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(r#""session_id":"s1""#));
        assert!(lines[1].contains(r#""session_id":"other""#));
    }
}
