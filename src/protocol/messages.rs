//! Message types emitted by the CLI.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};

use super::content::{
    parse_content_array, ContentBlock, ErrorContentBlock, ToolResultBlock, ToolUseBlock,
};
use super::fields::{normalize, Fields};
use super::usage::Usage;
use crate::error::{Error, Result};

/// A message from the CLI's stream-json output.
///
/// Decoding goes through [`parse_message`], which is strict: unknown `type`
/// values, missing required fields and wrongly typed fields are errors.
/// Serializing produces the wire shape again, so a decoded message can be
/// re-encoded and decoded without loss of required fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Tool results or echoed prompts.
    User(UserMessage),
    /// Model response with content blocks.
    Assistant(AssistantMessage),
    /// Session metadata (init, compaction, hooks...).
    System(SystemMessage),
    /// Final summary. Always the last message of an exchange.
    Result(ResultMessage),
}

/// Content of a user message: either a bare prompt string or content blocks.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UserContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// A user turn, usually carrying tool results back to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct UserMessage {
    pub content: UserContent,
    pub uuid: Option<String>,
    pub session_id: Option<String>,
    /// Set when this message belongs to a sub-agent's tool call.
    pub parent_tool_use_id: Option<String>,
}

impl UserMessage {
    /// Get all tool result blocks.
    pub fn tool_results(&self) -> Vec<&ToolResultBlock> {
        match &self.content {
            UserContent::Text(_) => Vec::new(),
            UserContent::Blocks(blocks) => {
                blocks.iter().filter_map(|b| b.as_tool_result()).collect()
            }
        }
    }

    /// The prompt text, if this message carries a bare string.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            UserContent::Text(s) => Some(s),
            UserContent::Blocks(_) => None,
        }
    }
}

/// A response from the model.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantMessage {
    /// Content blocks. Never empty; a reported error becomes one error block.
    pub content: Vec<ContentBlock>,
    pub model: String,
    pub session_id: String,
    /// Stream-level message identifier.
    pub uuid: Option<String>,
    /// API message identifier (`message.id`).
    pub message_id: Option<String>,
    pub parent_tool_use_id: Option<String>,
    pub stop_reason: Option<String>,
    pub usage: Option<Usage>,
    /// Error code reported by the CLI in place of content.
    pub error: Option<String>,
}

impl AssistantMessage {
    /// Concatenate all text blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| block.text())
            .collect::<Vec<_>>()
            .join("")
    }

    /// Get all tool use blocks.
    pub fn tool_uses(&self) -> Vec<&ToolUseBlock> {
        self.content
            .iter()
            .filter_map(|block| block.as_tool_use())
            .collect()
    }

    /// The error block standing in for content, if the CLI reported an error.
    pub fn error_block(&self) -> Option<&ErrorContentBlock> {
        if self.error.is_none() {
            return None;
        }
        self.content.first().and_then(|b| b.as_error())
    }
}

/// Session metadata. Everything except `type` and `subtype` is kept in `data`.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemMessage {
    pub subtype: String,
    pub session_id: String,
    pub uuid: Option<String>,
    pub data: Map<String, Value>,
}

impl SystemMessage {
    /// Look up a metadata field by exact name.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Check if this is the init message sent at session start.
    pub fn is_init(&self) -> bool {
        self.subtype == "init"
    }

    /// Model reported by the init message.
    pub fn model(&self) -> Option<&str> {
        self.get("model").and_then(Value::as_str)
    }

    /// Working directory reported by the init message.
    pub fn cwd(&self) -> Option<&str> {
        self.get("cwd").and_then(Value::as_str)
    }

    /// Tool names reported by the init message.
    pub fn tools(&self) -> Vec<&str> {
        self.get("tools")
            .and_then(Value::as_array)
            .map(|tools| tools.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// Final summary of an exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultMessage {
    /// "success", "error_max_turns", "error_during_execution"...
    pub subtype: String,
    pub duration_ms: u64,
    pub duration_api_ms: u64,
    pub is_error: bool,
    pub num_turns: u32,
    pub session_id: String,
    pub uuid: Option<String>,
    pub total_cost_usd: Option<f64>,
    pub usage: Option<Usage>,
    /// Final response text.
    pub result: Option<String>,
}

impl ResultMessage {
    /// Check if the exchange completed successfully.
    pub fn is_success(&self) -> bool {
        self.subtype == "success" && !self.is_error
    }

    /// Wall clock duration.
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Time spent in API calls.
    pub fn api_duration(&self) -> Duration {
        Duration::from_millis(self.duration_api_ms)
    }
}

impl Message {
    /// The `type` discriminator as written on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::User(_) => "user",
            Message::Assistant(_) => "assistant",
            Message::System(_) => "system",
            Message::Result(_) => "result",
        }
    }

    /// Get the session ID, if the message carries one.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Message::User(m) => m.session_id.as_deref(),
            Message::Assistant(m) => Some(&m.session_id),
            Message::System(m) => Some(&m.session_id),
            Message::Result(m) => Some(&m.session_id),
        }
    }

    /// Get the message identifier, if present.
    pub fn uuid(&self) -> Option<&str> {
        match self {
            Message::User(m) => m.uuid.as_deref(),
            Message::Assistant(m) => m.uuid.as_deref().or(m.message_id.as_deref()),
            Message::System(m) => m.uuid.as_deref(),
            Message::Result(m) => m.uuid.as_deref(),
        }
    }

    /// Check if this message ends the exchange.
    pub fn is_result(&self) -> bool {
        matches!(self, Message::Result(_))
    }

    /// Check if this is a system init message.
    pub fn is_system_init(&self) -> bool {
        matches!(self, Message::System(m) if m.is_init())
    }

    /// Get the user message, if this is one.
    pub fn as_user(&self) -> Option<&UserMessage> {
        match self {
            Message::User(m) => Some(m),
            _ => None,
        }
    }

    /// Get the assistant message, if this is one.
    pub fn as_assistant(&self) -> Option<&AssistantMessage> {
        match self {
            Message::Assistant(m) => Some(m),
            _ => None,
        }
    }

    /// Get the system message, if this is one.
    pub fn as_system(&self) -> Option<&SystemMessage> {
        match self {
            Message::System(m) => Some(m),
            _ => None,
        }
    }

    /// Get the result message, if this is one.
    pub fn as_result(&self) -> Option<&ResultMessage> {
        match self {
            Message::Result(m) => Some(m),
            _ => None,
        }
    }

    /// Render the message in its wire shape.
    pub fn to_value(&self) -> Value {
        let mut out = match self {
            Message::User(m) => {
                let mut out = json!({
                    "type": "user",
                    "message": {"role": "user", "content": m.content},
                    "parent_tool_use_id": m.parent_tool_use_id,
                });
                let payload = m.tool_results().into_iter().find_map(|r| r.result.clone());
                if let Some(payload) = payload {
                    out["tool_use_result"] = payload;
                }
                put_opt(&mut out, "session_id", &m.session_id);
                out
            }
            Message::Assistant(m) => {
                let mut inner = json!({
                    "role": "assistant",
                    "model": m.model,
                    "content": m.content,
                });
                put_opt(&mut inner, "id", &m.message_id);
                put_opt(&mut inner, "stop_reason", &m.stop_reason);
                if let Some(usage) = &m.usage {
                    inner["usage"] = json!(usage);
                }
                let mut out = json!({
                    "type": "assistant",
                    "message": inner,
                    "session_id": m.session_id,
                    "parent_tool_use_id": m.parent_tool_use_id,
                });
                put_opt(&mut out, "error", &m.error);
                out
            }
            Message::System(m) => {
                let mut data = m.data.clone();
                data.insert("type".into(), json!("system"));
                data.insert("subtype".into(), json!(m.subtype));
                data.insert("session_id".into(), json!(m.session_id));
                Value::Object(data)
            }
            Message::Result(m) => {
                let mut out = json!({
                    "type": "result",
                    "subtype": m.subtype,
                    "duration_ms": m.duration_ms,
                    "duration_api_ms": m.duration_api_ms,
                    "is_error": m.is_error,
                    "num_turns": m.num_turns,
                    "session_id": m.session_id,
                });
                if let Some(cost) = m.total_cost_usd {
                    out["total_cost_usd"] = json!(cost);
                }
                if let Some(usage) = &m.usage {
                    out["usage"] = json!(usage);
                }
                put_opt(&mut out, "result", &m.result);
                out
            }
        };
        let uuid = match self {
            Message::User(m) => &m.uuid,
            Message::Assistant(m) => &m.uuid,
            Message::System(m) => &m.uuid,
            Message::Result(m) => &m.uuid,
        };
        put_opt(&mut out, "uuid", uuid);
        out
    }
}

fn put_opt(target: &mut Value, key: &str, value: &Option<String>) {
    if let (Some(v), Value::Object(map)) = (value, target) {
        map.insert(key.to_string(), Value::String(v.clone()));
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        parse_message(&value).map_err(serde::de::Error::custom)
    }
}

impl TryFrom<Value> for Message {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        parse_message(&value)
    }
}

impl TryFrom<&Value> for Message {
    type Error = Error;

    fn try_from(value: &Value) -> Result<Self> {
        parse_message(value)
    }
}

#[derive(Debug, Clone, Copy)]
enum MessageKind {
    User,
    Assistant,
    System,
    Result,
}

impl MessageKind {
    fn from_wire(raw: &str) -> Option<Self> {
        match normalize(raw).as_str() {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "system" => Some(Self::System),
            "result" => Some(Self::Result),
            _ => None,
        }
    }
}

/// Decode one CLI message from a generic JSON value.
///
/// Pure function. Fails with [`Error::MessageParse`] naming the offending
/// field when the value does not match the schema of its `type`.
pub fn parse_message(value: &Value) -> Result<Message> {
    let root = Fields::root(value)?;
    let raw_type = root.str("type")?;
    if raw_type.trim().is_empty() {
        return Err(root.invalid("type", "a non-empty string"));
    }
    let kind = MessageKind::from_wire(raw_type)
        .ok_or_else(|| Error::unknown_type("type", raw_type, value))?;

    match kind {
        MessageKind::User => parse_user(&root).map(Message::User),
        MessageKind::Assistant => parse_assistant(&root).map(Message::Assistant),
        MessageKind::System => parse_system(&root).map(Message::System),
        MessageKind::Result => parse_result(&root).map(Message::Result),
    }
}

fn owned(s: Option<&str>) -> Option<String> {
    s.map(str::to_string)
}

fn parse_user(root: &Fields<'_>) -> Result<UserMessage> {
    let message = root.object("message")?;
    let tool_use_result = root
        .get("tool_use_result")
        .or_else(|| message.get("tool_use_result"));

    let content = match message.require("content")? {
        Value::String(text) => UserContent::Text(text.clone()),
        Value::Array(_) => {
            UserContent::Blocks(parse_content_array(&message, "content", tool_use_result)?)
        }
        _ => return Err(message.invalid("content", "a string or an array")),
    };

    Ok(UserMessage {
        content,
        uuid: owned(root.opt_str("uuid")?),
        session_id: owned(root.opt_str("session_id")?),
        parent_tool_use_id: owned(root.opt_str("parent_tool_use_id")?),
    })
}

fn parse_assistant(root: &Fields<'_>) -> Result<AssistantMessage> {
    let message = root.object("message")?;
    let error = root.opt_str("error")?.filter(|e| !e.is_empty());

    let content = match error {
        Some(code) => vec![ContentBlock::Error(ErrorContentBlock {
            message: format!("assistant message reported error: {code}"),
            code: Some(code.to_string()),
            detail: None,
        })],
        None => {
            let blocks = parse_content_array(&message, "content", None)?;
            if blocks.is_empty() {
                return Err(message.invalid("content", "a non-empty array"));
            }
            blocks
        }
    };

    let usage = match message.opt_object("usage")? {
        Some(u) => Some(Usage::from_fields(&u)?),
        None => None,
    };

    Ok(AssistantMessage {
        content,
        model: message.str("model")?.to_string(),
        session_id: root.str("session_id")?.to_string(),
        uuid: owned(root.opt_str("uuid")?),
        message_id: owned(message.opt_str("id")?),
        parent_tool_use_id: owned(root.opt_str("parent_tool_use_id")?),
        stop_reason: owned(message.opt_str("stop_reason")?),
        usage,
        error: error.map(str::to_string),
    })
}

fn parse_system(root: &Fields<'_>) -> Result<SystemMessage> {
    let subtype = root.str("subtype")?.to_string();
    let session_id = root.str("session_id")?.to_string();
    let uuid = owned(root.opt_str("uuid")?);

    let data = root
        .map()
        .iter()
        .filter(|(k, _)| {
            let k = normalize(k);
            k != "type" && k != "subtype"
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    Ok(SystemMessage {
        subtype,
        session_id,
        uuid,
        data,
    })
}

fn parse_result(root: &Fields<'_>) -> Result<ResultMessage> {
    let num_turns = u32::try_from(root.u64("num_turns")?)
        .map_err(|_| root.invalid("num_turns", "a 32-bit turn count"))?;
    let usage = match root.opt_object("usage")? {
        Some(u) => Some(Usage::from_fields(&u)?),
        None => None,
    };

    Ok(ResultMessage {
        subtype: root.str("subtype")?.to_string(),
        duration_ms: root.u64("duration_ms")?,
        duration_api_ms: root.u64("duration_api_ms")?,
        is_error: root.bool("is_error")?,
        num_turns,
        session_id: root.str("session_id")?.to_string(),
        uuid: owned(root.opt_str("uuid")?),
        total_cost_usd: root.opt_f64("total_cost_usd")?,
        usage,
        result: owned(root.opt_str("result")?),
    })
}
