//! Content block types for messages.

use serde::Serialize;
use serde_json::{Map, Value};

use super::fields::{normalize, Fields};
use crate::error::{Error, Result};

/// A content block within a user or assistant message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text content.
    Text(TextBlock),
    /// Thinking block (extended thinking feature).
    Thinking(ThinkingBlock),
    /// A tool use request from the assistant.
    ToolUse(ToolUseBlock),
    /// A tool result returned to the assistant.
    ToolResult(ToolResultBlock),
    /// An error reported in place of regular content.
    Error(ErrorContentBlock),
}

/// Plain text content block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextBlock {
    /// The text content.
    pub text: String,
}

/// Thinking block for extended thinking feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThinkingBlock {
    /// The thinking text (may be redacted).
    pub thinking: String,
    /// Opaque signature the API uses to verify the thinking text.
    pub signature: String,
}

/// A tool use request from the assistant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolUseBlock {
    /// Unique identifier for this tool use.
    pub id: String,
    /// Name of the tool being invoked.
    pub name: String,
    /// Input parameters.
    pub input: Map<String, Value>,
}

/// A tool result returned to the assistant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResultBlock {
    /// ID of the tool_use this result corresponds to.
    pub tool_use_id: String,
    /// The result content (string or structured).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    /// Whether the tool execution resulted in an error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
    /// Structured tool output, copied from the enclosing message's
    /// `tool_use_result` field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl ToolResultBlock {
    /// Get the content as a string, concatenating text items if structured.
    pub fn content_text(&self) -> String {
        match &self.content {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Array(items)) => items
                .iter()
                .filter(|item| item.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n"),
            _ => String::new(),
        }
    }

    /// Whether the tool reported failure.
    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }
}

/// An error standing in for message content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorContentBlock {
    /// Human readable description.
    pub message: String,
    /// Machine readable error code, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Raw diagnostic text, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ContentBlock {
    /// Check if this is a text block.
    pub fn is_text(&self) -> bool {
        matches!(self, ContentBlock::Text(_))
    }

    /// Check if this is a tool use block.
    pub fn is_tool_use(&self) -> bool {
        matches!(self, ContentBlock::ToolUse(_))
    }

    /// Check if this is a tool result block.
    pub fn is_tool_result(&self) -> bool {
        matches!(self, ContentBlock::ToolResult(_))
    }

    /// Check if this is an error block.
    pub fn is_error(&self) -> bool {
        matches!(self, ContentBlock::Error(_))
    }

    /// Get the text block, if this is one.
    pub fn as_text(&self) -> Option<&TextBlock> {
        match self {
            ContentBlock::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Get the thinking block, if this is one.
    pub fn as_thinking(&self) -> Option<&ThinkingBlock> {
        match self {
            ContentBlock::Thinking(t) => Some(t),
            _ => None,
        }
    }

    /// Get the tool use block, if this is one.
    pub fn as_tool_use(&self) -> Option<&ToolUseBlock> {
        match self {
            ContentBlock::ToolUse(t) => Some(t),
            _ => None,
        }
    }

    /// Get the tool result block, if this is one.
    pub fn as_tool_result(&self) -> Option<&ToolResultBlock> {
        match self {
            ContentBlock::ToolResult(t) => Some(t),
            _ => None,
        }
    }

    /// Get the error block, if this is one.
    pub fn as_error(&self) -> Option<&ErrorContentBlock> {
        match self {
            ContentBlock::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Extract the text content if this is a text block.
    pub fn text(&self) -> Option<&str> {
        self.as_text().map(|t| t.text.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
enum BlockKind {
    Text,
    Thinking,
    ToolUse,
    ToolResult,
    Error,
}

impl BlockKind {
    fn from_wire(raw: &str) -> Option<Self> {
        match normalize(raw).as_str() {
            "text" => Some(Self::Text),
            "thinking" => Some(Self::Thinking),
            "tooluse" => Some(Self::ToolUse),
            "toolresult" => Some(Self::ToolResult),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Decode one content block.
///
/// `tool_use_result` is the sibling payload from the enclosing message; it is
/// attached to tool result blocks only.
pub(crate) fn parse_content_block(
    block: &Fields<'_>,
    tool_use_result: Option<&Value>,
) -> Result<ContentBlock> {
    let raw_type = block.str("type")?;
    let kind = BlockKind::from_wire(raw_type).ok_or_else(|| {
        Error::unknown_type(block.path("type"), raw_type, block.value())
    })?;

    match kind {
        BlockKind::Text => Ok(ContentBlock::Text(TextBlock {
            text: block.str("text")?.to_string(),
        })),
        BlockKind::Thinking => Ok(ContentBlock::Thinking(ThinkingBlock {
            thinking: block.str("thinking")?.to_string(),
            signature: block.str("signature")?.to_string(),
        })),
        BlockKind::ToolUse => {
            let input = match block.get("input") {
                None => Map::new(),
                Some(Value::Object(map)) => map.clone(),
                Some(_) => return Err(block.invalid("input", "a JSON object")),
            };
            Ok(ContentBlock::ToolUse(ToolUseBlock {
                id: block.str("id")?.to_string(),
                name: block.str("name")?.to_string(),
                input,
            }))
        }
        BlockKind::ToolResult => match parse_tool_result(block, tool_use_result) {
            Ok(result) => Ok(ContentBlock::ToolResult(result)),
            Err(err) if block.get("is_error").and_then(Value::as_bool) == Some(true) => {
                // Lossy recovery: a failed tool call whose payload does not
                // match the tool_result shape is kept as an error block so the
                // surrounding message still decodes.
                tracing::debug!(error = %err, "tool_result with is_error=true degraded to error block");
                Ok(ContentBlock::Error(ErrorContentBlock {
                    message: format!("malformed tool result: {err}"),
                    code: None,
                    detail: Some(block.value().to_string()),
                }))
            }
            Err(err) => Err(err),
        },
        BlockKind::Error => Ok(ContentBlock::Error(ErrorContentBlock {
            message: block.str("message")?.to_string(),
            code: block.opt_str("code")?.map(str::to_string),
            detail: block.opt_str("detail")?.map(str::to_string),
        })),
    }
}

fn parse_tool_result(
    block: &Fields<'_>,
    tool_use_result: Option<&Value>,
) -> Result<ToolResultBlock> {
    Ok(ToolResultBlock {
        tool_use_id: block.str("tool_use_id")?.to_string(),
        content: block.get("content").cloned(),
        is_error: block.opt_bool("is_error")?,
        result: tool_use_result.cloned(),
    })
}

/// Decode every element of the array under `key`.
pub(crate) fn parse_content_array(
    parent: &Fields<'_>,
    key: &str,
    tool_use_result: Option<&Value>,
) -> Result<Vec<ContentBlock>> {
    parent
        .array(key)?
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let block = parent.element(key, i, item)?;
            parse_content_block(&block, tool_use_result)
        })
        .collect()
}
