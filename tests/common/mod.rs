//! Test utilities for claude-subprocess integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use claude_subprocess::process::LineSource;
use claude_subprocess::{Error, Result};
use serde_json::{json, Value};

/// A line source that replays scripted lines, then reports EOF.
pub struct ScriptedLines {
    lines: VecDeque<Result<String>>,
    reads: Arc<std::sync::atomic::AtomicUsize>,
    closed: Arc<AtomicBool>,
}

/// Observes a [`ScriptedLines`] after it was moved into a stream.
#[derive(Clone)]
pub struct Probe {
    reads: Arc<std::sync::atomic::AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl Probe {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl ScriptedLines {
    pub fn new<I, S>(lines: I) -> (Self, Probe)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let probe = Probe {
            reads: Arc::default(),
            closed: Arc::default(),
        };
        let source = Self {
            lines: lines.into_iter().map(|l| Ok(l.into())).collect(),
            reads: Arc::clone(&probe.reads),
            closed: Arc::clone(&probe.closed),
        };
        (source, probe)
    }

    /// Fail with `error` after the scripted lines.
    pub fn then_error(mut self, error: Error) -> Self {
        self.lines.push_back(Err(error));
        self
    }
}

impl LineSource for ScriptedLines {
    async fn next_line(&mut self) -> Result<Option<String>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.lines.pop_front().transpose()
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Builds realistic wire lines for one exchange.
pub struct ScenarioBuilder {
    lines: Vec<String>,
    session_id: String,
    counter: u32,
}

impl Default for ScenarioBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScenarioBuilder {
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            session_id: "test-session-123".to_string(),
            counter: 0,
        }
    }

    pub fn session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = id.into();
        self
    }

    fn next_uuid(&mut self) -> String {
        self.counter += 1;
        format!("00000000-0000-0000-0000-{:012}", self.counter)
    }

    fn push(mut self, value: Value) -> Self {
        self.lines.push(value.to_string());
        self
    }

    pub fn system_init(mut self) -> Self {
        let uuid = self.next_uuid();
        let session_id = self.session_id.clone();
        self.push(json!({
            "type": "system",
            "subtype": "init",
            "cwd": "/tmp",
            "session_id": session_id,
            "tools": ["Read", "Write", "Bash"],
            "model": "claude-sonnet-4-5",
            "permissionMode": "default",
            "uuid": uuid,
        }))
    }

    pub fn text(mut self, text: &str) -> Self {
        let uuid = self.next_uuid();
        let session_id = self.session_id.clone();
        self.push(json!({
            "type": "assistant",
            "message": {
                "id": "msg_01",
                "model": "claude-sonnet-4-5",
                "role": "assistant",
                "content": [{"type": "text", "text": text}],
                "usage": {"input_tokens": 10, "output_tokens": 5},
            },
            "parent_tool_use_id": null,
            "session_id": session_id,
            "uuid": uuid,
        }))
    }

    pub fn tool_use(mut self, id: &str, name: &str, input: Value) -> Self {
        let uuid = self.next_uuid();
        let session_id = self.session_id.clone();
        self.push(json!({
            "type": "assistant",
            "message": {
                "model": "claude-sonnet-4-5",
                "content": [{"type": "tool_use", "id": id, "name": name, "input": input}],
            },
            "session_id": session_id,
            "uuid": uuid,
        }))
    }

    pub fn tool_result(mut self, tool_use_id: &str, content: &str, is_error: bool) -> Self {
        let uuid = self.next_uuid();
        let session_id = self.session_id.clone();
        self.push(json!({
            "type": "user",
            "message": {
                "role": "user",
                "content": [{
                    "type": "tool_result",
                    "tool_use_id": tool_use_id,
                    "content": content,
                    "is_error": is_error,
                }],
            },
            "session_id": session_id,
            "uuid": uuid,
        }))
    }

    pub fn blank(mut self) -> Self {
        self.lines.push("   ".to_string());
        self
    }

    pub fn raw(mut self, line: &str) -> Self {
        self.lines.push(line.to_string());
        self
    }

    pub fn success_result(mut self, result: Option<&str>) -> Self {
        let uuid = self.next_uuid();
        let session_id = self.session_id.clone();
        self.push(json!({
            "type": "result",
            "subtype": "success",
            "duration_ms": 1200,
            "duration_api_ms": 900,
            "is_error": false,
            "num_turns": 1,
            "session_id": session_id,
            "uuid": uuid,
            "total_cost_usd": 0.0021,
            "usage": {"input_tokens": 20, "output_tokens": 10},
            "result": result,
        }))
    }

    pub fn error_result(mut self, subtype: &str) -> Self {
        let uuid = self.next_uuid();
        let session_id = self.session_id.clone();
        self.push(json!({
            "type": "result",
            "subtype": subtype,
            "duration_ms": 10,
            "duration_api_ms": 0,
            "is_error": true,
            "num_turns": 0,
            "session_id": session_id,
            "uuid": uuid,
        }))
    }

    pub fn lines(self) -> Vec<String> {
        self.lines
    }

    pub fn build(self) -> (ScriptedLines, Probe) {
        ScriptedLines::new(self.lines)
    }
}
