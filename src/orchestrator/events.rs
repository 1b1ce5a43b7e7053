// Turn events and NDJSON framing
//
// Wire format, one JSON object per line:
//   {"type":"tool_call","id":"..","name":"..","arguments":{..}}
//   {"type":"tool_result","id":"..","name":"..","output":{..}}
//   {"chunk":".."}
//   {"done":true}
//   {"error":".."}
//
// `EventEmitter` is the only writer of a turn's event channel and enforces
// ordering: a tool_result only after its tool_call, nothing after done/error,
// nothing once the turn is cancelled.

use crate::conversation::ToolCall;
use crate::tools::types::ToolResult;
use anyhow::{bail, Context, Result};
use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use std::collections::HashSet;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One event in a turn's stream
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    ToolCall {
        id: String,
        name: String,
        arguments: Value,
    },
    ToolResult {
        id: String,
        name: String,
        output: Value,
    },
    Chunk(String),
    Done,
    Error(String),
}

impl TurnEvent {
    /// `done` and `error` end a turn's stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnEvent::Done | TurnEvent::Error(_))
    }

    pub fn to_json(&self) -> Value {
        match self {
            TurnEvent::ToolCall {
                id,
                name,
                arguments,
            } => json!({"type": "tool_call", "id": id, "name": name, "arguments": arguments}),
            TurnEvent::ToolResult { id, name, output } => {
                json!({"type": "tool_result", "id": id, "name": name, "output": output})
            }
            TurnEvent::Chunk(text) => json!({ "chunk": text }),
            TurnEvent::Done => json!({ "done": true }),
            TurnEvent::Error(message) => json!({ "error": message }),
        }
    }

    /// Serialized line including the trailing newline
    pub fn to_ndjson_line(&self) -> String {
        let mut line = self.to_json().to_string();
        line.push('\n');
        line
    }

    /// Parse one wire line back into an event
    pub fn parse_line(line: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(line.trim()).context("Event line is not valid JSON")?;
        Self::from_json(&value)
    }

    pub fn from_json(value: &Value) -> Result<Self> {
        let str_field = |key: &str| -> Result<String> {
            value
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .with_context(|| format!("Event is missing '{}'", key))
        };

        match value.get("type").and_then(Value::as_str) {
            Some("tool_call") => {
                return Ok(TurnEvent::ToolCall {
                    id: str_field("id")?,
                    name: str_field("name")?,
                    arguments: value.get("arguments").cloned().unwrap_or(Value::Null),
                })
            }
            Some("tool_result") => {
                return Ok(TurnEvent::ToolResult {
                    id: str_field("id")?,
                    name: str_field("name")?,
                    output: value.get("output").cloned().unwrap_or(Value::Null),
                })
            }
            Some(other) => bail!("Unknown event type: {}", other),
            None => {}
        }

        if value.get("chunk").is_some() {
            return Ok(TurnEvent::Chunk(str_field("chunk")?));
        }
        if value.get("done").and_then(Value::as_bool) == Some(true) {
            return Ok(TurnEvent::Done);
        }
        if value.get("error").is_some() {
            return Ok(TurnEvent::Error(str_field("error")?));
        }
        bail!("Unrecognised event: {}", value)
    }
}

impl Serialize for TurnEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Split `text` into chunks of `words_per_chunk` words. Whitespace is kept,
/// so the chunks concatenate to exactly `text`. Empty text yields no chunks.
pub fn chunk_text(text: &str, words_per_chunk: usize) -> Vec<String> {
    let per_chunk = words_per_chunk.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut words = 0;
    let mut prev_whitespace = true;

    for (i, c) in text.char_indices() {
        let whitespace = c.is_whitespace();
        if !whitespace && prev_whitespace {
            if words > 0 && words % per_chunk == 0 {
                chunks.push(text[start..i].to_string());
                start = i;
            }
            words += 1;
        }
        prev_whitespace = whitespace;
    }

    if start < text.len() {
        chunks.push(text[start..].to_string());
    }
    chunks
}

/// Ordered writer for one turn's events
pub struct EventEmitter {
    tx: mpsc::Sender<TurnEvent>,
    cancel: CancellationToken,
    announced: HashSet<String>,
    finished: bool,
    closed: bool,
}

impl EventEmitter {
    pub fn new(tx: mpsc::Sender<TurnEvent>, cancel: CancellationToken) -> Self {
        Self {
            tx,
            cancel,
            announced: HashSet::new(),
            finished: false,
            closed: false,
        }
    }

    /// A terminal event has been sent
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The receiving side went away
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Announce a call before it executes
    pub async fn tool_call(&mut self, call: &ToolCall) -> bool {
        let sent = self
            .send(TurnEvent::ToolCall {
                id: call.id.clone(),
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            })
            .await;
        if sent {
            self.announced.insert(call.id.clone());
        }
        sent
    }

    /// Report a completed call. Dropped unless the call was announced and
    /// has no result yet.
    pub async fn tool_result(&mut self, result: &ToolResult) -> bool {
        if !self.announced.remove(&result.tool_call_id) {
            tracing::debug!(
                "Dropping tool_result for unannounced call {}",
                result.tool_call_id
            );
            return false;
        }
        self.send(TurnEvent::ToolResult {
            id: result.tool_call_id.clone(),
            name: result.name.clone(),
            output: result.output_json(),
        })
        .await
    }

    /// Stream a final answer as chunks
    pub async fn text(&mut self, text: &str, words_per_chunk: usize) -> bool {
        for chunk in chunk_text(text, words_per_chunk) {
            if !self.send(TurnEvent::Chunk(chunk)).await {
                return false;
            }
        }
        true
    }

    pub async fn done(&mut self) -> bool {
        self.send(TurnEvent::Done).await
    }

    pub async fn error(&mut self, message: impl Into<String>) -> bool {
        self.send(TurnEvent::Error(message.into())).await
    }

    async fn send(&mut self, event: TurnEvent) -> bool {
        if self.finished || self.closed || self.cancel.is_cancelled() {
            return false;
        }
        if event.is_terminal() {
            self.finished = true;
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.tx.send(event) => {
                if sent.is_err() {
                    self.closed = true;
                }
                sent.is_ok()
            }
        }
    }
}
