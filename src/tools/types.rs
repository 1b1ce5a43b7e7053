// Core types for the tool execution system
//
// Tool definitions follow the JSON Schema shape used for OpenAI function
// declarations.

use crate::conversation::{Message, ToolCall};
use crate::errors::ToolError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

/// The fixed set of tools the model can call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    ListFiles,
    ReadFile,
    WriteFile,
    SearchFiles,
    SqlSchema,
    SqlQuery,
}

impl ToolName {
    pub const ALL: [ToolName; 6] = [
        ToolName::ListFiles,
        ToolName::ReadFile,
        ToolName::WriteFile,
        ToolName::SearchFiles,
        ToolName::SqlSchema,
        ToolName::SqlQuery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::ListFiles => "list_files",
            ToolName::ReadFile => "read_file",
            ToolName::WriteFile => "write_file",
            ToolName::SearchFiles => "search_files",
            ToolName::SqlSchema => "sql_schema",
            ToolName::SqlQuery => "sql_query",
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolName::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| ToolError::unknown_tool(s))
    }
}

/// Tool definition sent to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: ToolInputSchema,
}

/// JSON Schema for tool input parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInputSchema {
    #[serde(rename = "type")]
    pub schema_type: String, // Always "object"
    pub properties: Value,
    pub required: Vec<String>,
}

impl ToolInputSchema {
    /// Schema with the given property map and required keys
    pub fn object(properties: Value, required: &[&str]) -> Self {
        Self {
            schema_type: "object".to_string(),
            properties,
            required: required.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Create a simple schema with required string parameters
    pub fn simple(params: Vec<(&str, &str)>) -> Self {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();

        for (param_name, param_desc) in params.iter() {
            properties.insert(
                param_name.to_string(),
                json!({
                    "type": "string",
                    "description": param_desc
                }),
            );
            required.push(param_name.to_string());
        }

        Self {
            schema_type: "object".to_string(),
            properties: Value::Object(properties),
            required,
        }
    }

    /// Declared schema for `key`, if any
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Render as a plain JSON Schema object
    pub fn to_json(&self) -> Value {
        json!({
            "type": self.schema_type,
            "properties": self.properties,
            "required": self.required,
        })
    }
}

/// Output of one tool call: a structured value or a structured error
pub type ToolOutput = Result<Value, ToolError>;

/// JSON form of a tool output as recorded in history and on the wire.
/// Errors become `{"error": message, "kind": kind}`.
pub fn output_to_json(output: &ToolOutput) -> Value {
    match output {
        Ok(value) => value.clone(),
        Err(err) => json!({
            "error": err.message,
            "kind": err.kind,
        }),
    }
}

/// Result of one tool call.
///
/// Created at dispatch with only `started_at` set, then completed once the
/// tool returns. The orchestrator announces the call in between.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub name: String,
    pub output: Option<ToolOutput>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ToolResult {
    /// Pending result for `call`
    pub fn started(call: &ToolCall) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            output: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Record the output and finish time
    pub fn complete(mut self, output: ToolOutput) -> Self {
        self.output = Some(output);
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn is_complete(&self) -> bool {
        self.output.is_some()
    }

    pub fn is_error(&self) -> bool {
        matches!(self.output, Some(Err(_)))
    }

    /// Error details, when the call failed
    pub fn error(&self) -> Option<&ToolError> {
        match &self.output {
            Some(Err(err)) => Some(err),
            _ => None,
        }
    }

    /// Wire/history form of the output; `null` while pending
    pub fn output_json(&self) -> Value {
        self.output.as_ref().map(output_to_json).unwrap_or(Value::Null)
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }

    /// `tool` history message answering the call
    pub fn to_message(&self) -> Message {
        Message::tool(
            self.tool_call_id.clone(),
            self.name.clone(),
            self.output_json().to_string(),
        )
    }
}
