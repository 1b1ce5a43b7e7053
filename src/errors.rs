// Error taxonomy
//
// Turn-ending errors (`TurnError`) abort a turn with an `error` event.
// Tool errors (`ToolError`) are data: they are recorded as the tool's output
// and fed back to the model. Cancellation is a turn status, not an error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that end a turn
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TurnError {
    /// Network or provider failure while calling the model
    #[error("Model call failed: {0}")]
    ModelCall(String),

    /// The model kept requesting tools past the cycle budget
    #[error("Cycle limit exceeded: no final answer after {max_cycles} model calls")]
    CycleLimitExceeded { max_cycles: usize },
}

/// Classification of a failed tool call, serialized in snake_case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    UnknownTool,
    InvalidArguments,
    QueryRejected,
    ExecutionFailed,
}

impl ToolErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolErrorKind::UnknownTool => "unknown_tool",
            ToolErrorKind::InvalidArguments => "invalid_arguments",
            ToolErrorKind::QueryRejected => "query_rejected",
            ToolErrorKind::ExecutionFailed => "execution_failed",
        }
    }
}

impl std::fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured tool failure, contained within a single tool call
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub message: String,
}

impl ToolError {
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unknown_tool(name: &str) -> Self {
        Self::new(ToolErrorKind::UnknownTool, format!("Unknown tool: {}", name))
    }

    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::InvalidArguments, message)
    }

    pub fn query_rejected(reason: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::QueryRejected, reason)
    }

    /// Wrap an execution failure, keeping the full context chain
    pub fn execution(err: anyhow::Error) -> Self {
        Self::new(ToolErrorKind::ExecutionFailed, format!("{:#}", err))
    }
}
