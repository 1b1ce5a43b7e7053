// Read tool - reads a UTF-8 text file from the workspace
//
// Content is capped at MAX_READ_BYTES (cut on a char boundary) and flagged
// with `truncated` when cut.

use crate::config::constants::MAX_READ_BYTES;
use crate::tools::implementations::with_title;
use crate::tools::registry::Tool;
use crate::tools::types::{ToolInputSchema, ToolName};
use crate::tools::workspace::Workspace;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::fs;

pub struct ReadFileTool {
    workspace: Workspace,
}

impl ReadFileTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> ToolName {
        ToolName::ReadFile
    }

    fn description(&self) -> &str {
        "Read a UTF-8 text file from the project workspace."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::object(
            with_title(json!({
                "path": {
                    "type": "string",
                    "description": "Relative path from workspace root"
                }
            })),
            &["path"],
        )
    }

    async fn execute(&self, input: &Value) -> Result<Value> {
        let rel = input["path"].as_str().context("Missing path parameter")?;
        let path = self.workspace.resolve(rel)?;

        if !path.is_file() {
            anyhow::bail!("File not found: {}", rel);
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read file: {}", rel))?;

        let (content, truncated) = if contents.len() > MAX_READ_BYTES {
            let mut end = MAX_READ_BYTES;
            while !contents.is_char_boundary(end) {
                end -= 1;
            }
            (contents[..end].to_string(), true)
        } else {
            (contents, false)
        };

        Ok(json!({
            "path": self.workspace.relative(&path).unwrap_or_else(|| rel.to_string()),
            "content": content,
            "truncated": truncated,
        }))
    }
}
