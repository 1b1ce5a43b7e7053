// Write tool - create or overwrite a workspace file

use crate::tools::implementations::with_title;
use crate::tools::registry::Tool;
use crate::tools::types::{ToolInputSchema, ToolName};
use crate::tools::workspace::Workspace;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::fs;

pub struct WriteFileTool {
    workspace: Workspace,
}

impl WriteFileTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> ToolName {
        ToolName::WriteFile
    }

    fn description(&self) -> &str {
        "Write a UTF-8 text file to the project workspace, creating folders as needed."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::object(
            with_title(json!({
                "path": {
                    "type": "string",
                    "description": "Relative path from workspace root"
                },
                "content": {
                    "type": "string",
                    "description": "The complete file content to write"
                }
            })),
            &["path", "content"],
        )
    }

    async fn execute(&self, input: &Value) -> Result<Value> {
        let rel = input["path"].as_str().context("Missing path parameter")?;
        let content = input["content"]
            .as_str()
            .context("Missing content parameter")?;

        let path = self.workspace.resolve(rel)?;

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directories for: {}", rel))?;
            }
        }

        fs::write(&path, content).with_context(|| format!("Failed to write file: {}", rel))?;

        tracing::debug!("Wrote {} bytes to {}", content.len(), path.display());

        Ok(json!({
            "path": self.workspace.relative(&path).unwrap_or_else(|| rel.to_string()),
            "bytes": content.len(),
        }))
    }
}
