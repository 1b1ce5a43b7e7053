// Search tool - case-insensitive substring search across workspace files
//
// Returns one hit per matching file with a snippet of its opening text.
// Unreadable and non-UTF-8 files are skipped.

use crate::config::constants::{
    DEFAULT_SEARCH_HITS, MAX_SEARCH_HITS, MAX_WALK_DEPTH, SEARCH_SNIPPET_CHARS,
};
use crate::errors::ToolError;
use crate::tools::implementations::with_title;
use crate::tools::registry::Tool;
use crate::tools::types::{ToolInputSchema, ToolName};
use crate::tools::workspace::Workspace;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::fs;
use walkdir::WalkDir;

pub struct SearchFilesTool {
    workspace: Workspace,
}

impl SearchFilesTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for SearchFilesTool {
    fn name(&self) -> ToolName {
        ToolName::SearchFiles
    }

    fn description(&self) -> &str {
        "Search for a case-insensitive substring within files in the workspace."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::object(
            with_title(json!({
                "query": {
                    "type": "string",
                    "description": "Text to look for"
                },
                "max_hits": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": MAX_SEARCH_HITS,
                    "default": DEFAULT_SEARCH_HITS
                }
            })),
            &["query"],
        )
    }

    async fn execute(&self, input: &Value) -> Result<Value> {
        let query = input["query"].as_str().context("Missing query parameter")?;
        let max_hits = match input.get("max_hits").and_then(Value::as_u64) {
            None => DEFAULT_SEARCH_HITS as usize,
            Some(n) if (1..=MAX_SEARCH_HITS).contains(&n) => n as usize,
            Some(n) => {
                return Err(ToolError::invalid_arguments(format!(
                    "max_hits must be between 1 and {}, got {}",
                    MAX_SEARCH_HITS, n
                ))
                .into())
            }
        };

        let needle = query.to_lowercase();
        let mut entries: Vec<_> = WalkDir::new(self.workspace.root())
            .max_depth(MAX_WALK_DEPTH)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && !self.workspace.is_protected(e.path()))
            .collect();
        entries.sort_by(|a, b| a.path().cmp(b.path()));

        let mut hits = Vec::new();
        let mut truncated = false;
        for entry in entries {
            let text = match fs::read_to_string(entry.path()) {
                Ok(text) => text,
                Err(_) => continue, // skip binary files
            };
            if !text.to_lowercase().contains(&needle) {
                continue;
            }
            if hits.len() >= max_hits {
                truncated = true;
                break;
            }
            let Some(path) = self.workspace.relative(entry.path()) else {
                continue;
            };
            let snippet: String = text.chars().take(SEARCH_SNIPPET_CHARS).collect();
            hits.push(json!({ "path": path, "snippet": snippet }));
        }

        Ok(json!({
            "query": query,
            "hits": hits,
            "truncated": truncated,
        }))
    }
}
