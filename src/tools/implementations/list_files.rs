// List tool - enumerates files under the workspace root

use crate::config::constants::{MAX_LIST_FILES, MAX_WALK_DEPTH};
use crate::tools::implementations::with_title;
use crate::tools::registry::Tool;
use crate::tools::types::{ToolInputSchema, ToolName};
use crate::tools::workspace::Workspace;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use walkdir::WalkDir;

pub struct ListFilesTool {
    workspace: Workspace,
}

impl ListFilesTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> ToolName {
        ToolName::ListFiles
    }

    fn description(&self) -> &str {
        "List all files under the project workspace root."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::object(with_title(json!({})), &[])
    }

    async fn execute(&self, _input: &Value) -> Result<Value> {
        let mut files: Vec<String> = WalkDir::new(self.workspace.root())
            .max_depth(MAX_WALK_DEPTH)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && !self.workspace.is_protected(e.path()))
            .filter_map(|e| self.workspace.relative(e.path()))
            .collect();

        files.sort();
        let truncated = files.len() > MAX_LIST_FILES;
        files.truncate(MAX_LIST_FILES);

        Ok(json!({
            "files": files,
            "truncated": truncated,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_lists_nested_files_sorted() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("b/c")).unwrap();
        fs::write(dir.path().join("b/c/deep.txt"), "x").unwrap();
        fs::write(dir.path().join("a.txt"), "x").unwrap();

        let tool = ListFilesTool::new(Workspace::new(dir.path()).unwrap());
        let out = tool.execute(&json!({})).await.unwrap();

        assert_eq!(out["files"], json!(["a.txt", "b/c/deep.txt"]));
        assert_eq!(out["truncated"], false);
    }

    #[tokio::test]
    async fn test_hides_protected_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("agent.db"), "x").unwrap();
        fs::write(dir.path().join("agent.db-journal"), "x").unwrap();
        fs::write(dir.path().join("report.md"), "x").unwrap();

        let ws = Workspace::new(dir.path()).unwrap().protect(dir.path().join("agent.db"));
        let out = ListFilesTool::new(ws).execute(&json!({})).await.unwrap();

        assert_eq!(out["files"], json!(["report.md"]));
    }

    #[tokio::test]
    async fn test_empty_workspace() {
        let dir = TempDir::new().unwrap();
        let tool = ListFilesTool::new(Workspace::new(dir.path()).unwrap());
        let out = tool.execute(&json!({"title": "List files"})).await.unwrap();
        assert_eq!(out["files"], json!([]));
    }
}
