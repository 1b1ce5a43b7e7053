// Tool implementations
//
// Concrete implementations of the model-callable tools

use crate::sql::database::QueryBackend;
use crate::tools::registry::ToolRegistry;
use crate::tools::workspace::Workspace;
use serde_json::{json, Value};
use std::sync::Arc;

// Workspace file tools
pub mod list_files;
pub mod read_file;
pub mod search_files;
pub mod write_file;

// Database tools
pub mod sql_tools;

// Re-exports for convenience
pub use list_files::ListFilesTool;
pub use read_file::ReadFileTool;
pub use search_files::SearchFilesTool;
pub use sql_tools::{SqlQueryTool, SqlSchemaTool};
pub use write_file::WriteFileTool;

/// Registry with every tool, file tools rooted at `workspace`
pub fn standard_registry(workspace: Workspace, backend: Arc<dyn QueryBackend>) -> ToolRegistry {
    ToolRegistry::new()
        .with(Arc::new(ListFilesTool::new(workspace.clone())))
        .with(Arc::new(ReadFileTool::new(workspace.clone())))
        .with(Arc::new(WriteFileTool::new(workspace.clone())))
        .with(Arc::new(SearchFilesTool::new(workspace)))
        .with(Arc::new(SqlSchemaTool::new(backend.clone())))
        .with(Arc::new(SqlQueryTool::new(backend)))
}

/// Add the optional `title` property every tool accepts. Clients show it as
/// a label for the step; tools ignore it.
pub(crate) fn with_title(mut properties: Value) -> Value {
    if let Some(map) = properties.as_object_mut() {
        map.insert(
            "title".to_string(),
            json!({
                "type": "string",
                "description": "Short human title for this step (<= 6 words)"
            }),
        );
    }
    properties
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::database::Database;
    use crate::tools::types::ToolName;
    use tempfile::TempDir;

    #[test]
    fn test_standard_registry_has_every_tool() {
        let dir = TempDir::new().unwrap();
        let registry = standard_registry(
            Workspace::new(dir.path()).unwrap(),
            Arc::new(Database::open_in_memory().unwrap()),
        );
        assert_eq!(registry.names(), ToolName::ALL.to_vec());
        for def in registry.definitions() {
            assert!(def.input_schema.properties.get("title").is_some(), "{}", def.name);
        }
    }
}
