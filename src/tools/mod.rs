// Tool execution system
//
// The fixed set of model-callable tools (workspace files and read-only SQL),
// their registry, argument validation, and the executor that runs them.

pub mod executor;
pub mod implementations;
pub mod registry;
pub mod types;
pub mod validation;
pub mod workspace;

pub use executor::ToolExecutor;
pub use implementations::standard_registry;
pub use registry::{Tool, ToolRegistry};
pub use types::{output_to_json, ToolDefinition, ToolInputSchema, ToolName, ToolOutput, ToolResult};
pub use workspace::Workspace;
