// Tool execution engine
//
// Runs one tool call: registry lookup, argument validation, the SQL guard for
// query tools, then the tool itself. Never fails past this boundary; every
// failure is captured in the result's output.

use crate::conversation::ToolCall;
use crate::errors::ToolError;
use crate::sql::guard::SqlGuard;
use crate::tools::registry::ToolRegistry;
use crate::tools::types::{ToolDefinition, ToolName, ToolOutput, ToolResult};
use crate::tools::validation::validate_arguments;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

/// Tool executor - manages tool execution lifecycle
pub struct ToolExecutor {
    registry: ToolRegistry,
    guard: SqlGuard,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            guard: SqlGuard::default(),
        }
    }

    /// Use a guard with different row caps
    pub fn with_guard(mut self, guard: SqlGuard) -> Self {
        self.guard = guard;
        self
    }

    /// Execute a single tool call
    #[instrument(skip(self, call), fields(tool = %call.name, id = %call.id))]
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let pending = ToolResult::started(call);
        let output = self.run(call).await;

        match &output {
            Ok(_) => info!("Tool executed successfully"),
            Err(err) => warn!(kind = %err.kind, "Tool call failed: {}", err.message),
        }

        pending.complete(output)
    }

    async fn run(&self, call: &ToolCall) -> ToolOutput {
        let name: ToolName = call.name.parse()?;
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| ToolError::unknown_tool(&call.name))?;

        let mut arguments = validate_arguments(&tool.input_schema(), &call.arguments)?;

        if let Some(key) = tool.guarded_query_argument() {
            let query = arguments.get(key).and_then(Value::as_str).ok_or_else(|| {
                ToolError::invalid_arguments(format!("missing required argument '{}'", key))
            })?;

            let guard = match tool.default_row_limit(&arguments)? {
                Some(rows) => self.guard.with_default_limit(rows),
                None => self.guard,
            };
            let decision = guard.check(query);
            if !decision.allowed {
                let reason = decision.reason.unwrap_or_else(|| "query rejected".to_string());
                return Err(ToolError::query_rejected(reason));
            }
            debug!("Guard normalized query: {}", decision.normalized_query);
            arguments[key] = Value::String(decision.normalized_query.clone());

            return tool
                .execute_guarded(&arguments, &decision)
                .await
                .map_err(into_tool_error);
        }

        tool.execute(&arguments).await.map_err(into_tool_error)
    }

    /// Declarations for every registered tool
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }
}

fn into_tool_error(err: anyhow::Error) -> ToolError {
    match err.downcast::<ToolError>() {
        Ok(tool_err) => tool_err,
        Err(other) => ToolError::execution(other),
    }
}
