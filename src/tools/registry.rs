// Tool registry
//
// Maps each `ToolName` to its implementation. Pure data and dispatch.

use crate::errors::ToolError;
use crate::sql::guard::QueryGuardDecision;
use crate::tools::types::{ToolDefinition, ToolInputSchema, ToolName};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Capability interface every tool implements
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> ToolName;

    fn description(&self) -> &str;

    fn input_schema(&self) -> ToolInputSchema;

    /// Argument holding a SQL string that must pass the guard before
    /// `execute` runs. The executor replaces it with the normalized query.
    fn guarded_query_argument(&self) -> Option<&'static str> {
        None
    }

    /// Row count the guard injects into this call's query when it has no
    /// LIMIT of its own. `None` keeps the guard's default.
    fn default_row_limit(&self, _input: &Value) -> Result<Option<u64>, ToolError> {
        Ok(None)
    }

    /// Run the tool. Arguments have already been validated against
    /// `input_schema`. Return a `ToolError` (via anyhow) to pick the error
    /// kind; any other error is reported as an execution failure.
    async fn execute(&self, input: &Value) -> Result<Value>;

    /// Run a call whose guarded query the guard allowed. `input` already
    /// holds the normalized query.
    async fn execute_guarded(&self, input: &Value, _decision: &QueryGuardDecision) -> Result<Value> {
        self.execute(input).await
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// Registered tools, ordered by name
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<ToolName, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any previous implementation of the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name();
        if self.tools.insert(name, tool).is_some() {
            tracing::debug!("Replaced tool implementation: {}", name);
        }
    }

    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: ToolName) -> Option<&Arc<dyn Tool>> {
        self.tools.get(&name)
    }

    /// Look up a tool by its wire name
    pub fn lookup(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        name.parse::<ToolName>().ok().and_then(|n| self.get(n))
    }

    pub fn names(&self) -> Vec<ToolName> {
        self.tools.keys().copied().collect()
    }

    /// Declarations sent to the model with every call
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|tool| tool.definition()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
