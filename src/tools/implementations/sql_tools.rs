// SQL tools - schema introspection and guarded read-only queries
//
// `sql_query` declares its `sql` argument as guarded, so the executor has
// already replaced it with the guard-normalized query by the time
// `execute_guarded` runs here. When the guard wrote the LIMIT itself, one row
// past it is fetched so a cut result comes back marked `truncated`.

use crate::config::constants::{DEFAULT_ROW_LIMIT, MAX_ROW_LIMIT};
use crate::errors::ToolError;
use crate::sql::database::{QueryBackend, QueryParams};
use crate::sql::guard::{with_row_count, QueryGuardDecision};
use crate::tools::implementations::with_title;
use crate::tools::registry::Tool;
use crate::tools::types::{ToolInputSchema, ToolName};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct SqlSchemaTool {
    backend: Arc<dyn QueryBackend>,
}

impl SqlSchemaTool {
    pub fn new(backend: Arc<dyn QueryBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for SqlSchemaTool {
    fn name(&self) -> ToolName {
        ToolName::SqlSchema
    }

    fn description(&self) -> &str {
        "Return database schema (tables, columns, types, primary keys, row counts)."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::object(with_title(json!({})), &[])
    }

    async fn execute(&self, _input: &Value) -> Result<Value> {
        self.backend
            .schema()
            .await
            .context("Failed to read database schema")
    }
}

pub struct SqlQueryTool {
    backend: Arc<dyn QueryBackend>,
}

impl SqlQueryTool {
    pub fn new(backend: Arc<dyn QueryBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for SqlQueryTool {
    fn name(&self) -> ToolName {
        ToolName::SqlQuery
    }

    fn description(&self) -> &str {
        "Execute a read-only SQL SELECT/CTE and return rows (up to max_rows)."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::object(
            with_title(json!({
                "sql": {
                    "type": "string",
                    "description": "A single SELECT or WITH statement"
                },
                "params": {
                    "type": ["array", "object", "string", "number", "integer", "boolean"],
                    "description": "Positional list or named dict parameters"
                },
                "max_rows": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": MAX_ROW_LIMIT,
                    "default": DEFAULT_ROW_LIMIT
                }
            })),
            &["sql"],
        )
    }

    fn guarded_query_argument(&self) -> Option<&'static str> {
        Some("sql")
    }

    fn default_row_limit(&self, input: &Value) -> Result<Option<u64>, ToolError> {
        requested_rows(input).map(Some)
    }

    async fn execute(&self, input: &Value) -> Result<Value> {
        self.run(input, None).await
    }

    async fn execute_guarded(&self, input: &Value, decision: &QueryGuardDecision) -> Result<Value> {
        self.run(input, decision.row_cap).await
    }
}

impl SqlQueryTool {
    async fn run(&self, input: &Value, row_cap: Option<u64>) -> Result<Value> {
        let sql = input["sql"].as_str().context("Missing sql parameter")?;
        let max_rows = requested_rows(input)?;
        let params = QueryParams::from_json(input.get("params"));

        let (fetch_sql, keep) = match row_cap {
            Some(cap) => (
                with_row_count(sql, cap + 1).unwrap_or_else(|| sql.to_string()),
                max_rows.min(cap),
            ),
            None => (sql.to_string(), max_rows),
        };

        let result = self
            .backend
            .query(&fetch_sql, &params, keep as usize)
            .await
            .context("Query failed")?;

        Ok(json!({
            "sql": sql,
            "columns": result.columns,
            "rowcount": result.rows.len(),
            "rows": result.rows,
            "truncated": result.truncated,
        }))
    }
}

/// `max_rows` argument, checked against 1..=MAX_ROW_LIMIT
fn requested_rows(input: &Value) -> Result<u64, ToolError> {
    let value = match input.get("max_rows") {
        None | Some(Value::Null) => return Ok(DEFAULT_ROW_LIMIT),
        Some(value) => value,
    };
    match value.as_i64() {
        Some(n) if n >= 1 && n as u64 <= MAX_ROW_LIMIT => Ok(n as u64),
        _ => Err(ToolError::invalid_arguments(format!(
            "max_rows must be between 1 and {}, got {}",
            MAX_ROW_LIMIT, value
        ))),
    }
}
