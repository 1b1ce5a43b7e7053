// Tool executor: dispatch, validation and guard short-circuit

use anyhow::Result;
use async_trait::async_trait;
use datachat::conversation::ToolCall;
use datachat::errors::ToolErrorKind;
use datachat::sql::guard::SqlGuard;
use datachat::sql::{Database, QueryBackend, QueryParams, QueryResult};
use datachat::tools::executor::ToolExecutor;
use datachat::tools::implementations::standard_registry;
use datachat::tools::workspace::Workspace;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Records every query it is asked to run
#[derive(Default)]
struct SpyBackend {
    queries: Mutex<Vec<String>>,
    schema_calls: AtomicUsize,
}

#[async_trait]
impl QueryBackend for SpyBackend {
    async fn query(&self, sql: &str, _params: &QueryParams, _max_rows: usize) -> Result<QueryResult> {
        self.queries.lock().unwrap().push(sql.to_string());
        Ok(QueryResult {
            columns: vec!["n".to_string()],
            rows: vec![vec![json!(1)]],
            truncated: false,
        })
    }

    async fn schema(&self) -> Result<Value> {
        self.schema_calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({"dialect": "sqlite", "tables": []}))
    }
}

fn executor() -> (TempDir, Arc<SpyBackend>, ToolExecutor) {
    let dir = TempDir::new().unwrap();
    let spy = Arc::new(SpyBackend::default());
    let registry = standard_registry(Workspace::new(dir.path()).unwrap(), spy.clone());
    (dir, spy, ToolExecutor::new(registry))
}

#[tokio::test]
async fn test_denied_query_never_reaches_backend() {
    let (_dir, spy, executor) = executor();
    let call = ToolCall::new("c1", "sql_query", json!({"sql": "DELETE FROM customers"}));

    let result = executor.execute(&call).await;

    assert!(result.is_complete());
    let err = result.error().expect("expected an error");
    assert_eq!(err.kind, ToolErrorKind::QueryRejected);
    assert!(spy.queries.lock().unwrap().is_empty());
    assert_eq!(result.output_json()["kind"], "query_rejected");
}

#[tokio::test]
async fn test_allowed_query_runs_normalized_sql() {
    let (_dir, spy, executor) = executor();
    let call = ToolCall::new("c1", "sql_query", json!({"sql": "SELECT count(*) AS n FROM customers;"}));

    let result = executor.execute(&call).await;

    assert!(!result.is_error(), "{:?}", result.output);
    // One row past the injected limit is fetched to detect truncation
    let queries = spy.queries.lock().unwrap();
    assert_eq!(queries.as_slice(), ["SELECT count(*) AS n FROM customers LIMIT 101"]);
    let output = result.output_json();
    assert_eq!(output["sql"], "SELECT count(*) AS n FROM customers LIMIT 100");
    assert_eq!(output["rowcount"], 1);
}

#[tokio::test]
async fn test_custom_guard_caps_apply() {
    let (_dir, spy, executor) = executor();
    let executor = executor.with_guard(SqlGuard::new(10, 50));
    let call = ToolCall::new("c1", "sql_query", json!({"sql": "SELECT name FROM customers LIMIT 500"}));

    let result = executor.execute(&call).await;

    assert!(!result.is_error(), "{:?}", result.output);
    assert_eq!(result.output_json()["sql"], "SELECT name FROM customers LIMIT 50");
    assert_eq!(
        spy.queries.lock().unwrap().as_slice(),
        ["SELECT name FROM customers LIMIT 51"]
    );
}

#[tokio::test]
async fn test_file_tools_cannot_touch_the_database() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("agent.db");
    let database = Database::open(&db_path).unwrap();
    let workspace = Workspace::new(dir.path()).unwrap().protect(&db_path);
    let executor = ToolExecutor::new(standard_registry(workspace, Arc::new(database)));

    let call = ToolCall::new("w", "write_file", json!({"path": "agent.db", "content": "oops"}));
    let result = executor.execute(&call).await;

    let err = result.error().expect("expected an error");
    assert_eq!(err.kind, ToolErrorKind::ExecutionFailed);
    assert!(err.message.contains("reserved"), "{}", err.message);
    assert_ne!(std::fs::read(&db_path).unwrap(), b"oops");

    let listing = executor
        .execute(&ToolCall::new("l", "list_files", json!({})))
        .await
        .output_json();
    assert_eq!(listing["files"], json!([]));
}

/// Real database with 600 numbered rows in `t`
async fn numbered_rows() -> (TempDir, ToolExecutor) {
    let dir = TempDir::new().unwrap();
    let database = Database::open_in_memory().unwrap();
    database
        .execute_batch(
            "CREATE TABLE t (id INTEGER PRIMARY KEY);
             WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < 600)
             INSERT INTO t (id) SELECT i FROM n;",
        )
        .await
        .unwrap();
    let registry = standard_registry(Workspace::new(dir.path()).unwrap(), Arc::new(database));
    (dir, ToolExecutor::new(registry))
}

#[tokio::test]
async fn test_injected_limit_marks_truncated() {
    let (_dir, executor) = numbered_rows().await;
    let call = ToolCall::new("c1", "sql_query", json!({"sql": "SELECT id FROM t"}));

    let output = executor.execute(&call).await.output_json();

    assert_eq!(output["sql"], "SELECT id FROM t LIMIT 100");
    assert_eq!(output["rowcount"], 100);
    assert_eq!(output["truncated"], true);
}

#[tokio::test]
async fn test_clamped_limit_is_rewritten() {
    let (_dir, executor) = numbered_rows().await;
    let call = ToolCall::new(
        "c1",
        "sql_query",
        json!({"sql": "SELECT id FROM t LIMIT 5000", "max_rows": 1000}),
    );

    let output = executor.execute(&call).await.output_json();

    assert_eq!(output["sql"], "SELECT id FROM t LIMIT 1000");
    assert_eq!(output["rowcount"], 600);
    assert_eq!(output["truncated"], false);
}

#[tokio::test]
async fn test_max_rows_sets_injected_limit() {
    let (_dir, executor) = numbered_rows().await;

    let call = ToolCall::new("c1", "sql_query", json!({"sql": "SELECT id FROM t", "max_rows": 500}));
    let output = executor.execute(&call).await.output_json();
    assert_eq!(output["sql"], "SELECT id FROM t LIMIT 500");
    assert_eq!(output["rowcount"], 500);
    assert_eq!(output["truncated"], true);

    let call = ToolCall::new("c2", "sql_query", json!({"sql": "SELECT id FROM t", "max_rows": 1000}));
    let output = executor.execute(&call).await.output_json();
    assert_eq!(output["rowcount"], 600);
    assert_eq!(output["truncated"], false);
}

#[tokio::test]
async fn test_own_small_limit_is_not_truncated() {
    let (_dir, executor) = numbered_rows().await;
    let call = ToolCall::new("c1", "sql_query", json!({"sql": "SELECT id FROM t LIMIT 5"}));

    let output = executor.execute(&call).await.output_json();

    assert_eq!(output["rowcount"], 5);
    assert_eq!(output["truncated"], false);
}

#[tokio::test]
async fn test_negative_max_rows_is_invalid() {
    let (_dir, spy, executor) = executor();
    let call = ToolCall::new("c1", "sql_query", json!({"sql": "SELECT 1", "max_rows": -5}));

    let result = executor.execute(&call).await;

    assert_eq!(result.error().unwrap().kind, ToolErrorKind::InvalidArguments);
    assert!(spy.queries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_tool_has_no_side_effect() {
    let (dir, spy, executor) = executor();
    let call = ToolCall::new("c1", "delete_everything", json!({"path": "x"}));

    let result = executor.execute(&call).await;

    assert_eq!(result.error().unwrap().kind, ToolErrorKind::UnknownTool);
    assert!(spy.queries.lock().unwrap().is_empty());
    assert_eq!(spy.schema_calls.load(Ordering::SeqCst), 0);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_missing_required_argument() {
    let (dir, _spy, executor) = executor();
    let call = ToolCall::new("c1", "write_file", json!({"path": "notes.txt"}));

    let result = executor.execute(&call).await;

    assert_eq!(result.error().unwrap().kind, ToolErrorKind::InvalidArguments);
    assert!(!dir.path().join("notes.txt").exists());
}

#[tokio::test]
async fn test_wrong_argument_kind() {
    let (_dir, spy, executor) = executor();
    let call = ToolCall::new("c1", "sql_query", json!({"sql": 42}));

    let result = executor.execute(&call).await;

    assert_eq!(result.error().unwrap().kind, ToolErrorKind::InvalidArguments);
    assert!(spy.queries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unparsable_arguments_rejected() {
    let (_dir, _spy, executor) = executor();
    let call = ToolCall::new("c1", "read_file", Value::String("{not json".to_string()));

    let result = executor.execute(&call).await;

    assert_eq!(result.error().unwrap().kind, ToolErrorKind::InvalidArguments);
}

#[tokio::test]
async fn test_execution_failure_is_data() {
    let (_dir, _spy, executor) = executor();
    let call = ToolCall::new("c1", "read_file", json!({"path": "missing.txt"}));

    let result = executor.execute(&call).await;

    let err = result.error().unwrap();
    assert_eq!(err.kind, ToolErrorKind::ExecutionFailed);
    assert!(err.message.contains("missing.txt"));
}

#[tokio::test]
async fn test_file_round_trip_through_executor() {
    let (_dir, _spy, executor) = executor();

    let write = ToolCall::new(
        "w",
        "write_file",
        json!({"path": "reports/q1.md", "content": "Revenue up", "title": "Save report"}),
    );
    let result = executor.execute(&write).await;
    assert_eq!(result.output_json()["bytes"], 10);

    let read = ToolCall::new("r", "read_file", json!({"path": "reports/q1.md"}));
    let output = executor.execute(&read).await.output_json();
    assert_eq!(output["content"], "Revenue up");
    assert_eq!(output["truncated"], false);

    let list = ToolCall::new("l", "list_files", json!({}));
    let output = executor.execute(&list).await.output_json();
    assert_eq!(output["files"], json!(["reports/q1.md"]));
}
