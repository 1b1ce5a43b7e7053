// SQLite query backend
//
// - Single connection behind an async mutex (the store's own locking applies
//   to concurrent turns; no transaction wrapping here)
// - Rows are returned as JSON values, capped by the caller's max_rows

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Rows returned by a query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// More rows were available than `max_rows`
    pub truncated: bool,
}

/// Bind parameters for a query
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParams {
    None,
    Positional(Vec<Value>),
    Named(Map<String, Value>),
}

impl QueryParams {
    /// Positional (array), named (object), or a scalar wrapped as a single
    /// positional parameter.
    pub fn from_json(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => QueryParams::None,
            Some(Value::Array(items)) => QueryParams::Positional(items.clone()),
            Some(Value::Object(map)) => QueryParams::Named(map.clone()),
            Some(scalar) => QueryParams::Positional(vec![scalar.clone()]),
        }
    }
}

/// Read-side interface the SQL tools run against
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Execute `sql` and return at most `max_rows` rows
    async fn query(&self, sql: &str, params: &QueryParams, max_rows: usize)
        -> Result<QueryResult>;

    /// Describe tables, columns and row counts
    async fn schema(&self) -> Result<Value>;
}

/// SQLite database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl Database {
    /// Open (or create) the database file at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create directory: {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        tracing::info!("Database opened: {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Private in-memory database (tests, demos)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run a batch of statements (schema setup, seeding). Not exposed to tools.
    pub async fn execute_batch(&self, sql: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute_batch(sql).context("Failed to execute SQL batch")?;
        Ok(())
    }

    /// Run `f` with exclusive access to the connection
    pub async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock().await;
        f(&mut conn)
    }
}

#[async_trait]
impl QueryBackend for Database {
    async fn query(
        &self,
        sql: &str,
        params: &QueryParams,
        max_rows: usize,
    ) -> Result<QueryResult> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(sql)
            .with_context(|| format!("Failed to prepare query: {}", sql))?;

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let (rows, truncated) = match params {
            QueryParams::None => collect_rows(stmt.query([])?, width, max_rows)?,
            QueryParams::Positional(values) => {
                let values: Vec<SqlValue> = values.iter().map(json_to_sql).collect();
                collect_rows(stmt.query(params_from_iter(values.iter()))?, width, max_rows)?
            }
            QueryParams::Named(map) => {
                let names: Vec<String> = map.keys().map(|k| named_key(k)).collect();
                let values: Vec<SqlValue> = map.values().map(json_to_sql).collect();
                let named: Vec<(&str, &dyn ToSql)> = names
                    .iter()
                    .map(String::as_str)
                    .zip(values.iter().map(|v| v as &dyn ToSql))
                    .collect();
                collect_rows(stmt.query(named.as_slice())?, width, max_rows)?
            }
        };

        tracing::debug!("Query returned {} row(s), truncated={}", rows.len(), truncated);

        Ok(QueryResult {
            columns,
            rows,
            truncated,
        })
    }

    async fn schema(&self) -> Result<Value> {
        let conn = self.conn.lock().await;

        let table_names: Vec<String> = {
            let mut stmt = conn.prepare(
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )?;
            let names = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            names
        };

        let mut tables = Vec::with_capacity(table_names.len());
        for name in table_names {
            let quoted = name.replace('\'', "''");

            let mut info = conn.prepare(&format!("PRAGMA table_info('{}')", quoted))?;
            let columns = info
                .query_map([], |row| {
                    Ok(json!({
                        "cid": row.get::<_, i64>(0)?,
                        "name": row.get::<_, String>(1)?,
                        "type": row.get::<_, String>(2)?,
                        "notnull": row.get::<_, i64>(3)? != 0,
                        "default": value_ref_to_json(row.get_ref(4)?),
                        "pk": row.get::<_, i64>(5)? != 0,
                    }))
                })?
                .collect::<Result<Vec<Value>, _>>()?;

            let row_count: Option<i64> = conn
                .query_row(&format!("SELECT COUNT(*) FROM '{}'", quoted), [], |row| {
                    row.get(0)
                })
                .ok();

            tables.push(json!({
                "name": name,
                "columns": columns,
                "row_count": row_count,
            }));
        }

        Ok(json!({ "dialect": "sqlite", "tables": tables }))
    }
}

fn collect_rows(
    mut rows: rusqlite::Rows<'_>,
    width: usize,
    max_rows: usize,
) -> Result<(Vec<Vec<Value>>, bool)> {
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        if out.len() >= max_rows {
            return Ok((out, true));
        }
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            values.push(value_ref_to_json(row.get_ref(i)?));
        }
        out.push(values);
    }
    Ok((out, false))
}

/// SQLite named parameters need a sigil; accept keys with or without one
fn named_key(key: &str) -> String {
    if key.starts_with([':', '@', '$']) {
        key.to_string()
    } else {
        format!(":{}", key)
    }
}

fn json_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn value_ref_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => json!(i),
        ValueRef::Real(f) => json!(f),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(format!("<blob {} bytes>", b.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn fixture() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.execute_batch(
            "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT NOT NULL, score REAL);
             INSERT INTO t (name, score) VALUES ('a', 1.5), ('b', NULL), ('c', 3.0);",
        )
        .await
        .unwrap();
        db
    }

    #[tokio::test]
    async fn test_query_returns_columns_and_rows() {
        let db = fixture().await;
        let result = db
            .query("SELECT id, name, score FROM t ORDER BY id", &QueryParams::None, 10)
            .await
            .unwrap();
        assert_eq!(result.columns, vec!["id", "name", "score"]);
        assert_eq!(result.rows.len(), 3);
        assert_eq!(result.rows[0], vec![json!(1), json!("a"), json!(1.5)]);
        assert_eq!(result.rows[1][2], Value::Null);
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn test_query_truncates_at_max_rows() {
        let db = fixture().await;
        let result = db
            .query("SELECT id FROM t", &QueryParams::None, 2)
            .await
            .unwrap();
        assert_eq!(result.rows.len(), 2);
        assert!(result.truncated);
    }

    #[tokio::test]
    async fn test_positional_and_named_params() {
        let db = fixture().await;
        let positional = QueryParams::from_json(Some(&json!(["b"])));
        let result = db
            .query("SELECT id FROM t WHERE name = ?", &positional, 10)
            .await
            .unwrap();
        assert_eq!(result.rows, vec![vec![json!(2)]]);

        let named = QueryParams::from_json(Some(&json!({"name": "c"})));
        let result = db
            .query("SELECT id FROM t WHERE name = :name", &named, 10)
            .await
            .unwrap();
        assert_eq!(result.rows, vec![vec![json!(3)]]);
    }

    #[tokio::test]
    async fn test_scalar_param_is_wrapped() {
        let db = fixture().await;
        let params = QueryParams::from_json(Some(&json!(1)));
        assert_eq!(params, QueryParams::Positional(vec![json!(1)]));
        let result = db
            .query("SELECT name FROM t WHERE id = ?", &params, 10)
            .await
            .unwrap();
        assert_eq!(result.rows, vec![vec![json!("a")]]);
    }

    #[tokio::test]
    async fn test_schema_lists_tables() {
        let db = fixture().await;
        let schema = db.schema().await.unwrap();
        assert_eq!(schema["dialect"], "sqlite");
        let table = &schema["tables"][0];
        assert_eq!(table["name"], "t");
        assert_eq!(table["row_count"], 3);
        assert_eq!(table["columns"][0]["name"], "id");
        assert_eq!(table["columns"][0]["pk"], true);
        assert_eq!(table["columns"][1]["notnull"], true);
    }

    #[tokio::test]
    async fn test_bad_sql_is_an_error() {
        let db = fixture().await;
        let result = db.query("SELECT * FROM missing", &QueryParams::None, 10).await;
        assert!(result.is_err());
    }
}
