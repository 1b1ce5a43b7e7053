// Turn log: one JSONL record per finished turn

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// Summary of a finished turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// Unique ID for this record
    pub id: String,

    pub timestamp: DateTime<Utc>,

    pub session_id: String,

    pub user_message: String,

    /// Final answer; absent when the turn failed or was cancelled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<String>,

    pub model: String,

    /// Tool names in call order (repeats kept)
    pub tools_used: Vec<String>,

    /// Model calls made
    pub cycles: usize,

    /// "completed", "failed" or "cancelled"
    pub status: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub duration_ms: i64,
}

impl TurnRecord {
    pub fn new(session_id: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            session_id: session_id.into(),
            user_message: user_message.into(),
            final_answer: None,
            model: String::new(),
            tools_used: Vec::new(),
            cycles: 0,
            status: String::new(),
            error: None,
            duration_ms: 0,
        }
    }
}

/// Appends `TurnRecord`s to a JSONL file
pub struct TurnLogger {
    path: PathBuf,
    // Serializes appends from concurrent turns
    lock: Mutex<()>,
}

impl TurnLogger {
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .context("Failed to create turn log directory")?;
            }
        }

        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, record: &TurnRecord) -> Result<()> {
        let json = serde_json::to_string(record).context("Failed to serialize turn record")?;
        let _guard = self.lock.lock().await;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .context("Failed to open turn log")?;
        writeln!(file, "{}", json).context("Failed to write turn record")?;

        debug!("Logged turn {} to {}", record.id, self.path.display());
        Ok(())
    }

    /// Read every record back; unparsable lines are skipped
    pub fn read_all(&self) -> Result<Vec<TurnRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.path).context("Failed to read turn log")?;

        Ok(contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    debug!("Skipping malformed turn record: {}", e);
                    None
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_append_and_read_back() {
        let dir = TempDir::new().unwrap();
        let logger = TurnLogger::new(dir.path().join("logs").join("turns.jsonl")).unwrap();

        let mut record = TurnRecord::new("s1", "How many orders?");
        record.final_answer = Some("300 orders.".to_string());
        record.tools_used = vec!["sql_query".to_string()];
        record.cycles = 2;
        record.status = "completed".to_string();

        logger.append(&record).await.unwrap();
        logger.append(&TurnRecord::new("s1", "again")).await.unwrap();

        let records = logger.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], record);
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        let logger = TurnLogger::new(dir.path().join("none.jsonl")).unwrap();
        assert!(logger.read_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_lines_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("turns.jsonl");
        std::fs::write(&path, "garbage\n\n").unwrap();
        let logger = TurnLogger::new(path).unwrap();
        logger.append(&TurnRecord::new("s", "q")).await.unwrap();
        assert_eq!(logger.read_all().unwrap().len(), 1);
    }
}
