// Shared fixtures for integration tests

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use datachat::config::TurnConfig;
use datachat::conversation::ToolCall;
use datachat::orchestrator::{Orchestrator, TurnEvent};
use datachat::providers::{LlmProvider, ProviderRequest, ProviderResponse};
use datachat::sql::Database;
use datachat::tools::executor::ToolExecutor;
use datachat::tools::implementations::standard_registry;
use datachat::tools::workspace::Workspace;
use serde_json::json;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Model double: replays canned replies, then falls back
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<ProviderResponse>>>,
    /// Once the script runs out, request `sql_schema` forever instead of answering
    loop_tools: bool,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<ProviderResponse>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Ok).collect()),
            loop_tools: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Never produces a final answer
    pub fn always_tools() -> Self {
        Self {
            loop_tools: true,
            ..Self::new(Vec::new())
        }
    }

    /// First call fails with `message`
    pub fn failing(message: &str) -> Self {
        let provider = Self::new(Vec::new());
        provider
            .replies
            .lock()
            .unwrap()
            .push_back(Err(anyhow::anyhow!(message.to_string())));
        provider
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn send_message(&self, request: &ProviderRequest) -> Result<ProviderResponse> {
        let n = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len()
        };
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(reply) => reply,
            None if self.loop_tools => Ok(ProviderResponse::tool_calls(vec![ToolCall::new(
                format!("call_{}", n),
                "sql_schema",
                json!({}),
            )])),
            None => Ok(ProviderResponse::text("Done.")),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted-model"
    }
}

/// Model that never answers; only cancellation ends its call
pub struct HangingProvider;

#[async_trait]
impl LlmProvider for HangingProvider {
    async fn send_message(&self, _request: &ProviderRequest) -> Result<ProviderResponse> {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Ok(ProviderResponse::text("too late"))
    }

    fn name(&self) -> &str {
        "hanging"
    }

    fn default_model(&self) -> &str {
        "hanging-model"
    }
}

/// Workspace and small SQLite database in a temp dir
pub struct Fixture {
    pub dir: TempDir,
    pub database: Database,
    pub executor: Arc<ToolExecutor>,
}

impl Fixture {
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let database = Database::open(&dir.path().join("agent.db")).unwrap();
        database
            .execute_batch(
                "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
                 INSERT INTO customers (name) VALUES ('Ada'), ('Grace'), ('Linus');",
            )
            .await
            .unwrap();
        let workspace = Workspace::new(dir.path().join("files")).unwrap();
        let executor = Arc::new(ToolExecutor::new(standard_registry(
            workspace,
            Arc::new(database.clone()),
        )));
        Self {
            dir,
            database,
            executor,
        }
    }

    pub fn orchestrator(&self, provider: Arc<ScriptedProvider>) -> Orchestrator {
        Orchestrator::new(provider, self.executor.clone(), TurnConfig::default())
    }
}

/// Ordering guarantees every turn's stream must satisfy
pub fn assert_well_formed(events: &[TurnEvent]) {
    let terminals = events.iter().filter(|e| e.is_terminal()).count();
    assert!(terminals <= 1, "more than one terminal event: {:?}", events);
    if terminals == 1 {
        assert!(events.last().unwrap().is_terminal(), "terminal event not last");
    }

    let mut announced = HashSet::new();
    for event in events {
        match event {
            TurnEvent::ToolCall { id, .. } => {
                announced.insert(id.clone());
            }
            TurnEvent::ToolResult { id, .. } => {
                assert!(announced.contains(id), "tool_result {} before its tool_call", id)
            }
            _ => {}
        }
    }
}
