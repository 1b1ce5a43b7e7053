// Session persistence
//
// The orchestrator only appends and loads. Chat metadata operations
// (create, rename, delete, ...) live on the concrete stores.

use crate::conversation::Message;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod json_store;
pub mod memory_store;
pub mod replay;

pub use json_store::JsonSessionStore;
pub use memory_store::MemorySessionStore;
pub use replay::{pair_tool_exchanges, ToolExchange};

/// Title given to chats until they are renamed
pub const DEFAULT_TITLE: &str = "New chat";

/// Store of conversation transcripts, keyed by session id
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Append one message. Stores that track chat lifecycles (create,
    /// delete) reject unknown sessions instead of recreating them.
    async fn append(&self, session_id: &str, message: &Message) -> Result<()>;

    /// Messages of a session in order; empty for unknown sessions
    async fn load(&self, session_id: &str) -> Result<Vec<Message>>;
}

/// Listing entry for a chat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMeta {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub message_count: usize,
}

/// Generate a chat id: 16 lowercase hex characters
pub fn new_session_id() -> String {
    use rand::Rng;
    let bytes: [u8; 8] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Title derived from the first user message
pub fn title_from_message(message: &str) -> String {
    const MAX_CHARS: usize = 60;
    let line = message.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim();
    if line.is_empty() {
        return DEFAULT_TITLE.to_string();
    }
    if line.chars().count() <= MAX_CHARS {
        line.to_string()
    } else {
        format!("{}...", line.chars().take(MAX_CHARS).collect::<String>().trim_end())
    }
}
