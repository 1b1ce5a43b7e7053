// In-process session store for tests and one-shot CLI turns

use super::SessionStore;
use crate::conversation::Message;
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, Vec<Message>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn append(&self, session_id: &str, message: &Message) -> Result<()> {
        self.sessions
            .entry(session_id.to_string())
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Vec<Message>> {
        Ok(self
            .sessions
            .get(session_id)
            .map(|messages| messages.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_and_load() {
        let store = MemorySessionStore::new();
        store.append("s1", &Message::user("hi")).await.unwrap();
        store.append("s1", &Message::assistant("hello")).await.unwrap();

        let messages = store.load("s1").await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].text(), "hello");
        assert!(store.load("missing").await.unwrap().is_empty());
        assert_eq!(store.len(), 1);
    }
}
