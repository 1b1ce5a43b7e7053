// JSON file session store
//
// All chats live in one document:
//   {"sessions": {"<id>": {title, created_at, updated_at, model, messages}}}
// The whole document is kept in memory and rewritten atomically (temp file +
// rename) after every change. Meant for local, single-process use.

use super::{title_from_message, SessionMeta, SessionStore, DEFAULT_TITLE};
use crate::conversation::{Message, Role};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    #[serde(default)]
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl StoredSession {
    fn new(title: impl Into<String>, model: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            title: title.into(),
            created_at: now,
            updated_at: now,
            model,
            messages: Vec::new(),
        }
    }

    fn meta(&self, id: &str) -> SessionMeta {
        SessionMeta {
            id: id.to_string(),
            title: self.title.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            model: self.model.clone(),
            message_count: self.messages.len(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default)]
    sessions: BTreeMap<String, StoredSession>,
}

pub struct JsonSessionStore {
    path: PathBuf,
    data: Mutex<SessionFile>,
}

impl JsonSessionStore {
    /// Open the store at `path`. A missing file starts empty; a corrupt one
    /// is logged and replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create session directory: {}", parent.display())
                })?;
            }
        }

        let data = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                tracing::warn!("Session file {} is corrupt, starting empty: {}", path.display(), e);
                SessionFile::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SessionFile::default(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read session file: {}", path.display()))
            }
        };

        tracing::debug!(
            "Loaded {} session(s) from {}",
            data.sessions.len(),
            path.display()
        );

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create an empty chat; no-op if `id` already exists
    pub async fn create(&self, id: &str, title: Option<&str>, model: Option<String>) -> Result<()> {
        let mut data = self.data.lock().await;
        if data.sessions.contains_key(id) {
            return Ok(());
        }
        data.sessions.insert(
            id.to_string(),
            StoredSession::new(title.unwrap_or(DEFAULT_TITLE), model),
        );
        self.save(&data)
    }

    /// Chat metadata, most recently updated first
    pub async fn list(&self) -> Vec<SessionMeta> {
        let data = self.data.lock().await;
        let mut metas: Vec<SessionMeta> = data
            .sessions
            .iter()
            .map(|(id, session)| session.meta(id))
            .collect();
        metas.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        metas
    }

    pub async fn get(&self, id: &str) -> Option<StoredSession> {
        self.data.lock().await.sessions.get(id).cloned()
    }

    /// Returns false when the chat doesn't exist
    pub async fn rename(&self, id: &str, title: &str) -> Result<bool> {
        self.update(id, |session| session.title = title.to_string())
            .await
    }

    pub async fn update_model(&self, id: &str, model: &str) -> Result<bool> {
        self.update(id, |session| session.model = Some(model.to_string()))
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        let mut data = self.data.lock().await;
        if data.sessions.remove(id).is_none() {
            return Ok(false);
        }
        self.save(&data)?;
        Ok(true)
    }

    async fn update<F>(&self, id: &str, f: F) -> Result<bool>
    where
        F: FnOnce(&mut StoredSession),
    {
        let mut data = self.data.lock().await;
        let Some(session) = data.sessions.get_mut(id) else {
            return Ok(false);
        };
        f(session);
        session.updated_at = Utc::now();
        self.save(&data)?;
        Ok(true)
    }

    fn save(&self, data: &SessionFile) -> Result<()> {
        let json = serde_json::to_string(data).context("Failed to serialize sessions")?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write session file: {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace session file: {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for JsonSessionStore {
    async fn append(&self, session_id: &str, message: &Message) -> Result<()> {
        let mut data = self.data.lock().await;
        // Unknown ids are an error: a chat deleted mid-turn stays deleted
        let session = data
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| anyhow!("Unknown session: {}", session_id))?;

        // First question names the chat
        if message.role == Role::User
            && (session.title.is_empty() || session.title == DEFAULT_TITLE)
            && !session.messages.iter().any(|m| m.role == Role::User)
        {
            session.title = title_from_message(message.text());
        }

        session.messages.push(message.clone());
        session.updated_at = Utc::now();
        self.save(&data)
    }

    async fn load(&self, session_id: &str) -> Result<Vec<Message>> {
        Ok(self
            .data
            .lock()
            .await
            .sessions
            .get(session_id)
            .map(|s| s.messages.clone())
            .unwrap_or_default())
    }
}
