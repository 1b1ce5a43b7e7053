// Configuration structs

use super::constants::*;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Model client configuration (OpenAI-compatible endpoint)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// API key; empty means model calls will fail at request time
    #[serde(default)]
    pub api_key: String,

    /// API base including the version segment, e.g. "https://api.openai.com/v1"
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model name sent with every request
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Extra headers sent with every request (e.g. OpenRouter attribution)
    #[serde(default)]
    pub default_headers: HashMap<String, String>,

    /// Extra top-level JSON fields merged into every request body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_body: Option<serde_json::Value>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            default_headers: HashMap::new(),
            extra_body: None,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8000")
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Maximum accepted request body size in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Turn orchestration limits and prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnConfig {
    /// Hard cap on model/tool cycles per turn
    #[serde(default = "default_max_cycles")]
    pub max_cycles: usize,

    /// Words per streamed text chunk
    #[serde(default = "default_chunk_words")]
    pub chunk_words: usize,

    /// System prompt prepended to every model call
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            max_cycles: default_max_cycles(),
            chunk_words: default_chunk_words(),
            system_prompt: default_system_prompt(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub model: ModelConfig,

    pub server: ServerConfig,

    pub turn: TurnConfig,

    /// Root directory the file tools are confined to
    pub workspace_dir: PathBuf,

    /// SQLite database URL or path (see `database_path`)
    pub database_url: String,

    /// JSON session store location
    pub sessions_path: PathBuf,

    /// Optional JSONL file receiving one record per finished turn
    pub turn_log_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let workspace_dir = PathBuf::from("workspace");
        Self::for_workspace(workspace_dir)
    }
}

impl Config {
    /// Default configuration rooted at `workspace_dir`: the database and
    /// session store live inside the workspace.
    pub fn for_workspace(workspace_dir: PathBuf) -> Self {
        let db_path = workspace_dir.join("agent.db");
        let database_url = if db_path.is_absolute() {
            format!("sqlite://{}", db_path.display())
        } else {
            db_path.display().to_string()
        };
        let sessions_path = workspace_dir.join("sessions.json");
        Self {
            model: ModelConfig::default(),
            server: ServerConfig::default(),
            turn: TurnConfig::default(),
            workspace_dir,
            database_url,
            sessions_path,
            turn_log_path: None,
        }
    }

    /// Filesystem path of the SQLite database named by `database_url`.
    pub fn database_path(&self) -> PathBuf {
        parse_sqlite_path(&self.database_url)
    }

    /// Validate configuration and return helpful errors
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.turn.max_cycles == 0 {
            bail!("turn.max_cycles must be at least 1");
        }
        if self.turn.chunk_words == 0 {
            bail!("turn.chunk_words must be at least 1");
        }
        self.server
            .bind_address
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid bind address: {}", self.server.bind_address))?;
        if self.model.api_key.is_empty() {
            tracing::warn!("No API key configured; model calls will fail until one is set");
        }
        Ok(())
    }
}

/// Parse a sqlite URL into a filesystem path.
///
/// Accepts `sqlite:///abs/path.db`, `sqlite:////abs/path.db`,
/// `file:/abs/path.db`, and bare paths (returned unchanged).
pub fn parse_sqlite_path(database_url: &str) -> PathBuf {
    if let Some(rest) = database_url.strip_prefix("sqlite:") {
        // "sqlite:///abs" -> "/abs", "sqlite:////abs" -> "//abs" -> "/abs"
        let path = rest.strip_prefix("//").unwrap_or(rest);
        let path = if path.starts_with("//") { &path[1..] } else { path };
        return PathBuf::from(path);
    }
    if let Some(rest) = database_url.strip_prefix("file:") {
        let path = rest.strip_prefix("//").unwrap_or(rest);
        return PathBuf::from(path);
    }
    PathBuf::from(database_url)
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_bind_address() -> String {
    DEFAULT_HTTP_ADDR.to_string()
}

fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

fn default_max_cycles() -> usize {
    MAX_CYCLES
}

fn default_chunk_words() -> usize {
    DEFAULT_CHUNK_WORDS
}

pub fn default_system_prompt() -> String {
    "You are a data analyst who answers user questions using ONLY the data available in the \
     database via tools. Read-only policy: never modify data or schema; do not perform DDL/DML; \
     decline such requests.\n\n\
     Behavior:\n\
     - Use sql_schema first when unsure about available tables/columns or relationships.\n\
     - Translate natural language to correct SQLite SQL. Prefer explicit column lists.\n\
     - Use sql_query for SELECT/WITH (read-only). Queries without a LIMIT are capped at 100 rows.\n\
     - Do not invent tables or columns. If the question cannot be answered with current data, \
     say so and briefly explain what is missing.\n\
     - Prefer human-readable names over ids; join the owning table to fetch them.\n\n\
     Presentation: reply with one short, business-friendly sentence stating the key result. \
     No tables, code blocks or bullet lists unless the user asks for them."
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sqlite_triple_slash() {
        assert_eq!(
            parse_sqlite_path("sqlite:///tmp/agent.db"),
            PathBuf::from("/tmp/agent.db")
        );
    }

    #[test]
    fn test_parse_sqlite_quad_slash() {
        assert_eq!(
            parse_sqlite_path("sqlite:////tmp/agent.db"),
            PathBuf::from("/tmp/agent.db")
        );
    }

    #[test]
    fn test_parse_file_url_and_bare_path() {
        assert_eq!(parse_sqlite_path("file:/data/x.db"), PathBuf::from("/data/x.db"));
        assert_eq!(parse_sqlite_path("rel/x.db"), PathBuf::from("rel/x.db"));
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.database_path().ends_with("agent.db"));
    }

    #[test]
    fn test_zero_cycles_rejected() {
        let mut config = Config::default();
        config.turn.max_cycles = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_bind_address_rejected() {
        let mut config = Config::default();
        config.server.bind_address = "not an address".to_string();
        assert!(config.validate().is_err());
    }
}
