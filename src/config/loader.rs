// Configuration loader
// Loads settings from ~/.datachat/config.toml (or an explicit path), then
// applies environment overrides.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use super::settings::{Config, ModelConfig, ServerConfig, TurnConfig};

/// Load configuration from a TOML file (optional) plus environment.
///
/// An explicit `path` must exist. Without one, `~/.datachat/config.toml`
/// is used when present.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let file = match path {
        Some(p) => Some(read_toml(p)?),
        None => match default_config_path() {
            Some(p) if p.exists() => Some(read_toml(&p)?),
            _ => None,
        },
    };

    let mut config = build_config(file.unwrap_or_default(), |key| std::env::var(key).ok())?;

    fs::create_dir_all(&config.workspace_dir).with_context(|| {
        format!(
            "Failed to create workspace directory: {}",
            config.workspace_dir.display()
        )
    })?;
    if let Ok(abs) = config.workspace_dir.canonicalize() {
        config.workspace_dir = abs;
    }

    config
        .validate()
        .context("Configuration validation failed")?;

    Ok(config)
}

fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".datachat").join("config.toml"))
}

/// On-disk TOML layout. Every section is optional.
#[derive(Debug, Default, Deserialize)]
struct TomlConfig {
    #[serde(default)]
    model: Option<ModelConfig>,
    #[serde(default)]
    server: Option<ServerConfig>,
    #[serde(default)]
    turn: Option<TurnConfig>,
    #[serde(default)]
    workspace_dir: Option<PathBuf>,
    #[serde(default)]
    database_url: Option<String>,
    #[serde(default)]
    sessions_path: Option<PathBuf>,
    #[serde(default)]
    turn_log_path: Option<PathBuf>,
}

fn read_toml(path: &Path) -> Result<TomlConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("Failed to parse configuration file: {}", path.display()))
}

/// Merge file settings with environment overrides.
///
/// `env` is injected so tests can run without touching process state.
fn build_config<F>(file: TomlConfig, env: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| env(key).filter(|v| !v.trim().is_empty());

    let workspace_dir = get("WORKSPACE_DIR")
        .map(PathBuf::from)
        .or(file.workspace_dir)
        .unwrap_or_else(|| PathBuf::from("workspace"));

    let mut config = Config::for_workspace(workspace_dir);

    if let Some(model) = file.model {
        config.model = model;
    }
    if let Some(server) = file.server {
        config.server = server;
    }
    if let Some(turn) = file.turn {
        config.turn = turn;
    }
    if let Some(url) = file.database_url {
        config.database_url = url;
    }
    if let Some(path) = file.sessions_path {
        config.sessions_path = path;
    }
    config.turn_log_path = file.turn_log_path;

    // Prefer OPENAI_API_KEY but fall back to OPENROUTER_API_KEY
    if let Some(key) = get("OPENAI_API_KEY").or_else(|| get("OPENROUTER_API_KEY")) {
        config.model.api_key = key;
    }
    if let Some(url) = get("OPENAI_BASE_URL") {
        config.model.base_url = url;
    }
    if let Some(model) = get("OPENAI_MODEL") {
        config.model.model = model;
    }

    let host = get("APP_HOST");
    let port = get("APP_PORT")
        .map(|p| {
            p.parse::<u16>()
                .with_context(|| format!("APP_PORT is not a valid port: {}", p))
        })
        .transpose()?;
    if host.is_some() || port.is_some() {
        let (default_host, default_port) = split_bind(&config.server.bind_address);
        config.server.bind_address = format!(
            "{}:{}",
            host.unwrap_or(default_host),
            port.unwrap_or(default_port)
        );
    }

    if let Some(url) = get("DATABASE_URL") {
        config.database_url = url;
    }
    if let Some(path) = get("SESSIONS_PATH") {
        config.sessions_path = PathBuf::from(path);
    }
    if let Some(path) = get("TURN_LOG_PATH") {
        config.turn_log_path = Some(PathBuf::from(path));
    }
    if let Some(cycles) = get("MAX_CYCLES") {
        config.turn.max_cycles = cycles
            .parse()
            .with_context(|| format!("MAX_CYCLES is not a number: {}", cycles))?;
    }

    // OpenRouter attribution headers and latency-first routing
    if config.model.base_url.contains("openrouter.ai") {
        if let Some(site) = get("OPENROUTER_SITE_URL") {
            config
                .model
                .default_headers
                .insert("HTTP-Referer".to_string(), site.trim().to_string());
        }
        let title = get("OPENROUTER_APP_NAME").unwrap_or_else(|| "Datachat".to_string());
        config
            .model
            .default_headers
            .insert("X-Title".to_string(), title.trim().to_string());
        if config.model.extra_body.is_none() {
            config.model.extra_body = Some(serde_json::json!({"provider": {"sort": "latency"}}));
        }
    }

    Ok(config)
}

fn split_bind(addr: &str) -> (String, u16) {
    match addr.rsplit_once(':') {
        Some((host, port)) => (
            host.to_string(),
            port.parse()
                .unwrap_or(super::constants::DEFAULT_HTTP_PORT),
        ),
        None => (addr.to_string(), super::constants::DEFAULT_HTTP_PORT),
    }
}
