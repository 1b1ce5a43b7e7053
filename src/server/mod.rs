// HTTP transport
//
// Streams turn events to the browser as NDJSON and exposes the chat list.
// One turn per chat runs at a time; different chats run concurrently.

mod error;
mod handlers;

pub use error::{HttpError, HttpErrorBody, HttpErrorResponse};
pub use handlers::{
    cancel_turn, chat, delete_session, get_session, health_check, list_sessions, new_chat,
    rename_session, ChatRequest, RenameRequest,
};

use crate::config::Config;
use crate::logging::TurnLogger;
use crate::orchestrator::Orchestrator;
use crate::providers::OpenAIProvider;
use crate::session::JsonSessionStore;
use crate::sql::Database;
use crate::tools::executor::ToolExecutor;
use crate::tools::implementations::standard_registry;
use crate::tools::workspace::Workspace;
use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared state behind every handler
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub store: Arc<JsonSessionStore>,
    /// Cancellation tokens of running turns, by chat id
    pub(crate) active: DashMap<String, CancellationToken>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, store: Arc<JsonSessionStore>) -> Self {
        Self {
            orchestrator,
            store,
            active: DashMap::new(),
        }
    }

    /// Wire the model client, tools, database and session store from config
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = OpenAIProvider::from_config(&config.model)?;

        let database_path = config.database_path();
        let database = Database::open(&database_path)
            .with_context(|| format!("Failed to open database: {}", database_path.display()))?;
        let mut workspace = Workspace::new(config.workspace_dir.clone())?
            .protect(&database_path)
            .protect(&config.sessions_path);
        if let Some(path) = &config.turn_log_path {
            workspace = workspace.protect(path);
        }
        let executor = Arc::new(ToolExecutor::new(standard_registry(
            workspace,
            Arc::new(database),
        )));

        let store = Arc::new(JsonSessionStore::open(config.sessions_path.clone())?);

        let mut orchestrator =
            Orchestrator::new(Arc::new(provider), executor, config.turn.clone())
                .with_model_config(&config.model)
                .with_store(store.clone());
        if let Some(path) = &config.turn_log_path {
            orchestrator = orchestrator.with_turn_log(Arc::new(TurnLogger::new(path.clone())?));
        }

        tracing::info!(
            "Using model {} at {} (database {}, workspace {})",
            config.model.model,
            config.model.base_url,
            database_path.display(),
            config.workspace_dir.display()
        );

        Ok(Self::new(Arc::new(orchestrator), store))
    }

    /// Chats with a turn in progress
    pub fn active_turns(&self) -> usize {
        self.active.len()
    }
}

/// All routes, without body limit or tracing layers
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/new_chat", post(new_chat))
        .route("/api/chat", post(chat))
        .route("/api/sessions", get(list_sessions))
        .route(
            "/api/sessions/:id",
            get(get_session).patch(rename_session).delete(delete_session),
        )
        .route("/api/sessions/:id/cancel", post(cancel_turn))
        .with_state(state)
}

/// Router with the production layers applied
pub fn build_app(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    create_router(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Start the HTTP server and run until the process is stopped
pub async fn serve(config: &Config) -> Result<()> {
    let addr: SocketAddr = config
        .server
        .bind_address
        .parse()
        .with_context(|| format!("Invalid bind address: {}", config.server.bind_address))?;

    let state = Arc::new(AppState::from_config(config)?);
    let app = build_app(state, config.server.max_body_bytes);

    tracing::info!("Starting datachat server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
