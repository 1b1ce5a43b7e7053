// HTTP handlers

use super::error::HttpError;
use super::AppState;
use crate::orchestrator::{TurnEvent, TurnRequest};
use crate::session::{new_session_id, SessionStore, DEFAULT_TITLE};
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use dashmap::mapref::entry::Entry;
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info};

pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn new_chat(State(state): State<Arc<AppState>>) -> Result<Json<Value>, HttpError> {
    let chat_id = new_session_id();
    state
        .store
        .create(&chat_id, Some(DEFAULT_TITLE), Some(state.orchestrator.model().to_string()))
        .await?;
    info!("Created chat {}", chat_id);
    Ok(Json(json!({ "chat_id": chat_id })))
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Run one turn and stream its events as NDJSON
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, HttpError> {
    let chat_id = non_empty(request.chat_id).ok_or_else(|| HttpError::bad_request("chat_id required"))?;
    let message = non_empty(request.message).ok_or_else(|| HttpError::bad_request("message required"))?;

    // One turn per conversation at a time
    let cancel = CancellationToken::new();
    match state.active.entry(chat_id.clone()) {
        Entry::Occupied(_) => {
            return Err(HttpError::conflict(format!(
                "A turn is already running for chat {}",
                chat_id
            )))
        }
        Entry::Vacant(slot) => {
            slot.insert(cancel.clone());
        }
    }
    let active = ActiveTurn {
        state: Arc::clone(&state),
        chat_id: chat_id.clone(),
        _cancel_on_drop: cancel.clone().drop_guard(),
    };

    state
        .store
        .create(&chat_id, Some(DEFAULT_TITLE), Some(state.orchestrator.model().to_string()))
        .await?;
    let history = state.store.load(&chat_id).await?;
    let handle = state.orchestrator.start_turn(
        TurnRequest::new(chat_id, message).with_history(history),
        cancel,
    );

    let body = TurnStream {
        events: ReceiverStream::new(handle.events),
        _active: active,
    };

    Ok((
        [
            (header::CONTENT_TYPE, "application/x-ndjson"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(body),
    )
        .into_response())
}

pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "sessions": state.store.list().await }))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, HttpError> {
    let session = state
        .store
        .get(&id)
        .await
        .ok_or_else(|| HttpError::not_found(format!("Unknown chat: {}", id)))?;
    Ok(Json(json!({
        "id": id,
        "title": session.title,
        "model": session.model,
        "created_at": session.created_at,
        "updated_at": session.updated_at,
        "messages": session.messages,
    })))
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub title: String,
}

pub async fn rename_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<RenameRequest>,
) -> Result<Json<Value>, HttpError> {
    let title = request.title.trim();
    if title.is_empty() {
        return Err(HttpError::bad_request("title required"));
    }
    if !state.store.rename(&id, title).await? {
        return Err(HttpError::not_found(format!("Unknown chat: {}", id)));
    }
    Ok(Json(json!({ "id": id, "title": title })))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, HttpError> {
    if let Some(token) = state.active.get(&id) {
        token.cancel();
    }
    if !state.store.delete(&id).await? {
        return Err(HttpError::not_found(format!("Unknown chat: {}", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn cancel_turn(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, HttpError> {
    let token = state
        .active
        .get(&id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| HttpError::not_found(format!("No running turn for chat {}", id)))?;
    token.cancel();
    info!("Cancelled turn for chat {}", id);
    Ok(Json(json!({ "cancelled": true })))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// NDJSON body of one turn. Owns the chat's registration, so a finished or
/// disconnected body cancels the turn and frees the chat for the next one.
struct TurnStream {
    events: ReceiverStream<TurnEvent>,
    _active: ActiveTurn,
}

impl Stream for TurnStream {
    type Item = Result<String, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.events)
            .poll_next(cx)
            .map(|event| event.map(|e| Ok(e.to_ndjson_line())))
    }
}

/// Registration of a running turn; removed when the response body is dropped
struct ActiveTurn {
    state: Arc<AppState>,
    chat_id: String,
    _cancel_on_drop: DropGuard,
}

impl Drop for ActiveTurn {
    fn drop(&mut self) {
        self.state.active.remove(&self.chat_id);
        debug!("Turn stream for chat {} closed", self.chat_id);
    }
}
