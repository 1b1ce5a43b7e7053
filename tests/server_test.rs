// HTTP transport: routes, validation and NDJSON streaming

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{Fixture, HangingProvider, ScriptedProvider};
use datachat::config::TurnConfig;
use datachat::orchestrator::{Orchestrator, TurnEvent};
use datachat::providers::{LlmProvider, ProviderResponse};
use datachat::server::{create_router, AppState};
use datachat::session::{JsonSessionStore, SessionStore};
use datachat::ToolCall;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    app: Router,
    state: Arc<AppState>,
    _fixture: Fixture,
}

async fn test_app(provider: Arc<dyn LlmProvider>) -> TestApp {
    let fixture = Fixture::new().await;
    let store = Arc::new(JsonSessionStore::open(fixture.dir.path().join("sessions.json")).unwrap());
    let orchestrator = Orchestrator::new(provider, fixture.executor.clone(), TurnConfig::default())
        .with_store(store.clone());
    let state = Arc::new(AppState::new(Arc::new(orchestrator), store));
    TestApp {
        app: create_router(state.clone()),
        state,
        _fixture: fixture,
    }
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn test_health() {
    let t = test_app(Arc::new(ScriptedProvider::new(vec![]))).await;
    let response = t.app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_new_chat_creates_session() {
    let t = test_app(Arc::new(ScriptedProvider::new(vec![]))).await;
    let response = t.app.clone().oneshot(post_json("/api/new_chat", json!({}))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let chat_id = body_json(response).await["chat_id"].as_str().unwrap().to_string();
    assert_eq!(chat_id.len(), 16);

    let response = t.app.oneshot(get("/api/sessions")).await.unwrap();
    let listing = body_json(response).await;
    assert_eq!(listing["sessions"][0]["id"], chat_id);
    assert_eq!(listing["sessions"][0]["message_count"], 0);
}

#[tokio::test]
async fn test_chat_requires_id_and_message() {
    let t = test_app(Arc::new(ScriptedProvider::new(vec![]))).await;

    let response = t
        .app
        .clone()
        .oneshot(post_json("/api/chat", json!({"message": "hi"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = t
        .app
        .oneshot(post_json("/api/chat", json!({"chat_id": "abc", "message": "  "})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_chat_streams_ndjson_and_persists() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        ProviderResponse::tool_calls(vec![ToolCall::new(
            "c1",
            "sql_query",
            json!({"sql": "SELECT count(*) AS n FROM customers"}),
        )]),
        ProviderResponse::text("You have 3 customers."),
    ]));
    let t = test_app(provider).await;

    let response = t
        .app
        .clone()
        .oneshot(post_json("/api/chat", json!({"chat_id": "abc", "message": "How many customers?"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/x-ndjson"
    );

    let bytes = body_bytes(response).await;
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.ends_with('\n'));
    let events: Vec<TurnEvent> = text
        .lines()
        .map(|line| TurnEvent::parse_line(line).unwrap())
        .collect();

    assert!(matches!(&events[0], TurnEvent::ToolCall { id, .. } if id == "c1"));
    match &events[1] {
        TurnEvent::ToolResult { output, .. } => assert_eq!(output["rows"], json!([[3]])),
        other => panic!("unexpected event: {:?}", other),
    }
    assert_eq!(events[2], TurnEvent::Chunk("You have 3 customers.".into()));
    assert_eq!(events[3], TurnEvent::Done);

    // Stream finished: the chat is free again and the transcript is stored
    assert_eq!(t.state.active_turns(), 0);
    assert_eq!(t.state.store.load("abc").await.unwrap().len(), 4);

    let response = t.app.oneshot(get("/api/sessions/abc")).await.unwrap();
    let session = body_json(response).await;
    assert_eq!(session["title"], "How many customers?");
    assert_eq!(session["messages"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_concurrent_turn_conflicts_and_cancel() {
    let t = test_app(Arc::new(HangingProvider)).await;
    let chat = json!({"chat_id": "busy", "message": "hello"});

    let first = t.app.clone().oneshot(post_json("/api/chat", chat.clone())).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = t.app.clone().oneshot(post_json("/api/chat", chat)).await.unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);

    let cancel = t
        .app
        .clone()
        .oneshot(post_json("/api/sessions/busy/cancel", json!({})))
        .await
        .unwrap();
    assert_eq!(cancel.status(), StatusCode::OK);

    // Cancelled turn ends its stream without a terminal event
    assert!(body_bytes(first).await.is_empty());
    assert_eq!(t.state.active_turns(), 0);

    let cancel = t
        .app
        .oneshot(post_json("/api/sessions/busy/cancel", json!({})))
        .await
        .unwrap();
    assert_eq!(cancel.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_dropped_body_frees_chat() {
    let t = test_app(Arc::new(HangingProvider)).await;
    let chat = json!({"chat_id": "gone", "message": "hello"});

    let response = t.app.clone().oneshot(post_json("/api/chat", chat.clone())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(t.state.active_turns(), 1);
    // The chat exists before its first message is stored
    assert!(t.state.store.get("gone").await.is_some());

    drop(response);
    assert_eq!(t.state.active_turns(), 0);

    let again = t.app.oneshot(post_json("/api/chat", chat)).await.unwrap();
    assert_eq!(again.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_session_rename_and_delete() {
    let t = test_app(Arc::new(ScriptedProvider::new(vec![]))).await;
    t.state.store.create("s1", None, None).await.unwrap();

    let rename = Request::builder()
        .method("PATCH")
        .uri("/api/sessions/s1")
        .header("content-type", "application/json")
        .body(Body::from(json!({"title": "Quarterly sales"}).to_string()))
        .unwrap();
    let response = t.app.clone().oneshot(rename).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(t.state.store.get("s1").await.unwrap().title, "Quarterly sales");

    let delete = || {
        Request::builder()
            .method("DELETE")
            .uri("/api/sessions/s1")
            .body(Body::empty())
            .unwrap()
    };
    let response = t.app.clone().oneshot(delete()).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = t.app.clone().oneshot(delete()).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = t.app.oneshot(get("/api/sessions/s1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
