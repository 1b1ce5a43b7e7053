// Stored transcripts reproduce the live tool-call/tool-result pairing

mod common;

use common::{Fixture, ScriptedProvider};
use datachat::conversation::ToolCall;
use datachat::orchestrator::{TurnEvent, TurnRequest};
use datachat::providers::ProviderResponse;
use datachat::session::{pair_tool_exchanges, JsonSessionStore, SessionStore};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// id -> (arguments, output) as seen on the wire
fn live_pairs(events: &[TurnEvent]) -> BTreeMap<String, (Value, Value)> {
    let mut pairs: BTreeMap<String, (Value, Value)> = BTreeMap::new();
    for event in events {
        match event {
            TurnEvent::ToolCall { id, arguments, .. } => {
                pairs.insert(id.clone(), (arguments.clone(), Value::Null));
            }
            TurnEvent::ToolResult { id, output, .. } => {
                if let Some(pair) = pairs.get_mut(id) {
                    pair.1 = output.clone();
                }
            }
            _ => {}
        }
    }
    pairs
}

#[tokio::test]
async fn test_replay_matches_live_stream() {
    let fixture = Fixture::new().await;
    let store = Arc::new(JsonSessionStore::open(fixture.dir.path().join("sessions.json")).unwrap());
    store.create("chat", None, None).await.unwrap();
    let provider = Arc::new(ScriptedProvider::new(vec![
        ProviderResponse::tool_calls(vec![
            ToolCall::new("s", "sql_schema", json!({})),
            ToolCall::new("q", "sql_query", json!({"sql": "SELECT name FROM customers WHERE id = ?", "params": [2]})),
        ]),
        ProviderResponse::tool_calls(vec![
            ToolCall::new("bad", "sql_query", json!({"sql": "UPDATE customers SET name = 'x'"})),
            ToolCall::new("w", "write_file", json!({"path": "answer.txt", "content": "Grace"})),
        ]),
        ProviderResponse::text("Customer 2 is Grace."),
    ]));
    let orch = Arc::new(fixture.orchestrator(provider).with_store(store.clone()));

    let (events, _) = orch
        .start_turn(TurnRequest::new("chat", "Who is customer 2?"), CancellationToken::new())
        .collect()
        .await
        .unwrap();

    let live = live_pairs(&events);
    assert_eq!(live.len(), 4);

    // Reopen from disk to replay what was actually persisted
    let reopened = JsonSessionStore::open(fixture.dir.path().join("sessions.json")).unwrap();
    let stored = reopened.load("chat").await.unwrap();
    let replayed = pair_tool_exchanges(&stored);

    assert_eq!(replayed.len(), live.len());
    for (id, (arguments, output)) in &live {
        let exchange = &replayed[id];
        assert_eq!(&exchange.arguments, arguments, "arguments of {}", id);
        assert_eq!(exchange.output.as_ref(), Some(output), "output of {}", id);
    }
    assert_eq!(replayed["q"].output.as_ref().unwrap()["rows"], json!([["Grace"]]));
    assert_eq!(replayed["bad"].output.as_ref().unwrap()["kind"], "query_rejected");
}
