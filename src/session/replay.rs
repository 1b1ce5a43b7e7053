// Tool exchange replay
//
// Re-derives the tool_call -> tool_result pairing from a stored transcript.
// Given the messages a turn persisted, this yields the same id -> {arguments,
// output} mapping the live event stream carried.

use crate::conversation::{Message, Role};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// One call and its recorded output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolExchange {
    pub name: String,
    pub arguments: Value,
    /// Parsed tool message content; `None` when no result was recorded
    pub output: Option<Value>,
}

/// Pair every tool call with the `tool` message answering it.
///
/// A tool message only answers calls issued by the closest preceding
/// assistant message. Results whose content isn't JSON are kept as strings.
pub fn pair_tool_exchanges(messages: &[Message]) -> BTreeMap<String, ToolExchange> {
    let mut exchanges = BTreeMap::new();
    let mut open: Vec<String> = Vec::new();

    for message in messages {
        match message.role {
            Role::Assistant => {
                open.clear();
                for call in &message.tool_calls {
                    exchanges.insert(
                        call.id.clone(),
                        ToolExchange {
                            name: call.name.clone(),
                            arguments: call.arguments.clone(),
                            output: None,
                        },
                    );
                    open.push(call.id.clone());
                }
            }
            Role::Tool => {
                let Some(id) = message.tool_call_id.as_deref() else {
                    continue;
                };
                if !open.iter().any(|o| o == id) {
                    tracing::debug!("Tool message {} answers no open call", id);
                    continue;
                }
                if let Some(exchange) = exchanges.get_mut(id) {
                    let content = message.text();
                    exchange.output = Some(
                        serde_json::from_str(content)
                            .unwrap_or_else(|_| Value::String(content.to_string())),
                    );
                }
            }
            Role::User | Role::System => open.clear(),
        }
    }

    exchanges
}
