// Request/response types for the model client
//
// Provider-agnostic: each provider converts these into its own wire format.

use crate::conversation::{Message, Role, ToolCall};
use crate::tools::types::ToolDefinition;
use serde::Serialize;

/// Request sent to a model provider
#[derive(Debug, Clone, Serialize)]
pub struct ProviderRequest {
    /// Conversation history, oldest first
    pub messages: Vec<Message>,

    /// Model name; empty means the provider's default
    pub model: String,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// System prompt, prepended as a `system` message by OpenAI-compatible
    /// providers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ProviderRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            model: String::new(), // Will be set by provider
            max_tokens: 4096,
            system: None,
            tools: None,
            temperature: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Declare tools; an empty list declares none
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = if tools.is_empty() { None } else { Some(tools) };
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Drop assistant tool-call messages whose calls were not all answered,
    /// together with the partial tool results that follow them.
    ///
    /// A turn cancelled between calls leaves such a gap in the stored
    /// history. OpenAI-compatible endpoints reject it with a 400, so it is
    /// removed before the next model call.
    pub fn sanitize_messages(&mut self) {
        let messages = std::mem::take(&mut self.messages);
        let mut kept = Vec::with_capacity(messages.len());
        let mut i = 0;

        while i < messages.len() {
            let message = &messages[i];
            if message.role != Role::Assistant || !message.has_tool_calls() {
                if message.role == Role::Tool
                    && !kept.last().is_some_and(|m: &Message| {
                        m.role == Role::Tool || m.has_tool_calls()
                    })
                {
                    // Stray result with no call before it
                    i += 1;
                    continue;
                }
                kept.push(message.clone());
                i += 1;
                continue;
            }

            let end = messages[i + 1..]
                .iter()
                .position(|m| m.role != Role::Tool)
                .map_or(messages.len(), |p| i + 1 + p);
            let results = &messages[i + 1..end];
            let answered = message.tool_calls.iter().all(|call| {
                results
                    .iter()
                    .any(|r| r.tool_call_id.as_deref() == Some(call.id.as_str()))
            });

            if answered {
                kept.extend_from_slice(&messages[i..end]);
            } else {
                tracing::debug!(
                    "Dropping unanswered tool calls: {:?}",
                    message.tool_calls.iter().map(|c| &c.id).collect::<Vec<_>>()
                );
            }
            i = end;
        }

        self.messages = kept;
    }
}

/// Response from a model provider
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub id: String,
    pub model: String,
    /// Text content, if any
    pub content: Option<String>,
    /// Requested tool calls in the order the model emitted them
    pub tool_calls: Vec<ToolCall>,
    pub stop_reason: Option<String>,
    pub provider: String,
}

/// What the model asked for
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    /// Final answer
    Text(String),
    /// One or more tool calls, with any accompanying text
    ToolCalls {
        content: Option<String>,
        calls: Vec<ToolCall>,
    },
}

impl ProviderResponse {
    /// Response carrying only a final answer
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            model: String::new(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            stop_reason: Some("stop".to_string()),
            provider: String::new(),
        }
    }

    /// Response carrying tool calls
    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            id: String::new(),
            model: String::new(),
            content: None,
            tool_calls: calls,
            stop_reason: Some("tool_calls".to_string()),
            provider: String::new(),
        }
    }

    pub fn into_reply(self) -> ModelReply {
        if self.tool_calls.is_empty() {
            ModelReply::Text(self.content.unwrap_or_default())
        } else {
            ModelReply::ToolCalls {
                content: self.content.filter(|c| !c.is_empty()),
                calls: self.tool_calls,
            }
        }
    }
}
