// OpenAI-compatible chat completions provider
//
// Works against OpenAI and compatible gateways (OpenRouter, local servers)
// that accept the `/chat/completions` tool-calling format.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use super::retry::{with_retry, ApiError, RetryPolicy};
use super::types::{ProviderRequest, ProviderResponse};
use super::LlmProvider;
use crate::config::ModelConfig;
use crate::conversation::{Message, Role, ToolCall};

const REQUEST_TIMEOUT_SECS: u64 = 120;

/// OpenAI-compatible API provider
#[derive(Clone)]
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
    default_model: String,
    provider_name: String,
    extra_body: Option<Value>,
    retry: RetryPolicy,
}

impl OpenAIProvider {
    /// Create a provider for `base_url` (including the version segment,
    /// e.g. "https://api.openai.com/v1")
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        Self::build(api_key.into(), base_url.into(), &Default::default())
    }

    /// Create a provider from model configuration
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let mut provider = Self::build(
            config.api_key.clone(),
            config.base_url.clone(),
            &config.default_headers,
        )?
        .with_model(config.model.clone());
        provider.extra_body = config.extra_body.clone();
        Ok(provider)
    }

    fn build(
        api_key: String,
        base_url: String,
        headers: &std::collections::HashMap<String, String>,
    ) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("Invalid header name: {}", name))?;
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("Invalid value for header {}", name))?;
            default_headers.insert(name, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .default_headers(default_headers)
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = base_url.trim_end_matches('/').to_string();
        let provider_name = if base_url.contains("openrouter.ai") {
            "openrouter"
        } else {
            "openai"
        }
        .to_string();

        Ok(Self {
            client,
            api_key,
            base_url,
            default_model: crate::config::constants::DEFAULT_MODEL.to_string(),
            provider_name,
            extra_body: None,
            retry: RetryPolicy::default(),
        })
    }

    /// Set custom model for this provider
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Convert ProviderRequest to OpenAI API format
    fn to_openai_request(&self, request: &ProviderRequest) -> OpenAIRequest {
        let model = if request.model.is_empty() {
            self.default_model.clone()
        } else {
            request.model.clone()
        };

        let mut messages: Vec<OpenAIMessage> = Vec::new();

        // Prepend system prompt as a {"role":"system"} message (OpenAI convention)
        if let Some(system) = &request.system {
            messages.push(OpenAIMessage::Regular {
                role: "system".to_string(),
                content: system.clone(),
            });
        }

        for msg in &request.messages {
            messages.push(to_openai_message(msg));
        }

        let tools: Option<Vec<OpenAITool>> = request.tools.as_ref().map(|defs| {
            defs.iter()
                .map(|tool| OpenAITool {
                    tool_type: "function".to_string(),
                    function: OpenAIFunction {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: tool.input_schema.to_json(),
                    },
                })
                .collect()
        });
        let tool_choice = tools.as_ref().map(|_| "auto".to_string());

        OpenAIRequest {
            model,
            messages,
            max_tokens: Some(request.max_tokens),
            temperature: request.temperature,
            tools,
            tool_choice,
        }
    }

    /// Request body with `extra_body` merged in at the top level
    fn request_body(&self, request: &ProviderRequest) -> Result<Value> {
        let mut body = serde_json::to_value(self.to_openai_request(request))
            .context("Failed to serialize request")?;
        if let (Some(Value::Object(extra)), Some(obj)) = (&self.extra_body, body.as_object_mut()) {
            for (key, value) in extra {
                obj.insert(key.clone(), value.clone());
            }
        }
        Ok(body)
    }

    /// Convert OpenAI response to ProviderResponse
    fn from_openai_response(&self, response: OpenAIResponse) -> Result<ProviderResponse> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .context("Model API returned no choices in response")?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .filter(|call| call.tool_type.as_deref().unwrap_or("function") == "function")
            .map(|call| {
                let id = match call.id {
                    Some(id) if !id.is_empty() => id,
                    _ => ToolCall::generate_id(),
                };
                ToolCall::new(id, call.function.name, parse_arguments(&call.function.arguments))
            })
            .collect();

        Ok(ProviderResponse {
            id: response.id.unwrap_or_default(),
            model: response.model.unwrap_or_default(),
            content: choice.message.content,
            tool_calls,
            stop_reason: choice.finish_reason,
            provider: self.provider_name.clone(),
        })
    }

    /// Send a single request (no retry)
    async fn send_message_once(&self, request: &ProviderRequest) -> Result<ProviderResponse> {
        let body = self.request_body(request)?;
        let url = format!("{}/chat/completions", self.base_url);

        tracing::debug!("Sending request to {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to send request to model API")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ApiError {
                status: status.as_u16(),
                body: error_body,
            }
            .into());
        }

        let openai_response: OpenAIResponse = response
            .json()
            .await
            .context("Failed to parse model API response")?;

        tracing::debug!("Received response: {:?}", openai_response);

        self.from_openai_response(openai_response)
    }
}

#[async_trait]
impl LlmProvider for OpenAIProvider {
    async fn send_message(&self, request: &ProviderRequest) -> Result<ProviderResponse> {
        with_retry(self.retry, || self.send_message_once(request)).await
    }

    fn name(&self) -> &str {
        &self.provider_name
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}

fn to_openai_message(msg: &Message) -> OpenAIMessage {
    match msg.role {
        Role::Assistant if msg.has_tool_calls() => OpenAIMessage::Assistant {
            role: "assistant".to_string(),
            content: msg.content.clone().filter(|c| !c.is_empty()),
            tool_calls: Some(
                msg.tool_calls
                    .iter()
                    .map(|call| OpenAIRequestToolCall {
                        id: call.id.clone(),
                        tool_type: "function".to_string(),
                        function: OpenAIRequestFunction {
                            name: call.name.clone(),
                            arguments: encode_arguments(&call.arguments),
                        },
                    })
                    .collect(),
            ),
        },
        Role::Tool => OpenAIMessage::Tool {
            role: "tool".to_string(),
            content: match msg.text() {
                "" => "(no output)".to_string(),
                text => text.to_string(),
            },
            tool_call_id: msg.tool_call_id.clone().unwrap_or_default(),
        },
        role => OpenAIMessage::Regular {
            role: role.as_str().to_string(),
            content: msg.text().to_string(),
        },
    }
}

/// Arguments as the JSON-encoded string the API expects. Raw text the model
/// sent (unparsable) is passed back unchanged.
fn encode_arguments(arguments: &Value) -> String {
    match arguments {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

/// Parse the model's argument string. Empty means no arguments; anything
/// unparsable is kept as raw text so the executor can reject it.
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

// OpenAI API types

#[derive(Debug, Clone, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAITool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
}

/// OpenAI message format, request side only
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum OpenAIMessage {
    /// Tool result message (one per tool invocation)
    Tool {
        role: String, // "tool"
        content: String,
        tool_call_id: String,
    },
    /// Assistant message with tool calls
    Assistant {
        role: String, // "assistant"
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<OpenAIRequestToolCall>>,
    },
    /// Plain user / system / assistant message
    Regular { role: String, content: String },
}

/// Tool call entry inside an assistant message (request format)
#[derive(Debug, Clone, Serialize)]
struct OpenAIRequestToolCall {
    id: String,
    #[serde(rename = "type")]
    tool_type: String,
    function: OpenAIRequestFunction,
}

#[derive(Debug, Clone, Serialize)]
struct OpenAIRequestFunction {
    name: String,
    arguments: String, // JSON-encoded string
}

#[derive(Debug, Clone, Serialize)]
struct OpenAITool {
    #[serde(rename = "type")]
    tool_type: String,
    function: OpenAIFunction,
}

#[derive(Debug, Clone, Serialize)]
struct OpenAIFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAIToolCall>>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIToolCall {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type", default)]
    tool_type: Option<String>,
    function: OpenAIToolFunction,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIToolFunction {
    name: String,
    #[serde(default)]
    arguments: String, // JSON string
}
