// Model client
//
// The orchestrator talks to the model through `LlmProvider`. Retries belong
// here, never in the orchestrator.

use anyhow::Result;
use async_trait::async_trait;

pub mod openai;
pub mod retry;
pub mod types;

pub use openai::OpenAIProvider;
pub use retry::{with_retry, ApiError, RetryPolicy};
pub use types::{ModelReply, ProviderRequest, ProviderResponse};

/// Trait for LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send the conversation and wait for the complete response
    async fn send_message(&self, request: &ProviderRequest) -> Result<ProviderResponse>;

    /// Provider name (e.g., "openai", "openrouter")
    fn name(&self) -> &str;

    /// Model used when the request doesn't name one
    fn default_model(&self) -> &str;
}
