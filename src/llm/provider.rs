use async_trait::async_trait;
use thiserror::Error;

use super::types::ChatRequest;

/// Errors reported by a hosted model provider.
///
/// Variants carry the provider's own message so callers can surface it
/// instead of a generic failure string.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("network error: {0}")]
    Network(String),
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// return the provider name (e.g. "openai")
    fn name(&self) -> &str;

    /// check if the provider is reachable with the configured credentials
    async fn health_check(&self) -> Result<bool, LlmError>;

    /// chat completion (non-streaming)
    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, LlmError>;

    /// generate embeddings, one vector per input, in input order
    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, LlmError>;
}
