use crate::{
    error::LlmError,
    types::{CompletionRequest, CompletionResponse},
};
use async_trait::async_trait;

/// Core trait for LLM clients.
///
/// The generation capability makes no semantic guarantee about the
/// returned text; schema validation is the caller's responsibility.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Complete a request (non-streaming)
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Get provider name (e.g., "google")
    fn provider_name(&self) -> &str;

    /// Get model name (e.g., "gemini-1.5-pro")
    fn model_name(&self) -> &str;
}
