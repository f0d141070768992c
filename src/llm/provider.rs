use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::types::ChatRequest;
use crate::core::errors::ApiError;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// return the provider name (e.g. "openai", "lmstudio")
    fn name(&self) -> &str;

    /// check if the provider is healthy/reachable
    async fn health_check(&self) -> Result<bool, ApiError>;

    /// chat completion (non-streaming)
    async fn chat(&self, request: ChatRequest, timeout: Duration) -> Result<String, ApiError>;

    /// chat completion (streaming); the receiver yields text fragments until
    /// the upstream end marker, or one terminal Err
    async fn stream_chat(
        &self,
        request: ChatRequest,
    ) -> Result<mpsc::Receiver<Result<String, ApiError>>, ApiError>;

    /// embed a single text; timeouts surface as `ApiError::Timeout`
    async fn embed(&self, input: &str, timeout: Duration) -> Result<Vec<f32>, ApiError>;
}
