//! The LLM API seam used by the agent's reasoning loop.

use super::error::Error;
use super::types::{ChatRequest, Message};
use async_trait::async_trait;

/// A chat-completions backend.
#[async_trait]
pub trait LlmApi: Send + Sync {
    /// Provider identifier, for logs.
    fn id(&self) -> &str;

    /// Make a non-streaming completion request. The returned message has
    /// the assistant role and carries text and/or tool-call blocks.
    async fn complete(&self, request: ChatRequest) -> Result<Message, Error>;
}
