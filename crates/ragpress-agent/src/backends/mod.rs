/// OpenAI-compatible HTTP backend.
pub mod openai;
mod wire;

use crate::llm::{ChatRequest, LlmResponse};
use async_trait::async_trait;
use ragpress_core::RagpressResult;

/// Trait for LLM provider backends.
///
/// [`openai::OpenAiBackend`] covers every OpenAI-compatible service; tests and
/// embedders of the crate can plug in their own implementation through
/// [`crate::LlmClient::from_backend`].
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Non-streaming chat completion.
    async fn chat(&self, request: &ChatRequest) -> RagpressResult<LlmResponse>;
}
