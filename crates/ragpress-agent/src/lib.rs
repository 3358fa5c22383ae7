//! LLM side of Ragpress: OpenAI-compatible chat completions and embeddings,
//! structured output, tool calling, and retrieval-augmented answering.
//!
//! # Main types
//!
//! - [`ModelConfig`]: Explicit API configuration (key, model, sampling).
//! - [`OpenAiBackend`]: HTTP client for `/v1/chat/completions` and `/v1/embeddings`.
//! - [`LlmClient`]: Provider-agnostic chat entry point.
//! - [`OpenAiEmbedding`]: [`ragpress_memory::EmbeddingProvider`] over the embeddings API.
//! - [`ToolRegistry`] / [`ToolRunner`]: Function calling loop.
//! - [`RagPipeline`]: Retrieve, build context, ask the model.

/// Provider backends.
pub mod backends;
/// Model and API configuration.
pub mod config;
/// Embeddings over the HTTP API.
pub mod embedding;
/// Chat requests, responses and the client.
pub mod llm;
/// Retrieval-augmented answering.
pub mod rag;
/// Tool calling loop.
pub mod runner;
/// Tools the model can call.
pub mod tools;

pub use backends::openai::OpenAiBackend;
pub use backends::LlmBackend;
pub use config::{LlmProvider, ModelConfig};
pub use embedding::OpenAiEmbedding;
pub use llm::{ChatRequest, LlmClient, LlmResponse, ResponseFormat};
pub use rag::{RagAnswer, RagPipeline};
pub use runner::ToolRunner;
pub use tools::{SearchPostsTool, Tool, ToolRegistry};
