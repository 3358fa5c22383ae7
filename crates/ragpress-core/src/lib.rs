//! Core types and error definitions for Ragpress.
//!
//! This crate provides the types shared across all Ragpress crates:
//! the error taxonomy, the document/query/result model used by retrieval,
//! and the chat message and tool-call types exchanged with the LLM.
//!
//! # Main types
//!
//! - [`RagpressError`]: Unified error enum surfaced to callers and the UI.
//! - [`RagpressResult`]: Convenience alias for `Result<T, RagpressError>`.
//! - [`Document`]: A synced post with its optional embedding.
//! - [`Query`]: Free-text query with a bounded result limit.
//! - [`SearchResult`]: A scored document reference with an excerpt.
//! - [`Message`]: A single chat message (system/user/assistant/tool).
//! - [`ToolCall`] / [`ToolDefinition`] / [`ToolResult`]: Function calling.

/// Documents, queries and search results.
pub mod document;
/// Error taxonomy.
pub mod error;
/// Chat message types.
pub mod message;
/// Tool (function) calling types.
pub mod tool;

pub use document::{excerpt, strip_html, Document, DocumentId, Query, SearchResult, SearchSource};
pub use error::{RagpressError, RagpressResult};
pub use message::{Message, Role};
pub use tool::{ToolCall, ToolDefinition, ToolResult};
