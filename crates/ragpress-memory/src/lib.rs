//! Retrieval for Ragpress: document stores, similarity search and fusion.
//!
//! Documents live in a [`DocumentStore`]; the SQLite store keeps embeddings
//! as JSON text next to the post and indexes title and body with FTS5.
//! A query runs a lexical search and a brute-force cosine search, and the two
//! ranked lists are merged by a [`FusionPolicy`].
//!
//! # Main types
//!
//! - [`DocumentStore`]: Trait for storing synced documents.
//! - [`InMemoryDocumentStore`]: Store backed by a `Vec`, with a BM25 index.
//! - [`SqliteDocumentStore`]: SQLite store with an FTS5 full-text index.
//! - [`LexicalSearch`]: Full-text search returning `(id, score)` pairs.
//! - [`EmbeddingProvider`]: Trait for turning text into vectors.
//! - [`Retriever`]: Runs lexical and vector search and fuses the results.
//! - [`ContextBuilder`]: Renders retrieved documents into a prompt context.

/// BM25 inverted index for in-process keyword search.
pub mod bm25;
/// Prompt context rendering.
pub mod context;
/// Embedding provider trait and local implementation.
pub mod embedding;
/// Merging lexical and vector results.
pub mod fusion;
/// Lexical search trait and query tokenization.
pub mod lexical;
/// Query execution across both search paths.
pub mod retriever;
/// Cosine similarity and brute-force vector search.
pub mod similarity;
/// SQLite-backed store with FTS5.
pub mod sqlite;
/// Document store trait and in-memory implementation.
pub mod store;
/// Sync and embed steps.
pub mod sync;

pub use bm25::Bm25Index;
pub use context::ContextBuilder;
pub use embedding::{EmbeddingProvider, LocalEmbedding};
pub use fusion::{fuse, FusionPolicy};
pub use lexical::LexicalSearch;
pub use retriever::{Retrieval, Retriever, SearchMode};
pub use similarity::{cosine_similarity, top_n_by_similarity, vector_search};
pub use sqlite::SqliteDocumentStore;
pub use store::{DocumentStore, InMemoryDocumentStore};
pub use sync::{embed_documents, sync_documents, EmbedReport, SyncReport};
