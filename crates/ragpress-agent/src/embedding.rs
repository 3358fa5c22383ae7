use crate::backends::openai::OpenAiBackend;
use crate::config::ModelConfig;
use async_trait::async_trait;
use ragpress_core::{RagpressError, RagpressResult};
use ragpress_memory::EmbeddingProvider;
use std::sync::Arc;
use tracing::warn;

/// [`EmbeddingProvider`] backed by the `/v1/embeddings` endpoint.
///
/// Batches go out as a single request with an array `input`.
#[derive(Clone)]
pub struct OpenAiEmbedding {
    backend: Arc<OpenAiBackend>,
}

impl OpenAiEmbedding {
    /// Embedder for `config.embedding_model`.
    pub fn new(config: ModelConfig) -> RagpressResult<Self> {
        Ok(Self::from_backend(Arc::new(OpenAiBackend::new(config)?)))
    }

    /// Shares an existing backend (and its connection pool).
    pub fn from_backend(backend: Arc<OpenAiBackend>) -> Self {
        Self { backend }
    }

    fn check_dimension(&self, vector: &[f32]) {
        let expected = self.dimension();
        if vector.len() != expected {
            warn!(
                expected,
                actual = vector.len(),
                model = %self.backend.config().embedding_model,
                "embedding dimension differs from configuration"
            );
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> RagpressResult<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagpressError::Parse("embedding response was empty".into()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> RagpressResult<Vec<Vec<f32>>> {
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(RagpressError::InvalidInput("Cannot embed empty text".to_string()));
        }
        let vectors = self.backend.embed_texts(texts).await?;
        if let Some(first) = vectors.first() {
            self.check_dimension(first);
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.backend.config().embedding_dimension
    }
}
