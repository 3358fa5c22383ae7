use crate::embedding::EmbeddingProvider;
use crate::fusion::{fuse, FusionPolicy};
use crate::lexical::LexicalSearch;
use crate::similarity::vector_search;
use crate::store::DocumentStore;
use ragpress_core::{
    DocumentId, Query, RagpressError, RagpressResult, SearchResult, SearchSource,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which search paths a query runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Full-text search only.
    Lexical,
    /// Embedding search only; requires embedded documents.
    Vector,
    /// Both, merged by the configured [`FusionPolicy`].
    #[default]
    Hybrid,
}

/// Outcome of a retrieval.
#[derive(Debug, Clone)]
pub struct Retrieval {
    /// Fused results, best first, at most `query.limit`.
    pub results: Vec<SearchResult>,
    /// Whether vector search contributed. False when no embeddings exist or
    /// the query could not be embedded.
    pub vector_used: bool,
}

/// Runs lexical and vector search for a query and fuses the results.
///
/// The store and the lexical search are often the same object
/// (see [`crate::SqliteDocumentStore`]); they are held separately so a
/// different full-text engine can be plugged in.
pub struct Retriever {
    store: Arc<dyn DocumentStore>,
    lexical: Arc<dyn LexicalSearch>,
    embedder: Arc<dyn EmbeddingProvider>,
    mode: SearchMode,
    fusion: FusionPolicy,
}

impl Retriever {
    /// Creates a hybrid retriever with the lexical-first fusion policy.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        lexical: Arc<dyn LexicalSearch>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            store,
            lexical,
            embedder,
            mode: SearchMode::default(),
            fusion: FusionPolicy::default(),
        }
    }

    /// Set the search mode. Chainable builder method.
    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the fusion policy. Chainable builder method.
    pub fn with_fusion(mut self, fusion: FusionPolicy) -> Self {
        self.fusion = fusion;
        self
    }

    /// The configured search mode.
    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    /// The store results refer to.
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Retrieve with the configured mode.
    pub async fn retrieve(&self, query: &Query) -> RagpressResult<Retrieval> {
        self.retrieve_with_mode(query, self.mode).await
    }

    /// Retrieve with an explicit mode.
    ///
    /// Fails with [`RagpressError::EmptyCorpus`] when nothing has been synced,
    /// or when vector mode is requested before any embeddings exist. In
    /// hybrid mode a failed query embedding degrades to lexical-only.
    pub async fn retrieve_with_mode(
        &self,
        query: &Query,
        mode: SearchMode,
    ) -> RagpressResult<Retrieval> {
        if query.is_blank() {
            return Err(RagpressError::InvalidInput("Query text is empty".to_string()));
        }
        if self.store.count().await? == 0 {
            return Err(RagpressError::no_documents());
        }

        let retrieval = match mode {
            SearchMode::Lexical => Retrieval {
                results: self.lexical_results(query).await?,
                vector_used: false,
            },
            SearchMode::Vector => {
                if self.store.embedded_count().await? == 0 {
                    return Err(RagpressError::no_embeddings());
                }
                Retrieval {
                    results: self.vector_results(query).await?,
                    vector_used: true,
                }
            }
            SearchMode::Hybrid => {
                let lexical = self.lexical_results(query).await?;
                let vector = if self.store.embedded_count().await? == 0 {
                    debug!("No embeddings stored, skipping vector search");
                    None
                } else {
                    match self.vector_results(query).await {
                        Ok(results) => Some(results),
                        Err(e) => {
                            warn!(error = %e, "Vector search unavailable, using lexical results only");
                            None
                        }
                    }
                };
                let vector_used = vector.is_some();
                Retrieval {
                    results: fuse(lexical, vector.unwrap_or_default(), self.fusion, query.limit),
                    vector_used,
                }
            }
        };

        info!(
            mode = ?mode,
            results = retrieval.results.len(),
            vector_used = retrieval.vector_used,
            "Retrieval complete"
        );
        Ok(retrieval)
    }

    async fn lexical_results(&self, query: &Query) -> RagpressResult<Vec<SearchResult>> {
        let hits = self.lexical.search(&query.text, query.limit).await?;
        let ids: Vec<DocumentId> = hits.iter().map(|(id, _)| *id).collect();
        let mut documents: HashMap<DocumentId, _> = self
            .store
            .get_many(&ids)
            .await?
            .into_iter()
            .map(|d| (d.id, d))
            .collect();

        // Hits whose document vanished in between are dropped.
        Ok(hits
            .into_iter()
            .filter_map(|(id, score)| {
                documents
                    .remove(&id)
                    .map(|doc| SearchResult::from_document(&doc, score, SearchSource::Lexical))
            })
            .collect())
    }

    async fn vector_results(&self, query: &Query) -> RagpressResult<Vec<SearchResult>> {
        let query_embedding = self.embedder.embed(&query.text).await?;
        let documents = self.store.list().await?;
        vector_search(&query_embedding, &documents, query.limit)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::store::InMemoryDocumentStore;
    use async_trait::async_trait;
    use ragpress_core::Document;

    /// Maps known words to fixed axes so similarities are predictable.
    struct AxisEmbedding;

    #[async_trait]
    impl EmbeddingProvider for AxisEmbedding {
        async fn embed(&self, text: &str) -> RagpressResult<Vec<f32>> {
            let t = text.to_lowercase();
            Ok(vec![
                if t.contains("cache") { 1.0 } else { 0.0 },
                if t.contains("theme") { 1.0 } else { 0.0 },
                0.1,
            ])
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    struct FailingEmbedding;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedding {
        async fn embed(&self, _text: &str) -> RagpressResult<Vec<f32>> {
            Err(RagpressError::Upstream {
                status: 500,
                message: "embedding service down".into(),
            })
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    async fn seeded_store(embed: bool) -> Arc<InMemoryDocumentStore> {
        let store = Arc::new(InMemoryDocumentStore::new());
        let docs = [
            (1, "Object cache", "Persistent object cache with Redis", [1.0, 0.0, 0.1]),
            (2, "Theme JSON", "Configure a block theme", [0.0, 1.0, 0.1]),
            (3, "Speed", "Page speed and cache headers", [0.9, 0.1, 0.1]),
        ];
        for (id, title, body, emb) in docs {
            let mut doc = Document::new(id, title, body);
            if embed {
                doc.embedding = Some(emb.to_vec());
            }
            store.upsert(doc).await.unwrap();
        }
        store
    }

    fn retriever(store: Arc<InMemoryDocumentStore>, embedder: Arc<dyn EmbeddingProvider>) -> Retriever {
        Retriever::new(store.clone(), store, embedder)
    }

    #[tokio::test]
    async fn test_empty_store_reports_sync_step() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let r = retriever(store, Arc::new(AxisEmbedding));
        let err = r.retrieve(&Query::new("cache", 5)).await.unwrap_err();
        assert!(matches!(err, RagpressError::EmptyCorpus(_)));
        assert!(err.user_message().contains("sync"));
    }

    #[tokio::test]
    async fn test_blank_query_rejected() {
        let r = retriever(seeded_store(true).await, Arc::new(AxisEmbedding));
        assert!(matches!(
            r.retrieve(&Query::new("  ", 5)).await,
            Err(RagpressError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_vector_mode_without_embeddings_reports_embed_step() {
        let r = retriever(seeded_store(false).await, Arc::new(AxisEmbedding))
            .with_mode(SearchMode::Vector);
        let err = r.retrieve(&Query::new("cache", 5)).await.unwrap_err();
        assert!(err.user_message().contains("embed"));
    }

    #[tokio::test]
    async fn test_vector_mode_ranks_by_similarity() {
        let r = retriever(seeded_store(true).await, Arc::new(AxisEmbedding))
            .with_mode(SearchMode::Vector);
        let out = r.retrieve(&Query::new("cache", 2)).await.unwrap();
        assert!(out.vector_used);
        let ids: Vec<u64> = out.results.iter().map(|r| r.document_id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_hybrid_lexical_first_then_vector() {
        let r = retriever(seeded_store(true).await, Arc::new(AxisEmbedding));
        let out = r.retrieve(&Query::new("redis cache", 3)).await.unwrap();
        assert!(out.vector_used);
        // Lexical hits come first (doc 1 matches both terms), vector fills in.
        assert_eq!(out.results[0].document_id, 1);
        assert_eq!(out.results[0].source, SearchSource::Lexical);
        let ids: Vec<u64> = out.results.iter().map(|r| r.document_id).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains(&3));
    }

    #[tokio::test]
    async fn test_hybrid_degrades_when_embedding_fails() {
        let r = retriever(seeded_store(true).await, Arc::new(FailingEmbedding));
        let out = r.retrieve(&Query::new("theme", 5)).await.unwrap();
        assert!(!out.vector_used);
        assert_eq!(out.results.len(), 1);
        assert_eq!(out.results[0].document_id, 2);
    }

    #[tokio::test]
    async fn test_vector_mode_surfaces_embedding_failure() {
        let r = retriever(seeded_store(true).await, Arc::new(FailingEmbedding))
            .with_mode(SearchMode::Vector);
        assert!(matches!(
            r.retrieve(&Query::new("theme", 5)).await,
            Err(RagpressError::Upstream { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_lexical_mode_ignores_embeddings() {
        let r = retriever(seeded_store(false).await, Arc::new(FailingEmbedding))
            .with_mode(SearchMode::Lexical);
        let out = r.retrieve(&Query::new("cache", 5)).await.unwrap();
        assert!(!out.vector_used);
        let ids: Vec<u64> = out.results.iter().map(|r| r.document_id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&1) && ids.contains(&3));
    }
}
