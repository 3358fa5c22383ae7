use crate::bm25::Bm25Index;
use crate::lexical::LexicalSearch;
use async_trait::async_trait;
use ragpress_core::{strip_html, Document, DocumentId, RagpressResult};
use tokio::sync::RwLock;

/// Trait for document storage backends.
///
/// `list` returns documents in corpus order; vector search breaks score ties
/// by that order.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document or replace the stored one with the same id.
    async fn upsert(&self, document: Document) -> RagpressResult<()>;

    /// Fetch a single document.
    async fn get(&self, id: DocumentId) -> RagpressResult<Option<Document>>;

    /// Fetch several documents, in the order of `ids`. Unknown ids are skipped.
    async fn get_many(&self, ids: &[DocumentId]) -> RagpressResult<Vec<Document>> {
        let mut documents = Vec::with_capacity(ids.len());
        for &id in ids {
            if let Some(doc) = self.get(id).await? {
                documents.push(doc);
            }
        }
        Ok(documents)
    }

    /// All documents in corpus order.
    async fn list(&self) -> RagpressResult<Vec<Document>>;

    /// Replace the embedding of a document. Returns `false` if it does not exist.
    async fn set_embedding(&self, id: DocumentId, embedding: Vec<f32>) -> RagpressResult<bool>;

    /// Delete a document by id. Returns `false` if it did not exist.
    async fn delete(&self, id: DocumentId) -> RagpressResult<bool>;

    /// Number of stored documents.
    async fn count(&self) -> RagpressResult<usize>;

    /// Number of stored documents that have an embedding.
    async fn embedded_count(&self) -> RagpressResult<usize>;
}

/// Text indexed for full-text search: title plus the body without markup.
pub(crate) fn searchable_text(document: &Document) -> String {
    format!("{} {}", document.title, strip_html(&document.body))
}

#[derive(Default)]
struct Inner {
    documents: Vec<Document>,
    bm25: Bm25Index,
}

/// In-memory document store with a BM25 index for lexical search.
/// Corpus order is insertion order; replacing a document keeps its position.
pub struct InMemoryDocumentStore {
    inner: RwLock<Inner>,
}

impl InMemoryDocumentStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn upsert(&self, document: Document) -> RagpressResult<()> {
        let mut inner = self.inner.write().await;
        inner.bm25.add_document(document.id, &searchable_text(&document));
        match inner.documents.iter_mut().find(|d| d.id == document.id) {
            Some(existing) => *existing = document,
            None => inner.documents.push(document),
        }
        Ok(())
    }

    async fn get(&self, id: DocumentId) -> RagpressResult<Option<Document>> {
        let inner = self.inner.read().await;
        Ok(inner.documents.iter().find(|d| d.id == id).cloned())
    }

    async fn list(&self) -> RagpressResult<Vec<Document>> {
        let inner = self.inner.read().await;
        Ok(inner.documents.clone())
    }

    async fn set_embedding(&self, id: DocumentId, embedding: Vec<f32>) -> RagpressResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.documents.iter_mut().find(|d| d.id == id) {
            Some(doc) => {
                doc.embedding = Some(embedding);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: DocumentId) -> RagpressResult<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.documents.len();
        inner.documents.retain(|d| d.id != id);
        inner.bm25.remove_document(id);
        Ok(inner.documents.len() < before)
    }

    async fn count(&self) -> RagpressResult<usize> {
        Ok(self.inner.read().await.documents.len())
    }

    async fn embedded_count(&self) -> RagpressResult<usize> {
        let inner = self.inner.read().await;
        Ok(inner
            .documents
            .iter()
            .filter(|d| d.embedding.is_some())
            .count())
    }
}

#[async_trait]
impl LexicalSearch for InMemoryDocumentStore {
    async fn search(&self, text: &str, limit: usize) -> RagpressResult<Vec<(DocumentId, f32)>> {
        let inner = self.inner.read().await;
        Ok(inner.bm25.search(text, limit))
    }
}
