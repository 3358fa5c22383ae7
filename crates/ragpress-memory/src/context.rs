use crate::store::DocumentStore;
use ragpress_core::{excerpt, Document, DocumentId, RagpressResult, SearchResult};

/// Renders retrieved documents into the context block of a RAG prompt.
///
/// Each document becomes `### {title}\n{plain text}\n\n`. The text of a
/// document is capped at `per_document_chars`, and documents stop being
/// added once the whole context would exceed `max_chars`.
#[derive(Debug, Clone, Copy)]
pub struct ContextBuilder {
    max_chars: usize,
    per_document_chars: usize,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(6000, 1500)
    }
}

impl ContextBuilder {
    /// Creates a builder with the given budgets (in characters).
    pub fn new(max_chars: usize, per_document_chars: usize) -> Self {
        Self {
            max_chars,
            per_document_chars,
        }
    }

    /// Loads the documents behind `results` and renders them in result order.
    pub async fn build(
        &self,
        store: &dyn DocumentStore,
        results: &[SearchResult],
    ) -> RagpressResult<String> {
        let ids: Vec<DocumentId> = results.iter().map(|r| r.document_id).collect();
        let documents = store.get_many(&ids).await?;
        Ok(self.render(&documents))
    }

    /// Renders documents in the given order.
    pub fn render(&self, documents: &[Document]) -> String {
        let mut context = String::new();
        let mut used = 0usize;

        for doc in documents {
            let block = format!(
                "### {}\n{}\n\n",
                doc.title,
                excerpt(&doc.body, self.per_document_chars)
            );
            let len = block.chars().count();
            if used + len > self.max_chars {
                if used == 0 {
                    // A single oversized block is cut rather than dropped.
                    context.extend(block.chars().take(self.max_chars));
                }
                break;
            }
            used += len;
            context.push_str(&block);
        }

        context.trim_end().to_string()
    }
}
