use async_trait::async_trait;
use ragpress_core::{DocumentId, RagpressResult};

/// Full-text search over the document corpus.
///
/// Implementations return `(document_id, score)` pairs, highest score first,
/// at most `limit` of them. Scores are rank scores with no fixed range.
#[async_trait]
pub trait LexicalSearch: Send + Sync {
    /// Runs a natural-language search for `text`.
    async fn search(&self, text: &str, limit: usize) -> RagpressResult<Vec<(DocumentId, f32)>>;
}

/// Splits text into lowercase alphanumeric terms, dropping single characters.
///
/// Shared by the BM25 index and the FTS5 query builder so both search paths
/// agree on what a term is.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() > 1)
        .collect()
}

/// Builds an FTS5 `MATCH` expression that ORs the quoted query terms.
///
/// Returns `None` when the text has no usable terms. Terms are purely
/// alphanumeric, so quoting cannot break out of the expression.
pub fn fts_match_expression(text: &str) -> Option<String> {
    let mut terms = tokenize(text);
    terms.dedup();
    if terms.is_empty() {
        return None;
    }
    Some(
        terms
            .iter()
            .map(|t| format!("\"{t}\""))
            .collect::<Vec<_>>()
            .join(" OR "),
    )
}
