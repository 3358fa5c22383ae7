use ragpress_core::{Document, RagpressError, RagpressResult, SearchResult, SearchSource};

/// Cosine similarity between two vectors.
///
/// Returns 0 when the lengths differ, either vector has zero norm, or the
/// input holds non-finite values; degenerate input is not an error.
///
/// Sums run in `f64`, so any finite `f32` components square without
/// overflowing or underflowing. The result is clamped to `[-1, 1]`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut na = 0.0f64;
    let mut nb = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    let similarity = dot / (na.sqrt() * nb.sqrt());
    if similarity.is_finite() {
        similarity.clamp(-1.0, 1.0) as f32
    } else {
        0.0
    }
}

/// Scores every corpus entry against `query` and returns the `n` best,
/// highest similarity first.
///
/// The sort is stable: entries with equal similarity keep corpus order.
pub fn top_n_by_similarity<'a, T, I>(query: &[f32], corpus: I, n: usize) -> Vec<(T, f32)>
where
    I: IntoIterator<Item = (T, &'a [f32])>,
{
    if n == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(T, f32)> = corpus
        .into_iter()
        .map(|(item, vector)| {
            let score = cosine_similarity(query, vector);
            (item, score)
        })
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(n);
    scored
}

/// Brute-force vector search over `documents`.
///
/// Documents without an embedding are skipped. An empty corpus yields an
/// empty result; an empty or non-finite query vector is rejected.
pub fn vector_search(
    query_embedding: &[f32],
    documents: &[Document],
    limit: usize,
) -> RagpressResult<Vec<SearchResult>> {
    if query_embedding.is_empty() {
        return Err(RagpressError::InvalidInput("Empty query embedding".to_string()));
    }
    if query_embedding.iter().any(|v| !v.is_finite()) {
        return Err(RagpressError::InvalidInput(
            "Query embedding contains non-finite values".to_string(),
        ));
    }

    let corpus = documents
        .iter()
        .filter_map(|doc| doc.embedding.as_deref().map(|emb| (doc, emb)));

    Ok(top_n_by_similarity(query_embedding, corpus, limit)
        .into_iter()
        .map(|(doc, score)| SearchResult::from_document(doc, score, SearchSource::Vector))
        .collect())
}
