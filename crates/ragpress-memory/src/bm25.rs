use crate::lexical::tokenize;
use ragpress_core::DocumentId;
use std::collections::HashMap;

/// BM25 parameters.
const K1: f32 = 1.2;
const B: f32 = 0.75;

/// A BM25 inverted index for keyword-based document retrieval.
///
/// Maintains an inverted index mapping terms to documents and their
/// term frequencies, along with document length statistics needed
/// for the BM25 scoring formula.
#[derive(Debug, Clone, Default)]
pub struct Bm25Index {
    /// term -> (doc_id -> term_frequency)
    inverted_index: HashMap<String, HashMap<DocumentId, f32>>,
    /// doc_id -> document length (word count)
    doc_lengths: HashMap<DocumentId, f32>,
    /// Average document length across all indexed documents.
    avg_doc_length: f32,
}

impl Bm25Index {
    /// Create a new, empty BM25 index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document to the index, replacing any previous version of it.
    pub fn add_document(&mut self, id: DocumentId, text: &str) {
        self.remove_document(id);

        let tokens = tokenize(text);
        let doc_len = tokens.len() as f32;

        let mut term_freq: HashMap<String, f32> = HashMap::new();
        for token in tokens {
            *term_freq.entry(token).or_insert(0.0) += 1.0;
        }

        for (term, freq) in term_freq {
            self.inverted_index.entry(term).or_default().insert(id, freq);
        }

        self.doc_lengths.insert(id, doc_len);
        self.recompute_avg_doc_length();
    }

    /// Remove a document from the index. Unknown ids are ignored.
    pub fn remove_document(&mut self, id: DocumentId) {
        if self.doc_lengths.remove(&id).is_none() {
            return;
        }

        self.inverted_index.retain(|_, postings| {
            postings.remove(&id);
            !postings.is_empty()
        });

        self.recompute_avg_doc_length();
    }

    /// Search the index for documents matching the query, returning up to
    /// `top_k` results sorted by descending BM25 score.
    ///
    /// ```text
    /// score = sum over query terms of:
    ///   IDF(t) * (tf * (k1 + 1)) / (tf + k1 * (1 - b + b * dl / avgdl))
    /// IDF(t) = ln((N - df + 0.5) / (df + 0.5) + 1.0)
    /// ```
    ///
    /// Equal scores are ordered by document id so results are reproducible.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<(DocumentId, f32)> {
        if self.doc_lengths.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let mut query_tokens = tokenize(query);
        query_tokens.sort();
        query_tokens.dedup();
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let n = self.doc_lengths.len() as f32;
        let avgdl = if self.avg_doc_length > 0.0 {
            self.avg_doc_length
        } else {
            1.0
        };
        let mut scores: HashMap<DocumentId, f32> = HashMap::new();

        for token in &query_tokens {
            let Some(postings) = self.inverted_index.get(token) else {
                continue;
            };
            let df = postings.len() as f32;
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

            for (&doc_id, &tf) in postings {
                let dl = self.doc_lengths.get(&doc_id).copied().unwrap_or(0.0);
                let numerator = tf * (K1 + 1.0);
                let denominator = tf + K1 * (1.0 - B + B * dl / avgdl);
                *scores.entry(doc_id).or_insert(0.0) += idf * numerator / denominator;
            }
        }

        let mut results: Vec<(DocumentId, f32)> = scores.into_iter().collect();
        results.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        results.truncate(top_k);
        results
    }

    /// Return the number of documents currently in the index.
    pub fn document_count(&self) -> usize {
        self.doc_lengths.len()
    }

    fn recompute_avg_doc_length(&mut self) {
        if self.doc_lengths.is_empty() {
            self.avg_doc_length = 0.0;
        } else {
            let total: f32 = self.doc_lengths.values().sum();
            self.avg_doc_length = total / self.doc_lengths.len() as f32;
        }
    }
}
