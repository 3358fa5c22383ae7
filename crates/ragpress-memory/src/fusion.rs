use ragpress_core::{DocumentId, SearchResult, SearchSource};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// How lexical and vector result lists are merged into one.
///
/// Every policy deduplicates by document id and truncates to the query limit.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionPolicy {
    /// Lexical results in rank order, then vector results not already
    /// present, each list keeping its own order. Scores are left as produced.
    #[default]
    LexicalFirst,
    /// Like `LexicalFirst` with the vector list placed first.
    VectorFirst,
    /// Reciprocal Rank Fusion: `score = Σ 1 / (k + rank)` over the lists a
    /// document appears in (1-based ranks).
    ReciprocalRank {
        /// Smoothing constant; 60 is the usual choice.
        k: f32,
    },
}

impl FusionPolicy {
    /// RRF with the customary `k = 60`.
    pub fn reciprocal_rank() -> Self {
        Self::ReciprocalRank { k: 60.0 }
    }
}

/// Merges `lexical` and `vector` according to `policy`, returning at most
/// `limit` results.
pub fn fuse(
    lexical: Vec<SearchResult>,
    vector: Vec<SearchResult>,
    policy: FusionPolicy,
    limit: usize,
) -> Vec<SearchResult> {
    let mut fused = match policy {
        FusionPolicy::LexicalFirst => stable_union(lexical, vector),
        FusionPolicy::VectorFirst => stable_union(vector, lexical),
        FusionPolicy::ReciprocalRank { k } => reciprocal_rank(lexical, vector, k),
    };
    fused.truncate(limit);
    fused
}

/// `first` followed by the members of `second` whose ids are not yet present.
/// Duplicates inside a single list are dropped too, keeping the first one.
fn stable_union(first: Vec<SearchResult>, second: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen: HashSet<DocumentId> = HashSet::new();
    first
        .into_iter()
        .chain(second)
        .filter(|r| seen.insert(r.document_id))
        .collect()
}

fn reciprocal_rank(lexical: Vec<SearchResult>, vector: Vec<SearchResult>, k: f32) -> Vec<SearchResult> {
    let mut scores: HashMap<DocumentId, f32> = HashMap::new();
    for list in [&lexical, &vector] {
        let mut seen: HashSet<DocumentId> = HashSet::new();
        for (idx, result) in list.iter().enumerate() {
            if seen.insert(result.document_id) {
                *scores.entry(result.document_id).or_insert(0.0) += 1.0 / (k + (idx + 1) as f32);
            }
        }
    }

    // Union order is the tie-breaker: the sort below is stable.
    let mut fused: Vec<SearchResult> = stable_union(lexical, vector)
        .into_iter()
        .map(|mut r| {
            r.score = scores.get(&r.document_id).copied().unwrap_or(0.0);
            r.source = SearchSource::Fused;
            r
        })
        .collect();
    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    fused
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn result(id: DocumentId, score: f32, source: SearchSource) -> SearchResult {
        SearchResult {
            document_id: id,
            title: format!("post {id}"),
            score,
            excerpt: String::new(),
            source,
        }
    }

    fn lex(ids: &[DocumentId]) -> Vec<SearchResult> {
        ids.iter()
            .enumerate()
            .map(|(i, &id)| result(id, 10.0 - i as f32, SearchSource::Lexical))
            .collect()
    }

    fn vec_results(ids: &[DocumentId]) -> Vec<SearchResult> {
        ids.iter()
            .enumerate()
            .map(|(i, &id)| result(id, 0.9 - i as f32 * 0.1, SearchSource::Vector))
            .collect()
    }

    fn ids(results: &[SearchResult]) -> Vec<DocumentId> {
        results.iter().map(|r| r.document_id).collect()
    }

    #[test]
    fn test_lexical_first_stable_union() {
        let fused = fuse(lex(&[3, 1]), vec_results(&[1, 7, 3, 9]), FusionPolicy::LexicalFirst, 10);
        assert_eq!(ids(&fused), vec![3, 1, 7, 9]);
        // Scores and sources are the originals, not re-ranked.
        assert_eq!(fused[0].source, SearchSource::Lexical);
        assert_eq!(fused[2].source, SearchSource::Vector);
        assert_eq!(fused[1].score, 9.0);
    }

    #[test]
    fn test_vector_first_stable_union() {
        let fused = fuse(lex(&[3, 1]), vec_results(&[1, 7]), FusionPolicy::VectorFirst, 10);
        assert_eq!(ids(&fused), vec![1, 7, 3]);
    }

    #[test]
    fn test_fusion_truncates_to_limit() {
        let fused = fuse(lex(&[1, 2, 3]), vec_results(&[4, 5]), FusionPolicy::LexicalFirst, 4);
        assert_eq!(ids(&fused), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_fusion_with_one_side_empty() {
        let fused = fuse(Vec::new(), vec_results(&[4, 5]), FusionPolicy::LexicalFirst, 10);
        assert_eq!(ids(&fused), vec![4, 5]);
        let fused = fuse(lex(&[2]), Vec::new(), FusionPolicy::reciprocal_rank(), 10);
        assert_eq!(ids(&fused), vec![2]);
    }

    #[test]
    fn test_reciprocal_rank_rewards_agreement() {
        // Doc 5 is second in both lists, so it beats the single-list leaders.
        let fused = fuse(lex(&[1, 5]), vec_results(&[2, 5]), FusionPolicy::reciprocal_rank(), 10);
        assert_eq!(fused[0].document_id, 5);
        assert!(fused.iter().all(|r| r.source == SearchSource::Fused));
        let expected = 2.0 / 62.0;
        assert!((fused[0].score - expected).abs() < 1e-6);
    }

    #[test]
    fn test_reciprocal_rank_ties_keep_union_order() {
        let fused = fuse(lex(&[1]), vec_results(&[2]), FusionPolicy::reciprocal_rank(), 10);
        assert_eq!(ids(&fused), vec![1, 2]);
    }

    #[test]
    fn test_policy_deserializes_from_config_strings() {
        #[derive(Deserialize)]
        struct Wrapper {
            fusion: FusionPolicy,
        }
        let w: Wrapper = serde_json::from_str(r#"{"fusion": "lexical_first"}"#).unwrap();
        assert_eq!(w.fusion, FusionPolicy::LexicalFirst);
        let w: Wrapper =
            serde_json::from_str(r#"{"fusion": {"reciprocal_rank": {"k": 10.0}}}"#).unwrap();
        assert_eq!(w.fusion, FusionPolicy::ReciprocalRank { k: 10.0 });
    }
}
