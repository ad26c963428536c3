//! A read-only-after-build vector index over the API corpus.
//!
//! The corpus this system targets — hundreds of documented endpoints —
//! does not warrant an approximate-nearest-neighbor structure; a
//! brute-force cosine scan keeps the index auditable and trivially
//! serializable for tests.

use forgeflow_llm::embedding::cosine_similarity;

/// One scored candidate returned from a top-K query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    /// Index of the endpoint document in the corpus this embedding belongs to.
    pub document_index: usize,
    /// Cosine similarity against the query embedding.
    pub similarity: f32,
}

/// An in-memory vector index, built once at startup and never mutated
/// again for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    embeddings: Vec<Vec<f32>>,
}

impl VectorIndex {
    /// Build the index from pre-computed embeddings, one per corpus
    /// document, in corpus order.
    #[must_use]
    pub fn build(embeddings: Vec<Vec<f32>>) -> Self {
        Self { embeddings }
    }

    /// Number of indexed documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    /// Whether the index holds no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }

    /// Return the top `k` documents by cosine similarity to `query`,
    /// restricted to the indices in `candidates` (used to apply the
    /// per-action service-exclusion filter before scoring).
    #[must_use]
    pub fn top_k_among(&self, query: &[f32], candidates: &[usize], k: usize) -> Vec<ScoredCandidate> {
        let mut scored: Vec<ScoredCandidate> = candidates
            .iter()
            .filter_map(|&idx| {
                self.embeddings.get(idx).map(|embedding| ScoredCandidate {
                    document_index: idx,
                    similarity: cosine_similarity(query, embedding),
                })
            })
            .collect();

        scored.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_k_orders_by_similarity_descending() {
        let index = VectorIndex::build(vec![
            vec![1.0, 0.0],
            vec![0.9, 0.1],
            vec![0.0, 1.0],
        ]);
        let results = index.top_k_among(&[1.0, 0.0], &[0, 1, 2], 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document_index, 0);
        assert_eq!(results[1].document_index, 1);
    }

    #[test]
    fn top_k_respects_candidate_restriction() {
        let index = VectorIndex::build(vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        let results = index.top_k_among(&[1.0, 0.0], &[1], 5);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document_index, 1);
    }
}
