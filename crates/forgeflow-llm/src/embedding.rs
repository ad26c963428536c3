//! The embedding client abstraction used to build the corpus vector index.

use crate::error::LlmError;
use async_trait::async_trait;

/// Abstraction over an embedding provider.
///
/// The corpus is embedded exactly once per process lifetime, in a single
/// batch call at startup; per-query embeddings happen one at a time
/// during retrieval.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embed a batch of texts in one call, preserving input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;

    /// Embed a single text. Default implementation delegates to
    /// [`Self::embed_batch`] with a one-element slice.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let mut batch = self.embed_batch(std::slice::from_ref(&text.to_string())).await?;
        batch.pop().ok_or_else(|| LlmError::Transport("empty embedding batch result".to_string()))
    }
}

/// Cosine similarity between two equal-length embedding vectors.
///
/// Returns `0.0` for mismatched lengths or zero-magnitude vectors rather
/// than panicking, since candidate vectors are never adversarial inputs
/// but floating-point degeneracy is still possible at the corpus edges.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_have_similarity_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_have_similarity_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn mismatched_lengths_return_zero() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn zero_vector_returns_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}
