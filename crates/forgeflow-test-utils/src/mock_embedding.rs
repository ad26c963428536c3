//! A deterministic, content-sensitive [`EmbeddingClient`] for tests.

use async_trait::async_trait;
use forgeflow_llm::embedding::EmbeddingClient;
use forgeflow_llm::error::LlmError;

const DIMS: usize = 32;

/// Embeds text into a fixed-size bag-of-words-style vector: each
/// whitespace-separated token bumps a dimension selected by a cheap
/// hash of the token. Texts sharing vocabulary score higher under
/// cosine similarity than unrelated ones, which is enough to exercise
/// discovery/ranking logic without a real model.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockEmbeddingClient;

impl MockEmbeddingClient {
    /// Construct the mock client.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn embed_text(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; DIMS];
        for token in text.to_lowercase().split_whitespace() {
            let bucket = token.bytes().fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize)) % DIMS;
            vector[bucket] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingClient for MockEmbeddingClient {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        Ok(texts.iter().map(|t| Self::embed_text(t)).collect())
    }
}
