//! Shared test fixtures and mock clients used across the ForgeFlow workspace.

#![allow(missing_docs)]

pub mod fixtures;
pub mod mock_embedding;
pub mod mock_llm;

pub use fixtures::{happy_slack_post_requirement, parallel_onboarding_requirement, sample_corpus};
pub use mock_embedding::MockEmbeddingClient;
pub use mock_llm::MockLlmClient;
