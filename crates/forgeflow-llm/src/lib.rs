//! LLM and embedding client abstractions: free-text/JSON/tool-calling
//! completion and batch embedding, with a real HTTP-backed implementation.

pub mod client;
pub mod embedding;
pub mod error;
pub mod http;

pub mod prelude {
    //! Convenience re-export of the most commonly used types.
    pub use crate::client::{AgentTurn, LlmClient, ToolMessage};
    pub use crate::embedding::{cosine_similarity, EmbeddingClient};
    pub use crate::error::LlmError;
    pub use crate::http::{HttpClientConfig, HttpEmbeddingClient, HttpLlmClient};
}
