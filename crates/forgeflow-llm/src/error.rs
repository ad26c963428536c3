//! Errors raised by the LLM and embedding clients.

use thiserror::Error;

/// Errors surfaced by [`crate::client::LlmClient`] and
/// [`crate::embedding::EmbeddingClient`] implementations.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The underlying HTTP transport failed.
    #[error("llm transport error: {0}")]
    Transport(String),
    /// The provider responded with a non-success status.
    #[error("llm provider returned status {status}: {body}")]
    ProviderStatus {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },
    /// A JSON response failed to parse against the expected schema, after
    /// one retry with a stricter reminder.
    #[error("schema_parse_failure: {0}")]
    SchemaParseFailure(String),
    /// The call exceeded its per-call timeout.
    #[error("llm call timed out")]
    Timeout,
}
