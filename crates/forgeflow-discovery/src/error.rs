//! Errors raised by semantic API discovery.

use thiserror::Error;

/// Errors discovering endpoints for a requirement record's actions.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The embedding provider failed.
    #[error("embedding provider failed: {0}")]
    Embedding(String),
    /// The LLM ranking call failed.
    #[error("llm ranking failed: {0}")]
    Llm(String),
    /// The LLM's ranking response did not name one of the offered candidates.
    #[error("llm selected an id outside the candidate set")]
    SelectionOutOfRange,
    /// The corpus file could not be read from disk.
    #[error("failed to read corpus file {path}: {source}")]
    CorpusIo {
        /// Path that could not be read.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The corpus file's contents did not parse as a JSON array of endpoint documents.
    #[error("failed to parse corpus file {path}: {source}")]
    CorpusParse {
        /// Path whose contents failed to parse.
        path: String,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}
