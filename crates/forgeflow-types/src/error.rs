//! Error kinds shared by the data model, grouped by origin per the
//! error-handling design: input, resource, content, artifact, budget.

use thiserror::Error;

/// Top-level error kind classification, used by the runner to decide
/// whether a failure is retryable, feeds the self-debug loop, or is fatal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed user input, or a resume without a matching checkpoint.
    #[error("input error: {0}")]
    Input(String),
    /// An external resource (LLM, embedding, sandbox) is unavailable.
    #[error("resource error: {0}")]
    Resource(String),
    /// An LLM JSON response failed to parse against its schema.
    #[error("content error: {0}")]
    Content(String),
    /// A security violation or sandbox execution failure.
    #[error("artifact error: {0}")]
    Artifact(String),
    /// A bounded loop or pipeline timeout was exhausted.
    #[error("budget error: {0}")]
    Budget(String),
}

impl ErrorKind {
    /// Resource errors are the only class eligible for silent stage retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Resource(_))
    }

    /// Artifact errors feed the self-debug loop rather than failing immediately.
    #[must_use]
    pub fn feeds_self_debug(&self) -> bool {
        matches!(self, Self::Artifact(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_resource_errors_are_retryable() {
        assert!(ErrorKind::Resource("llm down".into()).is_retryable());
        assert!(!ErrorKind::Content("bad json".into()).is_retryable());
        assert!(!ErrorKind::Budget("ceiling hit".into()).is_retryable());
    }

    #[test]
    fn only_artifact_errors_feed_self_debug() {
        assert!(ErrorKind::Artifact("security_violation".into()).feeds_self_debug());
        assert!(!ErrorKind::Input("malformed".into()).feeds_self_debug());
    }
}
