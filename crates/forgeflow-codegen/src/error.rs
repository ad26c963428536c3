//! Errors raised by the tool-calling code generation agent.

use thiserror::Error;

/// Errors driving the code generator's bounded tool-invocation loop.
#[derive(Debug, Error)]
pub enum CodegenError {
    /// The underlying LLM call failed.
    #[error("llm call failed: {0}")]
    Llm(String),
    /// A turn was neither a valid tool call nor a finish, and the
    /// one allowed retry also came back malformed.
    #[error("agent turn malformed after retry")]
    MalformedTurn,
    /// The loop exceeded its per-step or total tool-invocation ceiling
    /// without receiving `finish`.
    #[error("tool-invocation ceiling ({ceiling}) exceeded without finish")]
    CeilingExceeded {
        /// The ceiling that was hit.
        ceiling: usize,
    },
    /// The agent invoked a tool name outside the fixed tool set.
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    /// A tool's input payload did not match its expected shape.
    #[error("invalid input for tool `{tool}`: {reason}")]
    InvalidToolInput {
        /// The tool that was invoked.
        tool: String,
        /// Why the input was rejected.
        reason: String,
    },
    /// `fetch_spec` was invoked for an endpoint absent from the corpus.
    #[error("no spec found for {service}/{path}")]
    SpecNotFound {
        /// Requested service name.
        service: String,
        /// Requested endpoint path.
        path: String,
    },
}
