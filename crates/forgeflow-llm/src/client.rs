//! The LLM client abstraction: free text, structured JSON, and tool-calling turns.

use crate::error::LlmError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One entry in a tool-calling conversation transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolMessage {
    /// `"system" | "user" | "assistant" | "tool"`.
    pub role: String,
    /// Message text. For `"tool"` role entries, this is the tool's result.
    pub content: String,
}

impl ToolMessage {
    /// Construct a message with the given role and content.
    #[must_use]
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// The LLM's decision for one turn of the tool-calling loop: either
/// invoke a tool, or emit the final artifact.
///
/// The LLM client exposes this as a pure function from transcript to
/// decision; the driver (not the client) performs the tool's side effects.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentTurn {
    /// Invoke a named tool with a JSON input payload.
    ToolCall {
        /// Tool name (must be one of the fixed tool set).
        tool: String,
        /// Tool input, to be interpreted by the driver.
        input: serde_json::Value,
    },
    /// Terminate the loop with the final artifact text.
    Finish {
        /// The final artifact source text.
        artifact: String,
    },
    /// The response was neither a valid tool call nor a finish.
    Malformed {
        /// The raw response text, for diagnostics.
        raw: String,
    },
}

/// Abstraction over an LLM provider, used for free-text completion,
/// schema-validated JSON extraction, and the code generator's
/// tool-calling loop.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Free-text completion.
    async fn complete_text(&self, prompt: &str) -> Result<String, LlmError>;

    /// Structured-JSON completion. `schema_hint` is embedded in the
    /// prompt describing the expected shape; callers are responsible for
    /// validating the returned value against their own schema and
    /// translating parse failures into `LlmError::SchemaParseFailure`.
    async fn complete_json(
        &self,
        prompt: &str,
        schema_hint: &str,
    ) -> Result<serde_json::Value, LlmError>;

    /// Compute the next turn of a tool-calling conversation.
    async fn next_turn(&self, transcript: &[ToolMessage]) -> Result<AgentTurn, LlmError>;
}
