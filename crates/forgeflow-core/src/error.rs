//! The top-level error type aggregating every crate's error enum,
//! classified into the Input / Resource / Content / Artifact / Budget
//! kinds the runner decides retry/self-debug/fatal policy from.

use crate::transitions::IllegalTransition;
use forgeflow_types::error::ErrorKind;
use thiserror::Error;

/// Aggregated pipeline error. Each variant wraps one collaborator
/// crate's error type via `#[from]`, mirroring the teacher's top-level
/// error enum that rolls up per-subsystem errors.
#[derive(Debug, Error)]
pub enum ForgeFlowError {
    /// A checkpoint was requested for an unknown correlation id, or a
    /// resume message arrived for a run that isn't suspended.
    #[error("input error: {0}")]
    Input(String),
    /// Requirement extraction failed or returned an unparseable record.
    #[error("conversation error: {0}")]
    Conversation(#[from] crate::conversation::ConversationError),
    /// Semantic API discovery failed.
    #[error("discovery error: {0}")]
    Discovery(#[from] forgeflow_discovery::error::DiscoveryError),
    /// DAG planning or data mapping failed.
    #[error("planner error: {0}")]
    Planner(#[from] forgeflow_planner::error::PlannerError),
    /// Code generation failed.
    #[error("codegen error: {0}")]
    Codegen(#[from] forgeflow_codegen::error::CodegenError),
    /// The generated artifact failed static security review.
    #[error("security review error: {0}")]
    Security(#[from] forgeflow_security::error::SecurityViolationError),
    /// The sandbox backend failed to execute the artifact.
    #[error("sandbox error: {0}")]
    Sandbox(#[from] forgeflow_sandbox::error::SandboxError),
    /// The self-debug classify/patch cycle failed.
    #[error("self-debug error: {0}")]
    Debug(#[from] forgeflow_sandbox::error::DebugError),
    /// An LLM or embedding call failed.
    #[error("llm error: {0}")]
    Llm(#[from] forgeflow_llm::error::LlmError),
    /// The external deploy handoff failed.
    #[error("deploy error: {0}")]
    Deploy(String),
    /// The runner attempted a transition outside the allowed stage table;
    /// always a bug in the runner, never a user-facing failure mode.
    #[error("illegal stage transition: {0}")]
    Transition(#[from] IllegalTransition),
}

impl ForgeFlowError {
    /// Classify this error into the top-level error kind the runner
    /// uses to decide retry / self-debug / fatal policy.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Input(msg) => ErrorKind::Input(msg.clone()),
            Self::Conversation(e) => ErrorKind::Content(e.to_string()),
            Self::Discovery(e) => ErrorKind::Resource(e.to_string()),
            Self::Planner(e) => ErrorKind::Content(e.to_string()),
            Self::Codegen(e) => ErrorKind::Content(e.to_string()),
            Self::Security(e) => ErrorKind::Artifact(e.to_string()),
            Self::Sandbox(e) => ErrorKind::Artifact(e.to_string()),
            Self::Debug(forgeflow_sandbox::error::DebugError::BudgetExhausted { .. }) => {
                ErrorKind::Budget(self.to_string())
            }
            Self::Debug(e) => ErrorKind::Artifact(e.to_string()),
            Self::Llm(e) => ErrorKind::Resource(e.to_string()),
            Self::Deploy(msg) => ErrorKind::Artifact(msg.clone()),
            Self::Transition(e) => ErrorKind::Input(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_exhaustion_classifies_as_budget() {
        let err = ForgeFlowError::Debug(forgeflow_sandbox::error::DebugError::BudgetExhausted { max_attempts: 3 });
        assert!(matches!(err.kind(), ErrorKind::Budget(_)));
    }

    #[test]
    fn llm_error_classifies_as_resource_and_is_retryable() {
        let err = ForgeFlowError::Llm(forgeflow_llm::error::LlmError::Timeout);
        assert!(err.kind().is_retryable());
    }

    #[test]
    fn security_violation_feeds_self_debug() {
        let err = ForgeFlowError::Security(forgeflow_security::error::SecurityViolationError { blocking_count: 1 });
        assert!(err.kind().feeds_self_debug());
    }
}
