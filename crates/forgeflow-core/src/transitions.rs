//! The stage-transition table: an explicit adjacency list rather than a
//! deep call chain, so the allowed graph-shaped state with back-edges
//! (self-debug re-entering security review, clarification re-entering
//! conversation) is visible in one place.

use forgeflow_types::pipeline_state::Stage;
use thiserror::Error;

/// Raised when the runner attempts a transition the table forbids.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("illegal stage transition: {from:?} -> {to:?}")]
pub struct IllegalTransition {
    /// The stage the run was leaving.
    pub from: Stage,
    /// The stage the run attempted to enter.
    pub to: Stage,
}

/// The stages reachable in one step from `from`.
#[must_use]
pub fn allowed_transitions(from: Stage) -> Vec<Stage> {
    use Stage::{
        ApiDiscovery, Cancelled, ClarificationSuspend, Codegen, Conversation, Deploy, Done, Failed, Mapper, Planner,
        SandboxExecute, Security, SelfDebug, TestScaffold,
    };
    match from {
        Conversation => vec![ApiDiscovery, ClarificationSuspend, Failed],
        ClarificationSuspend => vec![Conversation, Cancelled],
        ApiDiscovery => vec![Planner, Failed],
        Planner => vec![Mapper, Failed],
        Mapper => vec![Codegen, Failed],
        Codegen => vec![Security, Failed],
        Security => vec![TestScaffold, SelfDebug, Failed],
        TestScaffold => vec![SandboxExecute, Failed],
        SandboxExecute => vec![Deploy, SelfDebug, Failed],
        SelfDebug => vec![Security, Failed],
        Deploy => vec![Done, Failed],
        Done | Failed | Cancelled => vec![],
    }
}

/// Validate that `from -> to` is an edge in the transition table.
pub fn validate_transition(from: Stage, to: Stage) -> Result<(), IllegalTransition> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(IllegalTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_can_suspend_for_clarification() {
        assert!(validate_transition(Stage::Conversation, Stage::ClarificationSuspend).is_ok());
    }

    #[test]
    fn self_debug_re_enters_security_review_not_sandbox_directly() {
        assert!(validate_transition(Stage::SelfDebug, Stage::Security).is_ok());
        assert!(validate_transition(Stage::SelfDebug, Stage::SandboxExecute).is_err());
    }

    #[test]
    fn terminal_stages_have_no_outgoing_transitions() {
        assert!(allowed_transitions(Stage::Done).is_empty());
        assert!(allowed_transitions(Stage::Failed).is_empty());
        assert!(allowed_transitions(Stage::Cancelled).is_empty());
    }

    #[test]
    fn cannot_skip_security_review_from_codegen_to_sandbox() {
        assert!(validate_transition(Stage::Codegen, Stage::SandboxExecute).is_err());
    }
}
