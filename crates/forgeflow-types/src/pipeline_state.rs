//! The composite pipeline state threaded through every stage.

use crate::artifact::GeneratedArtifact;
use crate::dag::WorkflowDag;
use crate::debug::DebugRecord;
use crate::endpoint::DiscoveredEndpoint;
use crate::execution::ExecutionResult;
use crate::ids::CorrelationId;
use crate::requirement::RequirementRecord;
use serde::{Deserialize, Serialize};

/// The current stage tag of a pipeline run, including its two terminal
/// and two suspended/looping states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Extracting a requirement record from free text.
    Conversation,
    /// Suspended awaiting a clarification answer.
    ClarificationSuspend,
    /// Matching actions to corpus endpoints.
    ApiDiscovery,
    /// Building the ordered, acyclic step graph.
    Planner,
    /// Synthesizing inter-step input bindings.
    Mapper,
    /// Running the tool-calling code generation agent.
    Codegen,
    /// Statically scanning the generated artifact.
    Security,
    /// Producing smoke tests for each step.
    TestScaffold,
    /// Executing the artifact in the sandbox.
    SandboxExecute,
    /// Diagnosing and patching a sandbox failure.
    SelfDebug,
    /// Handing the artifact to the external packager.
    Deploy,
    /// Terminal: the workflow was deployed successfully.
    Done,
    /// Terminal: the run failed after exhausting its retry budget.
    Failed,
    /// Terminal: the run was cancelled externally.
    Cancelled,
}

impl Stage {
    /// Whether this stage tag is one of the pipeline's terminal states.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }
}

/// Structured description of a terminal failure, surfaced to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    /// The stage the pipeline was in when it failed.
    pub stage: Stage,
    /// The classified error category, as a string (mirrors `ErrorCategory` when applicable).
    pub category: String,
    /// One-sentence root cause.
    pub root_cause: String,
    /// The last debug record, if the failure followed a self-debug exhaustion.
    pub last_debug_record: Option<DebugRecord>,
}

/// The composite record threaded through all stages of one pipeline run.
///
/// Exclusively mutated by the pipeline runner; observers only ever see
/// snapshots delivered through the event sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    /// Unique identifier for this run.
    pub correlation_id: CorrelationId,
    /// The original free-text workflow description, kept for the
    /// conversation stage to fold a clarification answer into on resume.
    pub original_description: String,
    /// Extracted requirement record, once stage 1 has run.
    pub requirement: Option<RequirementRecord>,
    /// Endpoints discovered for each action.
    pub discovered: Vec<DiscoveredEndpoint>,
    /// Verbs of actions dropped by discovery (miss or missing credential),
    /// in original textual order, so the planner can zip the remaining
    /// actions against `discovered` positionally without re-querying.
    pub skipped_action_verbs: Vec<String>,
    /// The planned workflow DAG.
    pub dag: Option<WorkflowDag>,
    /// The current generated artifact.
    pub artifact: Option<GeneratedArtifact>,
    /// The most recent sandbox execution result.
    pub last_execution: Option<ExecutionResult>,
    /// History of self-debug attempts, in order; the first attempt's
    /// record is never removed even if a later attempt succeeds.
    pub debug_history: Vec<DebugRecord>,
    /// Current stage tag.
    pub stage: Stage,
    /// Monotonically increasing event sequence number for this correlation id.
    pub event_seq: u64,
    /// Populated once the pipeline reaches `Failed`.
    pub failure: Option<FailureReport>,
}

impl PipelineState {
    /// Start a fresh pipeline state for a new correlation id.
    #[must_use]
    pub fn new(correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            original_description: String::new(),
            requirement: None,
            discovered: Vec::new(),
            skipped_action_verbs: Vec::new(),
            dag: None,
            artifact: None,
            last_execution: None,
            debug_history: Vec::new(),
            stage: Stage::Conversation,
            event_seq: 0,
            failure: None,
        }
    }

    /// Attach the original free-text description this run was started from.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.original_description = description.into();
        self
    }

    /// Allocate and return the next monotonic event sequence number.
    pub fn next_seq(&mut self) -> u64 {
        self.event_seq += 1;
        self.event_seq
    }

    /// Move to a new stage.
    pub fn transition_to(&mut self, stage: Stage) {
        self.stage = stage;
    }

    /// Record a terminal failure.
    pub fn fail(&mut self, category: impl Into<String>, root_cause: impl Into<String>) {
        self.failure = Some(FailureReport {
            stage: self.stage,
            category: category.into(),
            root_cause: root_cause.into(),
            last_debug_record: self.debug_history.last().cloned(),
        });
        self.stage = Stage::Failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_starts_at_conversation_with_zero_seq() {
        let state = PipelineState::new(CorrelationId::new());
        assert_eq!(state.stage, Stage::Conversation);
        assert_eq!(state.event_seq, 0);
    }

    #[test]
    fn next_seq_is_monotonically_increasing() {
        let mut state = PipelineState::new(CorrelationId::new());
        let a = state.next_seq();
        let b = state.next_seq();
        assert!(b > a);
    }

    #[test]
    fn fail_sets_terminal_stage_and_preserves_first_debug_record() {
        let mut state = PipelineState::new(CorrelationId::new());
        state.debug_history.push(DebugRecord {
            attempt: 1,
            category: crate::debug::ErrorCategory::ImportError,
            root_cause: "missing module".to_string(),
            fix_description: "added import".to_string(),
            diff: String::new(),
        });
        state.fail("IMPORT_ERROR", "missing module");

        assert_eq!(state.stage, Stage::Failed);
        assert!(state.stage.is_terminal());
        assert_eq!(state.failure.unwrap().last_debug_record.unwrap().attempt, 1);
    }

    #[test]
    fn round_trips_through_json() {
        let state = PipelineState::new(CorrelationId::new());
        let json = serde_json::to_string(&state).unwrap();
        let back: PipelineState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, back);
    }
}
