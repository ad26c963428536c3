//! Errors raised by the planner and data mapper.

use thiserror::Error;

/// Errors planning a workflow DAG or mapping its edges.
#[derive(Debug, Error)]
pub enum PlannerError {
    /// The requirement record carried zero actions; there is nothing to plan.
    #[error("requirement record has no actions to plan")]
    NoActions,
    /// The assembled DAG failed its structural invariants.
    #[error("planned dag is invalid: {0}")]
    InvalidDag(#[from] forgeflow_types::dag::DagError),
    /// The data mapper's LLM call failed.
    #[error("data mapper llm call failed: {0}")]
    Llm(String),
    /// The LLM emitted a binding expression referencing a field outside
    /// the producer's declared output schema.
    #[error("binding expression for step {step} references field `{field}` absent from producer schema")]
    UnreachableFieldReference {
        /// The consuming step.
        step: String,
        /// The offending field reference.
        field: String,
    },
}
