//! The bounded, iterative tool-calling driver: a transcript-in,
//! decision-out loop where the LLM client is a pure function from
//! transcript to `AgentTurn`, and the driver performs every side effect.

use crate::error::CodegenError;
use crate::tools::{ToolExecutor, ToolInvocationLog};
use forgeflow_llm::client::{AgentTurn, LlmClient, ToolMessage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Ceiling on tool invocations within one `run()` call (one per step).
pub const MAX_INVOCATIONS_PER_STEP: usize = 8;

/// Ceiling on tool invocations across an entire codegen session (all
/// steps plus the orchestrator), shared via [`ToolLoop::total_invocations`].
pub const MAX_INVOCATIONS_TOTAL: usize = 40;

/// The outcome of one bounded tool-calling run: the finished artifact
/// text and the full log of tool invocations made to reach it.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// The artifact text the agent finished with.
    pub artifact: String,
    /// Every tool invocation made during this run, in order.
    pub invocations: Vec<ToolInvocationLog>,
}

/// Drives the bounded tool-calling loop for one piece of work (one
/// step's source, or the final orchestrator). A single [`ToolLoop`]
/// instance is shared across all of a codegen session's `run()` calls
/// so the total ceiling is enforced cumulatively.
pub struct ToolLoop {
    llm: Arc<dyn LlmClient>,
    executor: Arc<ToolExecutor>,
    total_invocations: AtomicUsize,
    max_per_run: usize,
    max_total: usize,
}

impl ToolLoop {
    /// Construct a loop over the given LLM client and tool executor,
    /// with the recommended ceilings from the tool protocol contract.
    #[must_use]
    pub fn new(llm: Arc<dyn LlmClient>, executor: Arc<ToolExecutor>) -> Self {
        Self {
            llm,
            executor,
            total_invocations: AtomicUsize::new(0),
            max_per_run: MAX_INVOCATIONS_PER_STEP,
            max_total: MAX_INVOCATIONS_TOTAL,
        }
    }

    /// Override the per-run ceiling, e.g. for the orchestrator pass
    /// which may reasonably need more turns than a single step.
    #[must_use]
    pub fn with_max_per_run(mut self, max: usize) -> Self {
        self.max_per_run = max;
        self
    }

    /// Run the loop to completion starting from `system_prompt`,
    /// stopping at `finish`, a malformed-turn-after-retry, or a
    /// ceiling breach.
    pub async fn run(&self, system_prompt: &str) -> Result<RunOutcome, CodegenError> {
        let mut transcript = vec![ToolMessage::new("system", system_prompt)];
        let mut invocations = Vec::new();
        let mut this_run_count = 0usize;

        loop {
            let turn = self.next_turn_with_retry(&transcript).await?;

            match turn {
                AgentTurn::Finish { artifact } => {
                    return Ok(RunOutcome { artifact, invocations });
                }
                AgentTurn::ToolCall { tool, input } => {
                    this_run_count += 1;
                    let total_so_far = self.total_invocations.fetch_add(1, Ordering::SeqCst) + 1;

                    if this_run_count > self.max_per_run {
                        return Err(CodegenError::CeilingExceeded {
                            ceiling: self.max_per_run,
                        });
                    }
                    if total_so_far > self.max_total {
                        return Err(CodegenError::CeilingExceeded { ceiling: self.max_total });
                    }

                    let result_text = match self.executor.execute(&tool, &input) {
                        Ok(text) => text,
                        Err(e) => format!("error: {e}"),
                    };

                    invocations.push(ToolInvocationLog { tool: tool.clone(), input });
                    transcript.push(ToolMessage::new("assistant", format!("tool_call: {tool}")));
                    transcript.push(ToolMessage::new("tool", result_text));
                }
                AgentTurn::Malformed { .. } => unreachable!("handled by next_turn_with_retry"),
            }
        }
    }

    /// Fetch the next turn, retrying once on a malformed response per
    /// the tool protocol contract ("a turn that returns neither a tool
    /// call nor a finish is treated as a malformed response and retried
    /// once; a second failure is fatal").
    async fn next_turn_with_retry(&self, transcript: &[ToolMessage]) -> Result<AgentTurn, CodegenError> {
        let first = self
            .llm
            .next_turn(transcript)
            .await
            .map_err(|e| CodegenError::Llm(e.to_string()))?;

        if !matches!(first, AgentTurn::Malformed { .. }) {
            return Ok(first);
        }

        let mut retry_transcript = transcript.to_vec();
        retry_transcript.push(ToolMessage::new(
            "system",
            "Your previous response was not a valid tool call or finish. \
             Respond with exactly one JSON object: either {\"tool\": ..., \"input\": ...} \
             or {\"finish\": true, \"artifact\": ...}.",
        ));

        let second = self
            .llm
            .next_turn(&retry_transcript)
            .await
            .map_err(|e| CodegenError::Llm(e.to_string()))?;

        if matches!(second, AgentTurn::Malformed { .. }) {
            return Err(CodegenError::MalformedTurn);
        }

        Ok(second)
    }
}
