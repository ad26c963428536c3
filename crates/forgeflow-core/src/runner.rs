//! The pipeline runner: the stage-dispatch loop driving one
//! [`PipelineState`] through conversation, discovery, planning, mapping,
//! code generation, security review, test scaffolding, sandbox
//! execution, self-debug, and deploy, checkpointing and emitting events
//! at every transition.
//!
//! Each stage is a [`PipelineStage`] trait object, following the
//! teacher's `NodeExecutor`/`Scheduler` seam: stages are composed behind
//! one dispatch table rather than a deep call chain, so a stage can be
//! swapped or exercised in isolation without touching the driver loop.

use crate::checkpoint::{CheckpointError, CheckpointStore};
use crate::config::Config;
use crate::conversation::ConversationEngine;
use crate::deploy::Packager;
use crate::error::ForgeFlowError;
use crate::secrets::SecretResolver;
use crate::transitions::validate_transition;
use async_trait::async_trait;
use dashmap::DashMap;
use forgeflow_codegen::prelude::{step_fn_name, CodeGenerator};
use forgeflow_discovery::prelude::Discoverer;
use forgeflow_events::prelude::{EventEnvelope, EventSink};
use forgeflow_planner::prelude::{Mapper, PlanInput, Planner};
use forgeflow_sandbox::prelude::{DebugError, InProcessValidator, SandboxBackend, SelfDebugger};
use forgeflow_security::prelude::Scanner;
use forgeflow_types::prelude::*;
use std::collections::HashMap as StdHashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

/// Wall-clock ceiling for one pipeline run end to end, independent of
/// the per-LLM-call timeout (handled inside `HttpLlmClient`) and the
/// per-sandbox-execution timeout (handled inside `ContainerBackend`).
pub const DEFAULT_PIPELINE_TIMEOUT: Duration = Duration::from_secs(180);

/// Errors surfaced directly by the runner, as opposed to a stage's
/// underlying collaborator.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// A stage raised an unrecoverable pipeline error.
    #[error(transparent)]
    Pipeline(#[from] ForgeFlowError),
    /// The checkpoint store could not load or save a run.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    /// A resume was requested for a run that is not suspended awaiting
    /// clarification.
    #[error("run {0} is not suspended awaiting clarification")]
    NotSuspended(CorrelationId),
    /// The whole-pipeline wall-clock budget was exceeded.
    #[error("pipeline run exceeded its {0:?} wall-clock budget")]
    Timeout(Duration),
}

/// A cooperative cancellation flag, checked at every stage boundary.
/// Cloning shares the same underlying channel, following the teacher's
/// lightweight `watch`-based coordination rather than a heavier
/// cancellation-token crate.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl CancellationToken {
    /// Construct a fresh, not-yet-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    /// Signal cancellation to every holder of this token.
    pub fn cancel(&self) {
        let _ = self.sender.send(true);
    }

    /// Whether cancellation has been signalled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// One stage of the pipeline, driven by [`PipelineRunner::drive`].
///
/// Implementations own the full lifecycle of their transition: emitting
/// `stage.started`/`stage.completed` events, validating and performing
/// the transition to the next stage via [`validate_transition`], and
/// recording a terminal failure via [`PipelineState::fail`] when the
/// stage's contract calls for one. Returning `Err` leaves `state.stage`
/// unchanged, signalling the driver loop that the stage may be retried.
#[async_trait]
pub trait PipelineStage: Send + Sync {
    /// The stage tag this implementation drives.
    fn stage(&self) -> Stage;

    /// Advance `state` by one stage.
    async fn run(&self, state: &mut PipelineState) -> Result<(), ForgeFlowError>;
}

async fn emit(
    events: &dyn EventSink,
    state: &mut PipelineState,
    event_type: &str,
    phase: &str,
    data: Option<serde_json::Value>,
) {
    let seq = state.next_seq();
    let mut envelope = EventEnvelope::new(state.correlation_id, seq, state.stage, event_type, phase, chrono::Utc::now());
    if let Some(data) = data {
        envelope = envelope.with_data(data);
    }
    if let Err(err) = events.emit(envelope).await {
        tracing::debug!(%err, correlation_id = %state.correlation_id, "event emission failed; continuing");
    }
}

struct ConversationStage {
    conversation: Arc<ConversationEngine>,
    events: Arc<dyn EventSink>,
    confidence_threshold: f64,
}

#[async_trait]
impl PipelineStage for ConversationStage {
    fn stage(&self) -> Stage {
        Stage::Conversation
    }

    async fn run(&self, state: &mut PipelineState) -> Result<(), ForgeFlowError> {
        emit(&*self.events, state, "stage.started", "started", None).await;

        let record = self.conversation.extract(&state.original_description).await?;
        let confidence = record.confidence;
        let questions: Vec<String> = record.clarification_questions.iter().take(2).cloned().collect();
        state.requirement = Some(record);

        if confidence >= self.confidence_threshold {
            emit(
                &*self.events,
                state,
                "stage.completed",
                "completed",
                Some(serde_json::json!({ "confidence": confidence })),
            )
            .await;
            validate_transition(Stage::Conversation, Stage::ApiDiscovery)?;
            state.transition_to(Stage::ApiDiscovery);
        } else {
            emit(
                &*self.events,
                state,
                "conversation.clarification_needed",
                "suspended",
                Some(serde_json::json!({ "confidence": confidence, "questions": questions })),
            )
            .await;
            validate_transition(Stage::Conversation, Stage::ClarificationSuspend)?;
            state.transition_to(Stage::ClarificationSuspend);
        }

        Ok(())
    }
}

struct ApiDiscoveryStage {
    discoverer: Arc<Discoverer>,
    events: Arc<dyn EventSink>,
}

#[async_trait]
impl PipelineStage for ApiDiscoveryStage {
    fn stage(&self) -> Stage {
        Stage::ApiDiscovery
    }

    async fn run(&self, state: &mut PipelineState) -> Result<(), ForgeFlowError> {
        emit(&*self.events, state, "stage.started", "started", None).await;

        let requirement = state
            .requirement
            .clone()
            .ok_or_else(|| ForgeFlowError::Input("no requirement record entering discovery".to_string()))?;

        if requirement.has_no_actions() {
            state.fail("MISSING_PARAM", "no actions were extracted from the request");
            emit(&*self.events, state, "stage.failed", "failed", None).await;
            return Ok(());
        }

        let report = self.discoverer.discover_all(&requirement.actions).await?;

        if !report.skipped_miss.is_empty() {
            emit(
                &*self.events,
                state,
                "discovery.miss",
                "failed",
                Some(serde_json::json!({ "verbs": report.skipped_miss })),
            )
            .await;
        }
        if !report.skipped_credential.is_empty() {
            emit(
                &*self.events,
                state,
                "discovery.skipped",
                "failed",
                Some(serde_json::json!({ "verbs": report.skipped_credential })),
            )
            .await;
        }
        if report.partial {
            emit(&*self.events, state, "discovery.partial", "completed", None).await;
        }

        state.skipped_action_verbs = report
            .skipped_miss
            .iter()
            .chain(report.skipped_credential.iter())
            .cloned()
            .collect();
        state.discovered = report.matched;

        if state.discovered.is_empty() {
            state.fail("MISSING_PARAM", "no action resolved to a discovered endpoint");
            emit(&*self.events, state, "stage.failed", "failed", None).await;
            return Ok(());
        }

        emit(&*self.events, state, "stage.completed", "completed", None).await;
        validate_transition(Stage::ApiDiscovery, Stage::Planner)?;
        state.transition_to(Stage::Planner);
        Ok(())
    }
}

struct PlannerStage {
    planner: Arc<Planner>,
    events: Arc<dyn EventSink>,
}

#[async_trait]
impl PipelineStage for PlannerStage {
    fn stage(&self) -> Stage {
        Stage::Planner
    }

    async fn run(&self, state: &mut PipelineState) -> Result<(), ForgeFlowError> {
        emit(&*self.events, state, "stage.started", "started", None).await;

        let requirement = state
            .requirement
            .clone()
            .ok_or_else(|| ForgeFlowError::Input("no requirement record entering planner".to_string()))?;

        let skipped: HashSet<&str> = state.skipped_action_verbs.iter().map(String::as_str).collect();
        let kept_actions: Vec<Action> = requirement
            .actions
            .iter()
            .filter(|action| !skipped.contains(action.verb.as_str()))
            .cloned()
            .collect();

        let inputs: Vec<PlanInput> = kept_actions
            .into_iter()
            .zip(state.discovered.iter().cloned())
            .map(|(action, endpoint)| PlanInput {
                action,
                endpoint: Some(endpoint),
            })
            .collect();

        let mut environment_vars: Vec<String> = state
            .discovered
            .iter()
            .map(|discovered| discovered.document.credential_env_var())
            .collect();
        environment_vars.sort();
        environment_vars.dedup();

        let output = self
            .planner
            .plan(requirement.summary.clone(), requirement.summary.clone(), environment_vars, &inputs)?;

        for warning in &output.warnings {
            emit(
                &*self.events,
                state,
                "planner.cycle_warning",
                "completed",
                Some(serde_json::json!({ "warning": warning })),
            )
            .await;
        }

        state.dag = Some(output.dag);
        emit(&*self.events, state, "stage.completed", "completed", None).await;
        validate_transition(Stage::Planner, Stage::Mapper)?;
        state.transition_to(Stage::Mapper);
        Ok(())
    }
}

struct MapperStage {
    mapper: Arc<Mapper>,
    events: Arc<dyn EventSink>,
}

#[async_trait]
impl PipelineStage for MapperStage {
    fn stage(&self) -> Stage {
        Stage::Mapper
    }

    async fn run(&self, state: &mut PipelineState) -> Result<(), ForgeFlowError> {
        emit(&*self.events, state, "stage.started", "started", None).await;

        let mut dag = state
            .dag
            .clone()
            .ok_or_else(|| ForgeFlowError::Input("no dag entering mapper".to_string()))?;
        let summary = state
            .requirement
            .as_ref()
            .map(|r| r.summary.clone())
            .unwrap_or_default();

        for index in 0..dag.steps.len() {
            if dag.steps[index].step_type == StepType::Trigger {
                continue;
            }

            let depends_on = dag.steps[index].depends_on.clone();
            let producer_id = depends_on
                .iter()
                .filter_map(|id| dag.steps.iter().find(|s| s.id == *id))
                .max_by_key(|s| s.depth)
                .map(|s| s.id)
                .or_else(|| dag.root().map(|r| r.id));

            let Some(producer_id) = producer_id else {
                continue;
            };
            let Some(producer) = dag.steps.iter().find(|s| s.id == producer_id).cloned() else {
                continue;
            };
            let consumer = dag.steps[index].clone();

            let expression = self.mapper.map_edge(&producer, &consumer, &summary).await?;
            dag.steps[index].input_binding = Some(expression);
        }

        state.dag = Some(dag);
        emit(&*self.events, state, "stage.completed", "completed", None).await;
        validate_transition(Stage::Mapper, Stage::Codegen)?;
        state.transition_to(Stage::Codegen);
        Ok(())
    }
}

struct CodegenStage {
    generator: Arc<CodeGenerator>,
    events: Arc<dyn EventSink>,
}

#[async_trait]
impl PipelineStage for CodegenStage {
    fn stage(&self) -> Stage {
        Stage::Codegen
    }

    async fn run(&self, state: &mut PipelineState) -> Result<(), ForgeFlowError> {
        emit(&*self.events, state, "stage.started", "started", None).await;

        let dag = state
            .dag
            .clone()
            .ok_or_else(|| ForgeFlowError::Input("no dag entering codegen".to_string()))?;

        let artifact = self.generator.generate(&dag).await?;
        state.artifact = Some(artifact);

        emit(&*self.events, state, "stage.completed", "completed", None).await;
        validate_transition(Stage::Codegen, Stage::Security)?;
        state.transition_to(Stage::Security);
        Ok(())
    }
}

/// Marker stored in a synthetic [`ExecutionResult`] when security review
/// fails, so [`SelfDebugStage`] can classify straight to
/// `SECURITY_VIOLATION` rather than spending an LLM call reclassifying
/// a category it already knows.
const SECURITY_BLOCK_MARKER: &str = "security review blocked";

struct SecurityStage {
    scanner: Arc<Scanner>,
    events: Arc<dyn EventSink>,
}

#[async_trait]
impl PipelineStage for SecurityStage {
    fn stage(&self) -> Stage {
        Stage::Security
    }

    async fn run(&self, state: &mut PipelineState) -> Result<(), ForgeFlowError> {
        emit(&*self.events, state, "stage.started", "started", None).await;

        let artifact = state
            .artifact
            .clone()
            .ok_or_else(|| ForgeFlowError::Input("no artifact entering security review".to_string()))?;

        match self.scanner.enforce(&artifact.source) {
            Ok(_advisory_violations) => {
                emit(&*self.events, state, "stage.completed", "completed", None).await;
                validate_transition(Stage::Security, Stage::TestScaffold)?;
                state.transition_to(Stage::TestScaffold);
            }
            Err(violation) => {
                emit(
                    &*self.events,
                    state,
                    "security.blocked",
                    "failed",
                    Some(serde_json::json!({ "blocking_count": violation.blocking_count })),
                )
                .await;
                state.last_execution = Some(ExecutionResult {
                    exit_status: 1,
                    stdout: String::new(),
                    stderr: format!("{SECURITY_BLOCK_MARKER}: {} blocking violation(s)", violation.blocking_count),
                    elapsed_ms: 0,
                    step_statuses: Vec::new(),
                });
                validate_transition(Stage::Security, Stage::SelfDebug)?;
                state.transition_to(Stage::SelfDebug);
            }
        }

        Ok(())
    }
}

struct TestScaffoldStage {
    events: Arc<dyn EventSink>,
}

#[async_trait]
impl PipelineStage for TestScaffoldStage {
    fn stage(&self) -> Stage {
        Stage::TestScaffold
    }

    async fn run(&self, state: &mut PipelineState) -> Result<(), ForgeFlowError> {
        emit(&*self.events, state, "stage.started", "started", None).await;

        let dag = state
            .dag
            .clone()
            .ok_or_else(|| ForgeFlowError::Input("no dag entering test scaffolding".to_string()))?;
        let mut artifact = state
            .artifact
            .clone()
            .ok_or_else(|| ForgeFlowError::Input("no artifact entering test scaffolding".to_string()))?;

        let tests = forgeflow_codegen::prelude::scaffold_tests(&dag);
        artifact.source.push_str(&tests);
        state.artifact = Some(artifact);

        emit(&*self.events, state, "stage.completed", "completed", None).await;
        validate_transition(Stage::TestScaffold, Stage::SandboxExecute)?;
        state.transition_to(Stage::SandboxExecute);
        Ok(())
    }
}

struct SandboxExecuteStage {
    primary: Arc<dyn SandboxBackend>,
    fallback: Arc<InProcessValidator>,
    secrets: Arc<dyn SecretResolver>,
    sandbox_timeout: Duration,
    events: Arc<dyn EventSink>,
}

#[async_trait]
impl PipelineStage for SandboxExecuteStage {
    fn stage(&self) -> Stage {
        Stage::SandboxExecute
    }

    async fn run(&self, state: &mut PipelineState) -> Result<(), ForgeFlowError> {
        emit(&*self.events, state, "stage.started", "started", None).await;

        let dag = state
            .dag
            .clone()
            .ok_or_else(|| ForgeFlowError::Input("no dag entering sandbox execution".to_string()))?;
        let artifact = state
            .artifact
            .clone()
            .ok_or_else(|| ForgeFlowError::Input("no artifact entering sandbox execution".to_string()))?;

        let resolved_env = self
            .secrets
            .resolve_all(&dag.environment_vars)
            .await
            .map_err(|e| forgeflow_sandbox::error::SandboxError::BackendUnavailable(e.to_string()))?;

        let result = match self.primary.execute(&artifact.source, &resolved_env, self.sandbox_timeout).await {
            Ok(result) => result,
            Err(forgeflow_sandbox::error::SandboxError::BackendUnavailable(reason)) => {
                emit(
                    &*self.events,
                    state,
                    "sandbox.fallback",
                    "started",
                    Some(serde_json::json!({ "reason": reason })),
                )
                .await;
                let step_names: Vec<(StepId, String)> = dag
                    .steps
                    .iter()
                    .filter(|s| s.step_type != StepType::Trigger)
                    .map(|s| (s.id, step_fn_name(s)))
                    .collect();
                self.fallback.validate_against(&artifact.source, &step_names)
            }
            Err(other) => ExecutionResult {
                exit_status: -1,
                stdout: String::new(),
                stderr: other.to_string(),
                elapsed_ms: 0,
                step_statuses: Vec::new(),
            },
        };

        let succeeded = result.succeeded();
        state.last_execution = Some(result);

        if succeeded {
            emit(&*self.events, state, "stage.completed", "completed", None).await;
            validate_transition(Stage::SandboxExecute, Stage::Deploy)?;
            state.transition_to(Stage::Deploy);
        } else {
            emit(&*self.events, state, "stage.failed", "failed", None).await;
            validate_transition(Stage::SandboxExecute, Stage::SelfDebug)?;
            state.transition_to(Stage::SelfDebug);
        }

        Ok(())
    }
}

struct SelfDebugStage {
    debugger: Arc<SelfDebugger>,
    events: Arc<dyn EventSink>,
}

#[async_trait]
impl PipelineStage for SelfDebugStage {
    fn stage(&self) -> Stage {
        Stage::SelfDebug
    }

    async fn run(&self, state: &mut PipelineState) -> Result<(), ForgeFlowError> {
        emit(&*self.events, state, "stage.started", "started", None).await;

        let attempt = state.debug_history.len() as u32 + 1;
        let artifact = state
            .artifact
            .clone()
            .ok_or_else(|| ForgeFlowError::Input("no artifact entering self-debug".to_string()))?;
        let dag = state
            .dag
            .clone()
            .ok_or_else(|| ForgeFlowError::Input("no dag entering self-debug".to_string()))?;
        let execution = state
            .last_execution
            .clone()
            .ok_or_else(|| ForgeFlowError::Input("no execution result entering self-debug".to_string()))?;

        let (category, root_cause) = if execution.stderr.starts_with(SECURITY_BLOCK_MARKER) {
            (ErrorCategory::SecurityViolation, execution.stderr.clone())
        } else {
            self.debugger.classify(&execution).await?
        };

        emit(
            &*self.events,
            state,
            "debug.classified",
            "completed",
            Some(serde_json::json!({ "attempt": attempt, "category": format!("{category:?}") })),
        )
        .await;

        let required_step_fns: Vec<String> = dag
            .steps
            .iter()
            .filter(|s| s.step_type != StepType::Trigger)
            .map(step_fn_name)
            .collect();
        let required_env_vars = dag.environment_vars.clone();

        match self
            .debugger
            .patch(attempt, &artifact.source, category, &root_cause, &required_step_fns, &required_env_vars)
            .await
        {
            Ok((record, patched_source)) => {
                state.debug_history.push(record);
                let mut patched_artifact = artifact;
                patched_artifact.set_source(patched_source);
                state.artifact = Some(patched_artifact);

                emit(
                    &*self.events,
                    state,
                    "debug.patched",
                    "completed",
                    Some(serde_json::json!({ "attempt": attempt })),
                )
                .await;
                validate_transition(Stage::SelfDebug, Stage::Security)?;
                state.transition_to(Stage::Security);
            }
            Err(DebugError::BudgetExhausted { max_attempts }) => {
                let last_category = state
                    .debug_history
                    .last()
                    .map(|r| format!("{:?}", r.category))
                    .unwrap_or_else(|| format!("{category:?}"));
                state.fail(
                    last_category,
                    format!("self-debug budget of {max_attempts} attempts exhausted: {root_cause}"),
                );
                emit(&*self.events, state, "stage.failed", "failed", None).await;
            }
            Err(other) => return Err(ForgeFlowError::Debug(other)),
        }

        Ok(())
    }
}

struct DeployStage {
    packager: Arc<dyn Packager>,
    events: Arc<dyn EventSink>,
}

#[async_trait]
impl PipelineStage for DeployStage {
    fn stage(&self) -> Stage {
        Stage::Deploy
    }

    async fn run(&self, state: &mut PipelineState) -> Result<(), ForgeFlowError> {
        emit(&*self.events, state, "stage.started", "started", None).await;

        let dag = state
            .dag
            .clone()
            .ok_or_else(|| ForgeFlowError::Input("no dag entering deploy".to_string()))?;
        let artifact = state
            .artifact
            .clone()
            .ok_or_else(|| ForgeFlowError::Input("no artifact entering deploy".to_string()))?;
        let execution = state
            .last_execution
            .clone()
            .ok_or_else(|| ForgeFlowError::Input("no execution result entering deploy".to_string()))?;

        match self.packager.hand_off(&artifact, &dag, &dag.environment_vars, &execution).await {
            Ok(()) => {
                emit(&*self.events, state, "stage.completed", "completed", None).await;
                validate_transition(Stage::Deploy, Stage::Done)?;
                state.transition_to(Stage::Done);
            }
            Err(err) => {
                state.fail("DEPLOY_FAILED", err.to_string());
                emit(&*self.events, state, "stage.failed", "failed", None).await;
            }
        }

        Ok(())
    }
}

/// Construction parameters for [`PipelineRunner::new`], grouped to keep
/// the constructor signature from sprawling across a dozen positional
/// arguments.
pub struct RunnerDeps {
    /// Requirement-extraction collaborator.
    pub conversation: Arc<ConversationEngine>,
    /// Semantic endpoint discovery collaborator.
    pub discoverer: Arc<Discoverer>,
    /// DAG planning collaborator.
    pub planner: Arc<Planner>,
    /// Data-mapping collaborator.
    pub mapper: Arc<Mapper>,
    /// Code generation collaborator.
    pub generator: Arc<CodeGenerator>,
    /// Static security scanner.
    pub scanner: Arc<Scanner>,
    /// Primary sandbox backend.
    pub sandbox_primary: Arc<dyn SandboxBackend>,
    /// Structural-only fallback used when the primary backend is unavailable.
    pub sandbox_fallback: Arc<InProcessValidator>,
    /// Self-debug classify/patch collaborator.
    pub debugger: Arc<SelfDebugger>,
    /// External deploy handoff.
    pub packager: Arc<dyn Packager>,
    /// Per-service credential resolver.
    pub secrets: Arc<dyn SecretResolver>,
    /// Checkpoint storage.
    pub checkpoints: Arc<dyn CheckpointStore>,
    /// Progress event sink.
    pub events: Arc<dyn EventSink>,
}

/// Drives pipeline state through every stage, checkpointing after each
/// transition and honoring the whole-run wall-clock budget, external
/// cancellation, and the clarification suspend/resume cycle.
pub struct PipelineRunner {
    config: Config,
    checkpoints: Arc<dyn CheckpointStore>,
    events: Arc<dyn EventSink>,
    cancellations: DashMap<CorrelationId, CancellationToken>,
    stages: StdHashMap<Stage, Box<dyn PipelineStage>>,
}

impl PipelineRunner {
    /// Construct a runner wiring one collaborator per pipeline stage.
    #[must_use]
    pub fn new(config: Config, deps: RunnerDeps) -> Self {
        let mut stages: StdHashMap<Stage, Box<dyn PipelineStage>> = StdHashMap::new();

        stages.insert(
            Stage::Conversation,
            Box::new(ConversationStage {
                conversation: deps.conversation,
                events: Arc::clone(&deps.events),
                confidence_threshold: config.confidence_threshold,
            }),
        );
        stages.insert(
            Stage::ApiDiscovery,
            Box::new(ApiDiscoveryStage {
                discoverer: deps.discoverer,
                events: Arc::clone(&deps.events),
            }),
        );
        stages.insert(
            Stage::Planner,
            Box::new(PlannerStage {
                planner: deps.planner,
                events: Arc::clone(&deps.events),
            }),
        );
        stages.insert(
            Stage::Mapper,
            Box::new(MapperStage {
                mapper: deps.mapper,
                events: Arc::clone(&deps.events),
            }),
        );
        stages.insert(
            Stage::Codegen,
            Box::new(CodegenStage {
                generator: deps.generator,
                events: Arc::clone(&deps.events),
            }),
        );
        stages.insert(
            Stage::Security,
            Box::new(SecurityStage {
                scanner: deps.scanner,
                events: Arc::clone(&deps.events),
            }),
        );
        stages.insert(
            Stage::TestScaffold,
            Box::new(TestScaffoldStage {
                events: Arc::clone(&deps.events),
            }),
        );
        stages.insert(
            Stage::SandboxExecute,
            Box::new(SandboxExecuteStage {
                primary: deps.sandbox_primary,
                fallback: deps.sandbox_fallback,
                secrets: deps.secrets,
                sandbox_timeout: config.sandbox_timeout,
                events: Arc::clone(&deps.events),
            }),
        );
        stages.insert(
            Stage::SelfDebug,
            Box::new(SelfDebugStage {
                debugger: deps.debugger,
                events: Arc::clone(&deps.events),
            }),
        );
        stages.insert(
            Stage::Deploy,
            Box::new(DeployStage {
                packager: deps.packager,
                events: Arc::clone(&deps.events),
            }),
        );

        Self {
            config,
            checkpoints: deps.checkpoints,
            events: deps.events,
            cancellations: DashMap::new(),
            stages,
        }
    }

    /// Start a new pipeline run from a free-text workflow description.
    pub async fn start(&self, description: impl Into<String>) -> Result<PipelineState, RunnerError> {
        let correlation_id = CorrelationId::new();
        let mut state = PipelineState::new(correlation_id).with_description(description);
        let token = CancellationToken::new();
        self.cancellations.insert(correlation_id, token);

        self.drive(&mut state).await?;
        Ok(state)
    }

    /// Resume a suspended run with a clarification answer.
    pub async fn resume_with_clarification(
        &self,
        correlation_id: CorrelationId,
        answer: &str,
    ) -> Result<PipelineState, RunnerError> {
        let mut state = self.checkpoints.load(correlation_id).await?;
        if state.stage != Stage::ClarificationSuspend {
            return Err(RunnerError::NotSuspended(correlation_id));
        }

        let original_description = state.original_description.clone();
        state.original_description = format!("{original_description}\n\nClarification: {answer}");
        validate_transition(Stage::ClarificationSuspend, Stage::Conversation).map_err(ForgeFlowError::from)?;
        state.transition_to(Stage::Conversation);

        self.cancellations.entry(correlation_id).or_insert_with(CancellationToken::new);
        self.drive(&mut state).await?;
        Ok(state)
    }

    /// Signal cooperative cancellation for a run, checked at the next
    /// stage boundary.
    pub fn cancel(&self, correlation_id: CorrelationId) {
        if let Some(token) = self.cancellations.get(&correlation_id) {
            token.cancel();
        }
    }

    async fn drive(&self, state: &mut PipelineState) -> Result<(), RunnerError> {
        let timeout_result = tokio::time::timeout(DEFAULT_PIPELINE_TIMEOUT, self.drive_inner(state)).await;
        match timeout_result {
            Ok(result) => result,
            Err(_) => {
                state.fail("TIMEOUT", format!("pipeline exceeded its {DEFAULT_PIPELINE_TIMEOUT:?} wall-clock budget"));
                self.checkpoints.save(state).await?;
                Err(RunnerError::Timeout(DEFAULT_PIPELINE_TIMEOUT))
            }
        }
    }

    async fn drive_inner(&self, state: &mut PipelineState) -> Result<(), RunnerError> {
        let mut resource_retries: StdHashMap<Stage, u32> = StdHashMap::new();

        loop {
            if state.stage.is_terminal() || state.stage == Stage::ClarificationSuspend {
                break;
            }

            if let Some(token) = self.cancellations.get(&state.correlation_id) {
                if token.is_cancelled() {
                    emit(&*self.events, state, "pipeline.cancelled", "cancelled", None).await;
                    state.transition_to(Stage::Cancelled);
                    break;
                }
            }

            let Some(stage_impl) = self.stages.get(&state.stage) else {
                break;
            };

            if let Err(err) = stage_impl.run(state).await {
                let failing_stage = state.stage;
                let kind = err.kind();

                if kind.is_retryable() {
                    let count = resource_retries.entry(failing_stage).or_insert(0);
                    *count += 1;
                    emit(
                        &*self.events,
                        state,
                        "stage.failed",
                        "failed",
                        Some(serde_json::json!({ "error": err.to_string(), "retry": *count })),
                    )
                    .await;

                    if *count > 2 {
                        state.fail("UNKNOWN", format!("resource unavailable after retries: {err}"));
                    }
                } else {
                    let category = Self::fallback_category(&err);
                    emit(
                        &*self.events,
                        state,
                        "stage.failed",
                        "failed",
                        Some(serde_json::json!({ "error": err.to_string() })),
                    )
                    .await;
                    state.fail(category, err.to_string());
                }
            }

            self.checkpoints.save(state).await?;
        }

        self.checkpoints.save(state).await?;
        if state.stage.is_terminal() {
            self.cancellations.remove(&state.correlation_id);
        }
        Ok(())
    }

    fn fallback_category(err: &ForgeFlowError) -> &'static str {
        match err.kind() {
            ErrorKind::Input(_) => "MISSING_PARAM",
            ErrorKind::Resource(_) => "NETWORK_ERROR",
            ErrorKind::Content(_) => "SCHEMA_MISMATCH",
            ErrorKind::Artifact(_) => "UNKNOWN",
            ErrorKind::Budget(_) => "LOGIC_ERROR",
        }
    }
}
