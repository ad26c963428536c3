//! The workflow DAG: steps, dependencies, and the top-level trigger.

use crate::endpoint::DiscoveredEndpoint;
use crate::ids::StepId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// What kind of step this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    /// The root trigger that starts the workflow.
    Trigger,
    /// A call to a discovered API endpoint.
    ApiCall,
    /// A branch condition.
    Condition,
    /// A time delay.
    Delay,
}

/// How a step's failure should be handled at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Retry with bounded exponential backoff.
    Retry,
    /// Swallow the error and record it, continuing the workflow.
    Fallback,
    /// Propagate the error to the orchestrator, aborting the run.
    Abort,
}

/// One node in the workflow DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Stable identifier.
    pub id: StepId,
    /// Human-readable name.
    pub name: String,
    /// Description of what the step does.
    pub description: String,
    /// Step kind.
    pub step_type: StepType,
    /// The endpoint this step is bound to, if it is an API call.
    pub endpoint: Option<DiscoveredEndpoint>,
    /// Input-binding expression synthesized by the data mapper.
    pub input_binding: Option<String>,
    /// Declared shape of this step's output, consumed by downstream bindings.
    pub output_schema: serde_json::Value,
    /// Ids of steps this step depends on.
    pub depends_on: Vec<StepId>,
    /// Failure-handling policy.
    pub error_policy: ErrorPolicy,
    /// Optional guard expression gating execution of this step.
    pub guard: Option<String>,
    /// Depth in the DAG: 0 for the trigger, else `1 + max(depth(d))` over dependencies.
    pub depth: usize,
}

impl WorkflowStep {
    /// Construct the root trigger step.
    #[must_use]
    pub fn trigger(name: impl Into<String>, output_schema: serde_json::Value) -> Self {
        Self {
            id: StepId::new(),
            name: name.into(),
            description: "workflow trigger".to_string(),
            step_type: StepType::Trigger,
            endpoint: None,
            input_binding: None,
            output_schema,
            depends_on: Vec::new(),
            error_policy: ErrorPolicy::Abort,
            guard: None,
            depth: 0,
        }
    }

    /// Construct an API-call step bound to a discovered endpoint.
    #[must_use]
    pub fn api_call(name: impl Into<String>, endpoint: DiscoveredEndpoint) -> Self {
        let output_schema = endpoint.document.response_schema.clone();
        Self {
            id: StepId::new(),
            name: name.into(),
            description: endpoint.document.description.clone(),
            step_type: StepType::ApiCall,
            endpoint: Some(endpoint),
            input_binding: None,
            output_schema,
            depends_on: Vec::new(),
            error_policy: ErrorPolicy::Retry,
            guard: None,
            depth: 0,
        }
    }

    /// Add a dependency on another step.
    #[must_use]
    pub fn depends_on(mut self, id: StepId) -> Self {
        if !self.depends_on.contains(&id) {
            self.depends_on.push(id);
        }
        self
    }

    /// Set the input-binding expression.
    #[must_use]
    pub fn with_input_binding(mut self, expression: impl Into<String>) -> Self {
        self.input_binding = Some(expression.into());
        self
    }

    /// Set the error policy.
    #[must_use]
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }
}

/// Errors raised validating a [`WorkflowDag`]'s structural invariants.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DagError {
    /// A step depends on an id that does not appear earlier in the step list.
    #[error("step {step} depends on {dependency}, which does not precede it")]
    DanglingDependency {
        /// The dependent step.
        step: StepId,
        /// The missing/forward dependency.
        dependency: StepId,
    },
    /// The dependency graph contains a cycle.
    #[error("dependency graph contains a cycle")]
    CycleDetected,
    /// The DAG does not have exactly one root (trigger) step.
    #[error("expected exactly one trigger step, found {found}")]
    NotExactlyOneRoot {
        /// Number of trigger steps found.
        found: usize,
    },
    /// A step's input binding references a field unreachable from any ancestor or the trigger.
    #[error("step {step} references unreachable field `{field}`")]
    UnreachableFieldReference {
        /// The step whose binding is unsound.
        step: StepId,
        /// The offending field reference.
        field: String,
    },
}

/// The ordered, acyclic set of workflow steps produced by the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDag {
    /// Top-level workflow name.
    pub name: String,
    /// Natural-language description of the trigger.
    pub trigger_description: String,
    /// Environment variables the generated artifact must read credentials from.
    pub environment_vars: Vec<String>,
    /// Global error policy applied when a step does not declare its own.
    pub default_error_policy: ErrorPolicy,
    /// Steps in deterministic emission order: trigger first.
    pub steps: Vec<WorkflowStep>,
}

impl WorkflowDag {
    /// Construct an empty DAG with just a name and trigger description.
    #[must_use]
    pub fn new(name: impl Into<String>, trigger_description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            trigger_description: trigger_description.into(),
            environment_vars: Vec::new(),
            default_error_policy: ErrorPolicy::Abort,
            steps: Vec::new(),
        }
    }

    /// Root step of the DAG, if present.
    #[must_use]
    pub fn root(&self) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.step_type == StepType::Trigger)
    }

    /// Steps sharing the same depth as `step_id`, excluding `step_id` itself.
    #[must_use]
    pub fn parallel_group_of(&self, step_id: StepId) -> Vec<&WorkflowStep> {
        let Some(depth) = self.steps.iter().find(|s| s.id == step_id).map(|s| s.depth) else {
            return Vec::new();
        };
        self.steps
            .iter()
            .filter(|s| s.id != step_id && s.depth == depth)
            .collect()
    }

    /// Validate the four DAG invariants from the data model.
    pub fn validate(&self) -> Result<(), DagError> {
        let roots = self
            .steps
            .iter()
            .filter(|s| s.step_type == StepType::Trigger)
            .count();
        if roots != 1 {
            return Err(DagError::NotExactlyOneRoot { found: roots });
        }

        let mut seen: HashSet<StepId> = HashSet::new();
        for step in &self.steps {
            for dep in &step.depends_on {
                if !seen.contains(dep) {
                    return Err(DagError::DanglingDependency {
                        step: step.id,
                        dependency: *dep,
                    });
                }
            }
            seen.insert(step.id);
        }

        if Self::has_cycle(&self.steps) {
            return Err(DagError::CycleDetected);
        }

        Ok(())
    }

    /// Depth-first cycle check over the declared `depends_on` adjacency.
    fn has_cycle(steps: &[WorkflowStep]) -> bool {
        let adjacency: HashMap<StepId, &[StepId]> = steps
            .iter()
            .map(|s| (s.id, s.depends_on.as_slice()))
            .collect();

        let mut visiting: HashSet<StepId> = HashSet::new();
        let mut visited: HashSet<StepId> = HashSet::new();

        fn dfs(
            node: StepId,
            adjacency: &HashMap<StepId, &[StepId]>,
            visiting: &mut HashSet<StepId>,
            visited: &mut HashSet<StepId>,
        ) -> bool {
            if visiting.contains(&node) {
                return true;
            }
            if visited.contains(&node) {
                return false;
            }
            visiting.insert(node);
            if let Some(deps) = adjacency.get(&node) {
                for &dep in *deps {
                    if dfs(dep, adjacency, visiting, visited) {
                        return true;
                    }
                }
            }
            visiting.remove(&node);
            visited.insert(node);
            false
        }

        for step in steps {
            if !visited.contains(&step.id) && dfs(step.id, &adjacency, &mut visiting, &mut visited) {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_trigger_dag_validates() {
        let mut dag = WorkflowDag::new("wf", "on new message");
        dag.steps.push(WorkflowStep::trigger("trigger", serde_json::json!({})));
        assert!(dag.validate().is_ok());
    }

    #[test]
    fn dag_with_two_triggers_is_rejected() {
        let mut dag = WorkflowDag::new("wf", "trigger");
        dag.steps.push(WorkflowStep::trigger("t1", serde_json::json!({})));
        dag.steps.push(WorkflowStep::trigger("t2", serde_json::json!({})));
        assert!(matches!(dag.validate(), Err(DagError::NotExactlyOneRoot { found: 2 })));
    }

    #[test]
    fn dangling_dependency_is_rejected() {
        let mut dag = WorkflowDag::new("wf", "trigger");
        let trigger = WorkflowStep::trigger("trigger", serde_json::json!({}));
        let ghost_id = StepId::new();
        dag.steps.push(trigger);
        dag.steps.push(
            WorkflowStep {
                depends_on: vec![ghost_id],
                ..WorkflowStep::trigger("orphan", serde_json::json!({}))
            },
        );
        assert!(matches!(dag.validate(), Err(DagError::DanglingDependency { .. })));
    }

    #[test]
    fn cycle_is_rejected() {
        let mut dag = WorkflowDag::new("wf", "trigger");
        let trigger = WorkflowStep::trigger("trigger", serde_json::json!({}));
        let trigger_id = trigger.id;
        dag.steps.push(trigger);

        let mut a = WorkflowStep::api_call(
            "a",
            DiscoveredEndpoint {
                document: crate::endpoint::ApiEndpointDocument {
                    service: "svc".into(),
                    path: "p".into(),
                    method: "POST".into(),
                    description: "d".into(),
                    parameters: vec![],
                    response_schema: serde_json::json!({}),
                    auth_scheme: "none".into(),
                    example: String::new(),
                },
                match_score: 1.0,
                justification: "x".into(),
            },
        )
        .depends_on(trigger_id);
        let a_id = a.id;

        let b = WorkflowStep::api_call(
            "b",
            DiscoveredEndpoint {
                document: crate::endpoint::ApiEndpointDocument {
                    service: "svc".into(),
                    path: "q".into(),
                    method: "POST".into(),
                    description: "d".into(),
                    parameters: vec![],
                    response_schema: serde_json::json!({}),
                    auth_scheme: "none".into(),
                    example: String::new(),
                },
                match_score: 1.0,
                justification: "x".into(),
            },
        )
        .depends_on(a_id);
        let b_id = b.id;

        // Manually wire a back-edge from a onto b to create a cycle.
        a = a.depends_on(b_id);

        dag.steps.push(a);
        dag.steps.push(b);

        assert!(matches!(dag.validate(), Err(DagError::CycleDetected)));
    }

    #[test]
    fn parallel_group_returns_same_depth_siblings() {
        let mut dag = WorkflowDag::new("wf", "trigger");
        let trigger = WorkflowStep::trigger("trigger", serde_json::json!({}));
        let trigger_id = trigger.id;
        dag.steps.push(trigger);

        let mut email = WorkflowStep::trigger("send_email", serde_json::json!({}));
        email.depth = 1;
        email = email.depends_on(trigger_id);
        let email_id = email.id;

        let mut slack = WorkflowStep::trigger("create_slack", serde_json::json!({}));
        slack.depth = 1;
        slack = slack.depends_on(trigger_id);

        dag.steps.push(email);
        dag.steps.push(slack);

        assert_eq!(dag.parallel_group_of(email_id).len(), 1);
    }
}
