//! Produces an ordered, acyclic workflow DAG from a requirement record's
//! actions and their discovered endpoints.

use crate::error::PlannerError;
use forgeflow_types::dag::{ErrorPolicy, WorkflowDag, WorkflowStep};
use forgeflow_types::endpoint::DiscoveredEndpoint;
use forgeflow_types::ids::StepId;
use forgeflow_types::requirement::Action;
use std::collections::HashMap;

/// Control-sequence words the planner scans an action's ordering hint
/// for, to infer a dependency on another, earlier-described action.
const CONTROL_WORDS: [&str; 3] = ["after", "when", "then"];

/// One action paired with the endpoint discovery resolved it to, if any.
/// Actions with no resolved endpoint (a `discovery.miss`) are dropped
/// from the DAG entirely, per the discovery failure policy.
#[derive(Debug, Clone)]
pub struct PlanInput {
    /// The action as extracted by the conversation stage.
    pub action: Action,
    /// The endpoint discovery resolved it to, or `None` if skipped.
    pub endpoint: Option<DiscoveredEndpoint>,
}

/// The result of one `Planner::plan` call: the assembled DAG plus any
/// non-fatal warnings raised while breaking cycles.
#[derive(Debug, Clone)]
pub struct PlanOutput {
    /// The planned, validated workflow DAG.
    pub dag: WorkflowDag,
    /// Human-readable warnings, one per dropped back-reference.
    pub warnings: Vec<String>,
}

/// Builds the ordered dependency/parallelism graph described in the
/// DAG planner contract.
#[derive(Debug, Default)]
pub struct Planner;

impl Planner {
    /// Construct a planner. Stateless; kept as a type for symmetry with
    /// the other pipeline stages and to give tests and the runner a
    /// consistent handle to depend on.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Plan a DAG: root trigger first, then one step per resolved
    /// action in textual order, with dependencies inferred from
    /// explicit data references and control-sequence language.
    pub fn plan(
        &self,
        workflow_name: impl Into<String>,
        trigger_description: impl Into<String>,
        environment_vars: Vec<String>,
        inputs: &[PlanInput],
    ) -> Result<PlanOutput, PlannerError> {
        if inputs.is_empty() {
            return Err(PlannerError::NoActions);
        }

        let mut dag = WorkflowDag::new(workflow_name, trigger_description);
        dag.environment_vars = environment_vars;
        dag.default_error_policy = ErrorPolicy::Abort;

        let trigger = WorkflowStep::trigger("trigger", serde_json::json!({ "payload": "object" }));
        let trigger_id = trigger.id;
        dag.steps.push(trigger);

        // verb -> (step id, position in `inputs`), built incrementally so a
        // later action can only ever depend on an earlier one, matching
        // "the later step in textual order wins" tie-break.
        let mut verb_to_step: HashMap<String, (StepId, usize)> = HashMap::new();
        let mut warnings = Vec::new();

        for (position, input) in inputs.iter().enumerate() {
            let Some(endpoint) = input.endpoint.clone() else {
                continue;
            };

            let mut step = WorkflowStep::api_call(&input.action.verb, endpoint).depends_on(trigger_id);

            let mut dependency_positions = vec![1usize]; // depth of a step depending only on the trigger (depth 0)

            for referenced_verb in Self::referenced_verbs(&input.action, &verb_to_step) {
                let (dep_id, dep_position) = verb_to_step[&referenced_verb];
                if dep_position >= position {
                    // Cannot happen given the incremental build order, but
                    // guards the invariant explicitly rather than relying
                    // on it implicitly.
                    warnings.push(format!(
                        "dropped back-reference from `{}` to `{}`: later step in textual order wins",
                        input.action.verb, referenced_verb
                    ));
                    continue;
                }
                step = step.depends_on(dep_id);
                dependency_positions.push(dep_position + 1);
            }

            step.depth = dependency_positions.into_iter().max().unwrap_or(1);

            verb_to_step.insert(input.action.verb.clone(), (step.id, position));
            dag.steps.push(step);
        }

        // A cycle cannot actually form given the incremental, earlier-only
        // dependency construction above; `validate` re-checks the full
        // invariant set regardless, so planner bugs fail loudly in tests
        // rather than silently producing an unusable DAG.
        dag.validate()?;

        Ok(PlanOutput { dag, warnings })
    }

    /// Verbs this action references, via an explicit data dependency
    /// (a parameter value naming another action's verb) or a control
    /// dependency (an ordering hint containing "after"/"when"/"then"
    /// followed by another action's verb).
    fn referenced_verbs(action: &Action, known: &HashMap<String, (StepId, usize)>) -> Vec<String> {
        let mut referenced = Vec::new();

        for value in action.parameters.values() {
            for verb in known.keys() {
                if value.contains(verb.as_str()) && !referenced.contains(verb) {
                    referenced.push(verb.clone());
                }
            }
        }

        if let Some(hint) = &action.ordering_hint {
            let lower = hint.to_lowercase();
            if CONTROL_WORDS.iter().any(|w| lower.contains(w)) {
                for verb in known.keys() {
                    if lower.contains(verb.as_str()) && !referenced.contains(verb) {
                        referenced.push(verb.clone());
                    }
                }
            }
        }

        referenced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgeflow_test_utils::sample_corpus;
    use forgeflow_types::requirement::Action;

    fn endpoint_for(service: &str, path: &str) -> DiscoveredEndpoint {
        let document = sample_corpus()
            .into_iter()
            .find(|d| d.service == service && d.path == path)
            .expect("fixture endpoint present");
        DiscoveredEndpoint {
            document,
            match_score: 0.9,
            justification: "test fixture".to_string(),
        }
    }

    #[test]
    fn happy_slack_post_has_two_steps_and_one_root() {
        let inputs = vec![PlanInput {
            action: Action::new("post_message").with_service("slack"),
            endpoint: Some(endpoint_for("slack", "chat.postMessage")),
        }];

        let output = Planner::new()
            .plan("notify", "on request", vec!["SLACK_BOT_TOKEN".to_string()], &inputs)
            .unwrap();

        assert_eq!(output.dag.steps.len(), 2);
        assert!(output.dag.root().is_some());
        assert!(output.warnings.is_empty());
    }

    #[test]
    fn parallelizable_actions_share_depth_and_trigger_parent() {
        let inputs = vec![
            PlanInput {
                action: Action::new("send_email").with_service("gmail"),
                endpoint: Some(endpoint_for("gmail", "messages.send")),
            },
            PlanInput {
                action: Action::new("create_slack_account").with_service("slack"),
                endpoint: Some(endpoint_for("slack", "users.admin.invite")),
            },
        ];

        let output = Planner::new()
            .plan("onboarding", "on new hire", vec![], &inputs)
            .unwrap();

        let email_step = output.dag.steps.iter().find(|s| s.name == "send_email").unwrap();
        let slack_step = output
            .dag
            .steps
            .iter()
            .find(|s| s.name == "create_slack_account")
            .unwrap();

        assert_eq!(email_step.depth, slack_step.depth);
        assert_eq!(output.dag.parallel_group_of(email_step.id).len(), 1);
    }

    #[test]
    fn explicit_control_dependency_orders_steps() {
        let inputs = vec![
            PlanInput {
                action: Action::new("create_slack_account").with_service("slack"),
                endpoint: Some(endpoint_for("slack", "users.admin.invite")),
            },
            PlanInput {
                action: Action::new("send_email")
                    .with_service("gmail")
                    .with_ordering_hint("after create_slack_account"),
                endpoint: Some(endpoint_for("gmail", "messages.send")),
            },
        ];

        let output = Planner::new().plan("onboarding", "on new hire", vec![], &inputs).unwrap();

        let slack_step = output
            .dag
            .steps
            .iter()
            .find(|s| s.name == "create_slack_account")
            .unwrap();
        let email_step = output.dag.steps.iter().find(|s| s.name == "send_email").unwrap();

        assert!(email_step.depends_on.contains(&slack_step.id));
        assert!(email_step.depth > slack_step.depth);
    }

    #[test]
    fn skipped_actions_with_no_endpoint_are_dropped_from_dag() {
        let inputs = vec![
            PlanInput {
                action: Action::new("post_message").with_service("slack"),
                endpoint: Some(endpoint_for("slack", "chat.postMessage")),
            },
            PlanInput {
                action: Action::new("do_something_unsupported"),
                endpoint: None,
            },
        ];

        let output = Planner::new().plan("wf", "on request", vec![], &inputs).unwrap();
        assert_eq!(output.dag.steps.len(), 2);
        assert!(!output
            .dag
            .steps
            .iter()
            .any(|s| s.name == "do_something_unsupported"));
    }

    #[test]
    fn no_actions_is_an_error() {
        let result = Planner::new().plan("wf", "on request", vec![], &[]);
        assert!(matches!(result, Err(PlannerError::NoActions)));
    }

    proptest::proptest! {
        #[test]
        fn planned_dags_are_always_acyclic(n in 1usize..6) {
            let inputs: Vec<PlanInput> = (0..n)
                .map(|i| PlanInput {
                    action: Action::new(format!("verb_{i}")),
                    endpoint: Some(endpoint_for("slack", "chat.postMessage")),
                })
                .collect();

            let output = Planner::new().plan("wf", "on request", vec![], &inputs).unwrap();
            prop_assert!(output.dag.validate().is_ok());
        }
    }
}
