//! Assembles the final [`GeneratedArtifact`] from a planned DAG and its
//! per-step source fragments: one top-level orchestrator invoking each
//! step in DAG order, using an async concurrency primitive for parallel
//! groups, with credentials read only from the DAG's declared
//! environment variables and error handling per each step's policy.

use forgeflow_types::artifact::GeneratedArtifact;
use forgeflow_types::dag::{ErrorPolicy, StepType, WorkflowDag, WorkflowStep};
use std::collections::BTreeMap;

/// Find the environment variable declared for `service`, by convention
/// the DAG variable whose name contains the service's upper-cased
/// identifier (e.g. `slack` → `SLACK_BOT_TOKEN`).
#[must_use]
pub fn credential_env_var<'a>(service: &str, environment_vars: &'a [String]) -> Option<&'a str> {
    let needle = service.to_uppercase();
    environment_vars.iter().map(String::as_str).find(|v| v.contains(&needle))
}

/// Render the function name a step compiles to: a stable, identifier-safe
/// slug derived from its human name.
#[must_use]
pub fn step_fn_name(step: &WorkflowStep) -> String {
    let slug: String = step
        .name
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    format!("step_{slug}")
}

/// Render one step's source fragment: a named async function taking a
/// shared, read-only context and returning a [`StepOutcome`], wrapping
/// the call per the step's declared error-handling policy. Steps never
/// take `&mut Context` — every step in a parallel group is polled
/// concurrently under one `tokio::join!`, so a step only ever borrows
/// the context immutably; the orchestrator applies the resulting
/// outcome to the context once each step's future has resolved.
#[must_use]
pub fn render_step(step: &WorkflowStep, environment_vars: &[String]) -> String {
    let fn_name = step_fn_name(step);

    if step.step_type == StepType::Trigger {
        return format!(
            "async fn {fn_name}(ctx: &Context) -> Result<StepOutcome, StepError> {{\n\
             \u{20}   Ok(StepOutcome {{ value: ctx.trigger_payload.clone(), fallback_error: None }})\n\
             }}\n"
        );
    }

    let credential_line = step
        .endpoint
        .as_ref()
        .and_then(|e| credential_env_var(&e.document.service, environment_vars))
        .map(|var| format!("    let credential = std::env::var(\"{var}\")?;\n"))
        .unwrap_or_default();

    let binding_line = step
        .input_binding
        .as_ref()
        .map(|b| format!("    // input binding: {b}\n"))
        .unwrap_or_default();

    let call_body = format!(
        "{credential_line}{binding_line}    let result = invoke_endpoint(ctx, \"{}\", \"{}\").await?;",
        step.endpoint.as_ref().map(|e| e.document.service.as_str()).unwrap_or("unknown"),
        step.endpoint.as_ref().map(|e| e.document.path.as_str()).unwrap_or("unknown"),
    );

    let wrapped_body = match step.error_policy {
        ErrorPolicy::Retry => format!(
            "    let mut attempt = 0u32;\n\
             \u{20}   let mut delay_ms: u64 = 1000;\n\
             \u{20}   let value = loop {{\n\
             \u{20}       attempt += 1;\n\
             \u{20}       match (|| async {{\n{call_body}\n            Ok(result)\n        }})().await {{\n\
             \u{20}           Ok(value) => break value,\n\
             \u{20}           Err(_) if attempt < 3 => {{\n\
             \u{20}               tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;\n\
             \u{20}               delay_ms *= 2;\n\
             \u{20}           }}\n\
             \u{20}           Err(e) => return Err(e),\n\
             \u{20}       }}\n\
             \u{20}   }};\n\
             \u{20}   Ok(StepOutcome {{ value, fallback_error: None }})"
        ),
        ErrorPolicy::Fallback => format!(
            "    match (|| async {{\n{call_body}\n        Ok(result)\n    }})().await {{\n\
             \u{20}       Ok(value) => Ok(StepOutcome {{ value, fallback_error: None }}),\n\
             \u{20}       Err(e) => Ok(StepOutcome {{ value: serde_json::Value::Null, fallback_error: Some(e.to_string()) }}),\n\
             \u{20}   }}"
        ),
        ErrorPolicy::Abort => format!("{call_body}\n    Ok(StepOutcome {{ value: result, fallback_error: None }})"),
    };

    format!("async fn {fn_name}(ctx: &Context) -> Result<StepOutcome, StepError> {{\n{wrapped_body}\n}}\n")
}

/// Render the top-level orchestrator: invokes steps in DAG order,
/// grouping same-depth, independent steps under a concurrent join.
/// Every step borrows the context immutably (`&ctx`), including inside
/// `tokio::join!`, so concurrently-polled steps never alias a mutable
/// borrow; each step's outcome is only applied to `ctx` (via `record`
/// and `record_fallback_error`) after its future has resolved and the
/// shared borrow is no longer held.
#[must_use]
pub fn render_orchestrator(dag: &WorkflowDag) -> String {
    let mut by_depth: BTreeMap<usize, Vec<&WorkflowStep>> = BTreeMap::new();
    for step in &dag.steps {
        by_depth.entry(step.depth).or_default().push(step);
    }

    let mut body = String::new();
    for (_depth, steps) in &by_depth {
        if steps.len() == 1 {
            let fn_name = step_fn_name(steps[0]);
            body.push_str(&format!(
                "    let {fn_name}_outcome = {fn_name}(&ctx).await?;\n\
                 \u{20}   if let Some(err) = &{fn_name}_outcome.fallback_error {{\n\
                 \u{20}       ctx.record_fallback_error(\"{fn_name}\", err);\n\
                 \u{20}   }}\n\
                 \u{20}   ctx.record(\"{fn_name}\", {fn_name}_outcome.value);\n"
            ));
        } else {
            let calls: Vec<String> = steps.iter().map(|s| format!("{}(&ctx)", step_fn_name(s))).collect();
            let names: Vec<String> = steps.iter().map(|s| step_fn_name(s)).collect();
            body.push_str(&format!(
                "    let ({}) = tokio::join!({});\n",
                names.iter().map(|n| format!("{n}_result")).collect::<Vec<_>>().join(", "),
                calls.join(", "),
            ));
            for name in &names {
                body.push_str(&format!(
                    "    let {name}_outcome = {name}_result?;\n\
                     \u{20}   if let Some(err) = &{name}_outcome.fallback_error {{\n\
                     \u{20}       ctx.record_fallback_error(\"{name}\", err);\n\
                     \u{20}   }}\n\
                     \u{20}   ctx.record(\"{name}\", {name}_outcome.value);\n"
                ));
            }
        }
    }

    format!(
        "pub async fn run_workflow(trigger_payload: serde_json::Value) -> Result<Context, StepError> {{\n\
         \u{20}   let mut ctx = Context::new(trigger_payload);\n{body}    Ok(ctx)\n}}\n"
    )
}

/// Assemble a complete artifact from a DAG and the fragments written
/// for each of its steps during codegen.
#[must_use]
pub fn assemble(dag: &WorkflowDag, step_fragments: BTreeMap<forgeflow_types::ids::StepId, String>) -> GeneratedArtifact {
    let mut artifact = GeneratedArtifact::empty();
    artifact.imports = vec![
        "use serde_json;".to_string(),
        "use tokio;".to_string(),
    ];

    let preamble = format!(
        "{}\n\
         pub struct Context {{\n\
         \u{20}   pub trigger_payload: serde_json::Value,\n\
         \u{20}   pub outputs: std::collections::BTreeMap<String, serde_json::Value>,\n\
         \u{20}   pub fallback_errors: Vec<(String, String)>,\n\
         }}\n\n\
         impl Context {{\n\
         \u{20}   pub fn new(trigger_payload: serde_json::Value) -> Self {{\n\
         \u{20}       Self {{ trigger_payload, outputs: Default::default(), fallback_errors: Vec::new() }}\n\
         \u{20}   }}\n\
         \u{20}   pub fn record(&mut self, step: &str, value: serde_json::Value) {{\n\
         \u{20}       self.outputs.insert(step.to_string(), value);\n\
         \u{20}   }}\n\
         \u{20}   pub fn record_fallback_error(&mut self, step: &str, error: &str) {{\n\
         \u{20}       self.fallback_errors.push((step.to_string(), error.to_string()));\n\
         \u{20}   }}\n\
         }}\n\n\
         /// What a step produced: its output value, plus a fallback error\n\
         /// message when the step's policy swallowed a failure rather than\n\
         /// aborting the run.\n\
         pub struct StepOutcome {{\n\
         \u{20}   pub value: serde_json::Value,\n\
         \u{20}   pub fallback_error: Option<String>,\n\
         }}\n\n\
         #[derive(Debug, thiserror::Error)]\n\
         pub enum StepError {{\n\
         \u{20}   #[error(\"environment variable missing: {{0}}\")]\n\
         \u{20}   MissingEnv(#[from] std::env::VarError),\n\
         \u{20}   #[error(\"endpoint call failed: {{0}}\")]\n\
         \u{20}   EndpointCall(String),\n\
         }}\n",
        artifact.imports.join("\n")
    );
    artifact.set_source(preamble);

    for step in &dag.steps {
        if let Some(fragment) = step_fragments.get(&step.id) {
            artifact.push_step_fragment(step.id, fragment.clone());
        } else {
            artifact.push_step_fragment(step.id, render_step(step, &dag.environment_vars));
        }
    }

    let orchestrator = render_orchestrator(dag);
    artifact.source.push_str(&orchestrator);

    artifact
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgeflow_types::dag::WorkflowDag;
    use forgeflow_types::endpoint::{ApiEndpointDocument, DiscoveredEndpoint};

    fn sample_dag() -> WorkflowDag {
        let mut dag = WorkflowDag::new("wf", "on request");
        dag.environment_vars = vec!["SLACK_BOT_TOKEN".to_string()];
        let trigger = WorkflowStep::trigger("trigger", serde_json::json!({}));
        let trigger_id = trigger.id;
        dag.steps.push(trigger);

        let endpoint = DiscoveredEndpoint {
            document: ApiEndpointDocument {
                service: "slack".to_string(),
                path: "chat.postMessage".to_string(),
                method: "POST".to_string(),
                description: "post".to_string(),
                parameters: vec![],
                response_schema: serde_json::json!({}),
                auth_scheme: "bearer_token".to_string(),
                example: String::new(),
            },
            match_score: 0.9,
            justification: "x".to_string(),
        };
        let mut step = WorkflowStep::api_call("post_message", endpoint).depends_on(trigger_id);
        step.depth = 1;
        dag.steps.push(step);
        dag
    }

    #[test]
    fn credential_env_var_matches_by_service_name() {
        let vars = vec!["SLACK_BOT_TOKEN".to_string(), "GMAIL_ADDRESS".to_string()];
        assert_eq!(credential_env_var("slack", &vars), Some("SLACK_BOT_TOKEN"));
        assert_eq!(credential_env_var("discord", &vars), None);
    }

    #[test]
    fn rendered_step_reads_credential_from_declared_env_var_only() {
        let dag = sample_dag();
        let step = &dag.steps[1];
        let rendered = render_step(step, &dag.environment_vars);
        assert!(rendered.contains("std::env::var(\"SLACK_BOT_TOKEN\")"));
        // No literal-looking credential value anywhere in the fragment.
        assert!(!rendered.contains("xoxb-"));
    }

    #[test]
    fn retry_policy_wraps_call_in_backoff_loop() {
        let mut dag = sample_dag();
        dag.steps[1] = dag.steps[1].clone().with_error_policy(ErrorPolicy::Retry);
        let rendered = render_step(&dag.steps[1], &dag.environment_vars);
        assert!(rendered.contains("delay_ms"));
        assert!(rendered.contains("attempt < 3"));
    }

    #[test]
    fn assemble_produces_single_module_with_orchestrator_and_steps() {
        let dag = sample_dag();
        let artifact = assemble(&dag, BTreeMap::new());
        assert!(artifact.source.contains("pub async fn run_workflow"));
        assert!(artifact.source.contains("step_trigger"));
        assert!(artifact.source.contains("step_post_message"));
    }

    #[test]
    fn orchestrator_uses_join_for_parallel_group() {
        let mut dag = sample_dag();
        let mut second = dag.steps[1].clone();
        second.id = forgeflow_types::ids::StepId::new();
        second.name = "create_slack_account".to_string();
        second.depth = 1;
        dag.steps.push(second);

        let orchestrator = render_orchestrator(&dag);
        assert!(orchestrator.contains("tokio::join!"));
        // Every argument passed into the join must be a shared borrow: two
        // steps polled concurrently under the same join can never each
        // hold `&mut ctx` without aliasing.
        assert!(!orchestrator.contains("&mut ctx"));
        assert!(orchestrator.contains("step_post_message(&ctx)"));
        assert!(orchestrator.contains("step_create_slack_account(&ctx)"));
        // Mutation happens only after both futures resolve.
        assert!(orchestrator.contains("step_post_message_outcome = step_post_message_result?"));
        assert!(orchestrator.contains("ctx.record(\"step_post_message\""));
    }

    #[test]
    fn single_step_orchestrator_never_takes_mutable_borrow_into_the_call() {
        let dag = sample_dag();
        let orchestrator = render_orchestrator(&dag);
        assert!(!orchestrator.contains("&mut ctx"));
        assert!(orchestrator.contains("step_post_message(&ctx)"));
    }

    #[test]
    fn fallback_outcome_carries_error_without_mutable_context_access() {
        let mut dag = sample_dag();
        dag.steps[1] = dag.steps[1].clone().with_error_policy(ErrorPolicy::Fallback);
        let rendered = render_step(&dag.steps[1], &dag.environment_vars);
        assert!(rendered.contains("ctx: &Context"));
        assert!(rendered.contains("Result<StepOutcome, StepError>"));
        assert!(rendered.contains("fallback_error: Some(e.to_string())"));
        assert!(!rendered.contains("&mut Context"));
    }
}
