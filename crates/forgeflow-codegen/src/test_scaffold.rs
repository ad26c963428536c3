//! Deterministic smoke-test scaffolding: unlike every other codegen
//! concern, this never calls the LLM. The tests it emits only assert
//! that each step function exists and that the orchestrator runs to
//! completion given a trigger payload — enough to catch a malformed
//! artifact before it reaches the sandbox.

use forgeflow_types::dag::{StepType, WorkflowDag};

/// Render a smoke-test module for a planned DAG: one `#[tokio::test]`
/// per non-trigger step asserting its function exists (by reference),
/// plus one end-to-end test invoking `run_workflow`.
#[must_use]
pub fn scaffold_tests(dag: &WorkflowDag) -> String {
    let mut body = String::new();
    body.push_str("#[cfg(test)]\nmod generated_smoke_tests {\n    use super::*;\n\n");

    for step in &dag.steps {
        if step.step_type == StepType::Trigger {
            continue;
        }
        let fn_name = crate::artifact_writer::step_fn_name(step);
        body.push_str(&format!(
            "    #[tokio::test]\n\
             \u{20}   async fn {fn_name}_is_invocable() {{\n\
             \u{20}       let ctx = Context::new(serde_json::json!({{}}));\n\
             \u{20}       let _ = {fn_name}(&ctx).await;\n\
             \u{20}   }}\n\n"
        ));
    }

    body.push_str(
        "    #[tokio::test]\n\
         \u{20}   async fn run_workflow_completes_given_a_trigger_payload() {\n\
         \u{20}       let result = run_workflow(serde_json::json!({})).await;\n\
         \u{20}       assert!(result.is_ok());\n\
         \u{20}   }\n",
    );

    body.push_str("}\n");
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgeflow_types::dag::WorkflowStep;
    use forgeflow_types::endpoint::{ApiEndpointDocument, DiscoveredEndpoint};

    fn sample_dag() -> WorkflowDag {
        let mut dag = WorkflowDag::new("wf", "on request");
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
    fn scaffold_skips_trigger_and_covers_api_call_steps() {
        let rendered = scaffold_tests(&sample_dag());
        assert!(rendered.contains("step_post_message_is_invocable"));
        assert!(!rendered.contains("step_trigger_is_invocable"));
    }

    #[test]
    fn scaffold_always_includes_an_end_to_end_smoke_test() {
        let rendered = scaffold_tests(&sample_dag());
        assert!(rendered.contains("run_workflow_completes_given_a_trigger_payload"));
    }
}
