//! Synthesizes one input-binding expression per DAG edge, constrained
//! to the producer's declared output schema.

use crate::error::PlannerError;
use forgeflow_llm::client::LlmClient;
use forgeflow_types::dag::WorkflowStep;
use std::sync::Arc;

/// Drives one LLM JSON call per edge to produce a pure value-transform
/// input-binding expression, e.g.
/// `message = format("Price moved {pct}%", pct = step_1.output.change_pct)`.
pub struct Mapper {
    llm: Arc<dyn LlmClient>,
}

impl Mapper {
    /// Construct a mapper over the given LLM client.
    #[must_use]
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Synthesize the binding expression for one edge: `producer` feeds
    /// `consumer`. `user_description` is the original natural-language
    /// request, included in the prompt for disambiguation.
    pub async fn map_edge(
        &self,
        producer: &WorkflowStep,
        consumer: &WorkflowStep,
        user_description: &str,
    ) -> Result<String, PlannerError> {
        let prompt = format!(
            "Producer step `{}` has output schema:\n{}\n\n\
             Consumer step `{}` needs input matching its endpoint's parameter schema.\n\
             User's original request: {user_description}\n\n\
             Synthesize a pure value-transformation input-binding expression for the \
             consumer, referencing only fields present in the producer's output schema \
             or the trigger payload. Do not introduce side effects.",
            producer.name,
            producer.output_schema,
            consumer.name,
        );

        let response = self
            .llm
            .complete_json(&prompt, r#"{"expression": string}"#)
            .await
            .map_err(|e| PlannerError::Llm(e.to_string()))?;

        let expression = response
            .get("expression")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| PlannerError::Llm("mapper response missing `expression` field".to_string()))?
            .to_string();

        Self::validate_reachable(consumer, producer, &expression)?;

        Ok(expression)
    }

    /// Reject an expression that references a field not present in the
    /// producer's output schema (and not a reference to the trigger
    /// payload, which is always reachable).
    fn validate_reachable(
        consumer: &WorkflowStep,
        producer: &WorkflowStep,
        expression: &str,
    ) -> Result<(), PlannerError> {
        if expression.contains("trigger.") {
            return Ok(());
        }

        let Some(schema_fields) = producer.output_schema.as_object() else {
            // An empty/untyped producer schema (e.g. the placeholder used
            // before codegen assigns a concrete shape) cannot be checked
            // structurally; accept the expression rather than rejecting
            // the plan on a schema the producer hasn't declared yet.
            return Ok(());
        };

        let producer_ref = format!("{}.output.", producer.name);
        if !expression.contains(&producer_ref) {
            // The expression doesn't reference the producer at all: nothing
            // to validate against this edge's schema.
            return Ok(());
        }

        for field in schema_fields.keys() {
            if expression.contains(&format!("{producer_ref}{field}")) {
                return Ok(());
            }
        }

        Err(PlannerError::UnreachableFieldReference {
            step: consumer.name.clone(),
            field: expression.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgeflow_test_utils::MockLlmClient;
    use forgeflow_types::dag::WorkflowStep;

    fn producer_with_schema() -> WorkflowStep {
        let mut step = WorkflowStep::trigger("step_1", serde_json::json!({"change_pct": "number"}));
        step.name = "step_1".to_string();
        step
    }

    #[tokio::test]
    async fn synthesizes_expression_referencing_producer_field() {
        let llm = Arc::new(MockLlmClient::new().with_json_response(serde_json::json!({
            "expression": "message = format(\"Price moved {pct}%\", pct = step_1.output.change_pct)"
        })));
        let mapper = Mapper::new(llm);

        let producer = producer_with_schema();
        let consumer = WorkflowStep::trigger("step_2", serde_json::json!({}));

        let expression = mapper.map_edge(&producer, &consumer, "notify on price moves").await.unwrap();
        assert!(expression.contains("step_1.output.change_pct"));
    }

    #[tokio::test]
    async fn rejects_expression_referencing_unknown_field() {
        let llm = Arc::new(MockLlmClient::new().with_json_response(serde_json::json!({
            "expression": "message = step_1.output.nonexistent_field"
        })));
        let mapper = Mapper::new(llm);

        let producer = producer_with_schema();
        let consumer = WorkflowStep::trigger("step_2", serde_json::json!({}));

        let result = mapper.map_edge(&producer, &consumer, "notify").await;
        assert!(matches!(result, Err(PlannerError::UnreachableFieldReference { .. })));
    }
}
