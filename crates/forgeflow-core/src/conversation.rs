//! The conversation engine: structured-JSON requirement extraction and
//! deterministic confidence scoring. Clarification is never a blocking
//! call here — low confidence only ever produces a `RequirementRecord`
//! with `clarification_questions` populated; suspending the run is the
//! runner's job (`Stage::ClarificationSuspend`).

use forgeflow_llm::client::LlmClient;
use forgeflow_types::requirement::{Action, RequirementRecord};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors extracting a requirement record from free text.
#[derive(Debug, Error)]
pub enum ConversationError {
    /// The extraction LLM call failed outright.
    #[error("requirement extraction failed: {0}")]
    Llm(String),
    /// The response was unparseable even after the one allowed retry.
    #[error("schema_parse_failure: could not extract a requirement record after retry")]
    SchemaParseFailure,
}

/// Relative weight of "at least one action was extracted" in the
/// confidence score.
const WEIGHT_HAS_ACTIONS: f64 = 0.3;
/// Relative weight of the fraction of actions carrying a resolvable service hint.
const WEIGHT_SERVICE_RESOLVABILITY: f64 = 0.4;
/// Relative weight of the fraction of actions carrying at least one parameter.
const WEIGHT_REQUIRED_PARAMETERS: f64 = 0.3;

/// Drives free-text requirement extraction via one structured-JSON LLM
/// call, with deterministic confidence scoring independent of whatever
/// confidence the model itself reports.
pub struct ConversationEngine {
    llm: Arc<dyn LlmClient>,
}

impl ConversationEngine {
    /// Construct an engine over the given LLM client.
    #[must_use]
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Extract a requirement record from a free-text workflow description.
    pub async fn extract(&self, description: &str) -> Result<RequirementRecord, ConversationError> {
        let record = self.extract_once(description).await?;
        Ok(self.score(record))
    }

    /// Re-run extraction after a clarification answer, folding the
    /// answer into the same description text rather than threading a
    /// separate merge step — the model sees the full context every time.
    pub async fn resume_with_answer(
        &self,
        original_description: &str,
        answer: &str,
    ) -> Result<RequirementRecord, ConversationError> {
        let combined = format!("{original_description}\n\nClarification: {answer}");
        self.extract(&combined).await
    }

    /// Make one extraction call; if the response is valid JSON but the
    /// wrong shape, retry once with a stricter reminder before giving
    /// up. A transport-level failure (the LLM call itself erroring) is
    /// not retried here — that's the runner's resource-error policy.
    async fn extract_once(&self, description: &str) -> Result<RequirementRecord, ConversationError> {
        let prompt = Self::prompt_for(description);
        let value = self
            .llm
            .complete_json(&prompt, Self::schema_hint())
            .await
            .map_err(|e| ConversationError::Llm(e.to_string()))?;

        if let Some(record) = Self::parse(&value) {
            return Ok(record);
        }

        let retry_prompt = Self::retry_prompt_for(description);
        let retry_value = self
            .llm
            .complete_json(&retry_prompt, Self::schema_hint())
            .await
            .map_err(|e| ConversationError::Llm(e.to_string()))?;

        Self::parse(&retry_value).ok_or(ConversationError::SchemaParseFailure)
    }

    fn prompt_for(description: &str) -> String {
        format!(
            "Extract a structured requirement record from this workflow description:\n\
             \"{description}\"\n\n\
             Identify the trigger and each discrete action, including a best-guess \
             service name, the action verb, its parameters, and any ordering hint \
             relative to other actions."
        )
    }

    /// Stricter reminder sent after a first response fails to match the
    /// schema, per the spec's one-retry-then-fatal contract.
    fn retry_prompt_for(description: &str) -> String {
        format!(
            "{}\n\n\
             Your previous response did not match the required JSON schema. \
             Respond with ONLY a single JSON object matching exactly this shape, \
             no surrounding prose: {}",
            Self::prompt_for(description),
            Self::schema_hint()
        )
    }

    fn schema_hint() -> &'static str {
        r#"{"summary": string, "actions": [{"service_hint": string|null, "verb": string, "parameters": object, "ordering_hint": string|null, "excluded_services": [string]}], "assumed_defaults": [string]}"#
    }

    fn parse(value: &serde_json::Value) -> Option<RequirementRecord> {
        let summary = value.get("summary")?.as_str()?.to_string();
        let raw_actions = value.get("actions")?.as_array()?;

        let mut actions = Vec::with_capacity(raw_actions.len());
        for raw in raw_actions {
            let verb = raw.get("verb")?.as_str()?.to_string();
            let service_hint = raw.get("service_hint").and_then(serde_json::Value::as_str).map(str::to_string);
            let ordering_hint = raw.get("ordering_hint").and_then(serde_json::Value::as_str).map(str::to_string);
            let excluded_services: Vec<String> = raw
                .get("excluded_services")
                .and_then(serde_json::Value::as_array)
                .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                .unwrap_or_default();
            let parameters: BTreeMap<String, String> = raw
                .get("parameters")
                .and_then(serde_json::Value::as_object)
                .map(|obj| {
                    obj.iter()
                        .map(|(k, v)| (k.clone(), v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string())))
                        .collect()
                })
                .unwrap_or_default();

            actions.push(Action {
                service_hint,
                verb,
                parameters,
                ordering_hint,
                excluded_services,
            });
        }

        let assumed_defaults = value
            .get("assumed_defaults")
            .and_then(serde_json::Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        Some(RequirementRecord {
            summary,
            actions,
            confidence: 0.0,
            clarification_questions: Vec::new(),
            assumed_defaults,
        })
    }

    /// Compute the deterministic confidence score and, when it falls
    /// below what a later threshold check will require, populate
    /// generic clarification questions for the weakest-scoring actions.
    fn score(&self, mut record: RequirementRecord) -> RequirementRecord {
        if record.has_no_actions() {
            record.confidence = 0.0;
            record
                .clarification_questions
                .push("What action(s) should this workflow perform?".to_string());
            return record;
        }

        let total = record.actions.len() as f64;
        let with_service = record.actions.iter().filter(|a| a.service_hint.is_some()).count() as f64;
        let with_parameters = record.actions.iter().filter(|a| !a.parameters.is_empty()).count() as f64;

        let confidence = WEIGHT_HAS_ACTIONS
            + WEIGHT_SERVICE_RESOLVABILITY * (with_service / total)
            + WEIGHT_REQUIRED_PARAMETERS * (with_parameters / total);

        record.confidence = confidence.min(1.0);

        for action in &record.actions {
            if action.service_hint.is_none() {
                record
                    .clarification_questions
                    .push(format!("Which service should handle the `{}` action?", action.verb));
            }
        }

        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgeflow_test_utils::MockLlmClient;

    #[tokio::test]
    async fn fully_specified_request_scores_high_confidence() {
        let llm = Arc::new(MockLlmClient::new().with_json_response(serde_json::json!({
            "summary": "post to slack on new order",
            "actions": [{
                "service_hint": "slack",
                "verb": "post_message",
                "parameters": {"channel": "#orders"},
                "ordering_hint": null
            }],
            "assumed_defaults": []
        })));
        let engine = ConversationEngine::new(llm);

        let record = engine.extract("notify slack on new order").await.unwrap();
        assert!(record.confidence > 0.9);
        assert!(record.clarification_questions.is_empty());
    }

    #[tokio::test]
    async fn missing_service_hint_lowers_confidence_and_asks_for_clarification() {
        let llm = Arc::new(MockLlmClient::new().with_json_response(serde_json::json!({
            "summary": "send a message somewhere",
            "actions": [{
                "service_hint": null,
                "verb": "post_message",
                "parameters": {},
                "ordering_hint": null
            }],
            "assumed_defaults": []
        })));
        let engine = ConversationEngine::new(llm);

        let record = engine.extract("send a message").await.unwrap();
        assert!(record.confidence < 0.7);
        assert_eq!(record.clarification_questions.len(), 1);
    }

    #[tokio::test]
    async fn no_actions_extracted_is_zero_confidence() {
        let llm = Arc::new(MockLlmClient::new().with_json_response(serde_json::json!({
            "summary": "do something vague",
            "actions": [],
            "assumed_defaults": []
        })));
        let engine = ConversationEngine::new(llm);

        let record = engine.extract("do something vague").await.unwrap();
        assert_eq!(record.confidence, 0.0);
        assert!(record.has_no_actions());
    }

    #[tokio::test]
    async fn malformed_response_is_retried_once_then_fails_schema_parse() {
        let llm = Arc::new(
            MockLlmClient::new()
                .with_json_response(serde_json::json!({"unexpected": true}))
                .with_json_response(serde_json::json!({"unexpected": true})),
        );
        let engine = ConversationEngine::new(llm);

        let result = engine.extract("anything").await;
        assert!(matches!(result, Err(ConversationError::SchemaParseFailure)));
    }

    #[tokio::test]
    async fn malformed_first_response_recovers_on_retry() {
        let llm = Arc::new(
            MockLlmClient::new()
                .with_json_response(serde_json::json!({"unexpected": true}))
                .with_json_response(serde_json::json!({
                    "summary": "post to slack on new order",
                    "actions": [{
                        "service_hint": "slack",
                        "verb": "post_message",
                        "parameters": {"channel": "#orders"},
                        "ordering_hint": null
                    }],
                    "assumed_defaults": []
                })),
        );
        let engine = ConversationEngine::new(llm);

        let record = engine.extract("notify slack on new order").await.unwrap();
        assert_eq!(record.actions.len(), 1);
        assert_eq!(record.actions[0].verb, "post_message");
    }

    #[tokio::test]
    async fn resume_with_answer_folds_clarification_into_description() {
        let llm = Arc::new(MockLlmClient::new().with_json_response(serde_json::json!({
            "summary": "post to slack channel #orders",
            "actions": [{
                "service_hint": "slack",
                "verb": "post_message",
                "parameters": {"channel": "#orders"},
                "ordering_hint": null
            }],
            "assumed_defaults": []
        })));
        let engine = ConversationEngine::new(llm);

        let record = engine.resume_with_answer("send a message", "use the #orders slack channel").await.unwrap();
        assert_eq!(record.actions[0].parameters.get("channel").map(String::as_str), Some("#orders"));
    }
}
