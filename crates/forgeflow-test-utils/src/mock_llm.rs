//! A scripted [`LlmClient`] for deterministic pipeline tests.

use async_trait::async_trait;
use forgeflow_llm::client::{AgentTurn, LlmClient, ToolMessage};
use forgeflow_llm::error::LlmError;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// An `LlmClient` whose responses are pre-scripted by the test, returned
/// in FIFO order as each method is called. Running out of scripted
/// responses is treated as a test bug and surfaces as a transport error
/// rather than panicking, so assertions on the resulting pipeline state
/// stay informative.
#[derive(Debug, Default)]
pub struct MockLlmClient {
    text_responses: Mutex<VecDeque<String>>,
    json_responses: Mutex<VecDeque<serde_json::Value>>,
    turns: Mutex<VecDeque<AgentTurn>>,
}

impl MockLlmClient {
    /// An empty mock with no scripted responses yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a free-text response.
    #[must_use]
    pub fn with_text_response(self, response: impl Into<String>) -> Self {
        self.text_responses.lock().push_back(response.into());
        self
    }

    /// Queue a JSON response.
    #[must_use]
    pub fn with_json_response(self, response: serde_json::Value) -> Self {
        self.json_responses.lock().push_back(response);
        self
    }

    /// Queue a tool-calling turn.
    #[must_use]
    pub fn with_turn(self, turn: AgentTurn) -> Self {
        self.turns.lock().push_back(turn);
        self
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete_text(&self, _prompt: &str) -> Result<String, LlmError> {
        self.text_responses
            .lock()
            .pop_front()
            .ok_or_else(|| LlmError::Transport("mock exhausted: no text response scripted".to_string()))
    }

    async fn complete_json(
        &self,
        _prompt: &str,
        _schema_hint: &str,
    ) -> Result<serde_json::Value, LlmError> {
        self.json_responses
            .lock()
            .pop_front()
            .ok_or_else(|| LlmError::Transport("mock exhausted: no json response scripted".to_string()))
    }

    async fn next_turn(&self, _transcript: &[ToolMessage]) -> Result<AgentTurn, LlmError> {
        self.turns
            .lock()
            .pop_front()
            .ok_or_else(|| LlmError::Transport("mock exhausted: no turn scripted".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_scripted_responses_in_order() {
        let mock = MockLlmClient::new()
            .with_json_response(serde_json::json!({"a": 1}))
            .with_json_response(serde_json::json!({"a": 2}));

        let first = mock.complete_json("p", "s").await.unwrap();
        let second = mock.complete_json("p", "s").await.unwrap();

        assert_eq!(first, serde_json::json!({"a": 1}));
        assert_eq!(second, serde_json::json!({"a": 2}));
    }

    #[tokio::test]
    async fn exhausted_queue_is_a_transport_error_not_a_panic() {
        let mock = MockLlmClient::new();
        let result = mock.complete_text("p").await;
        assert!(matches!(result, Err(LlmError::Transport(_))));
    }
}
