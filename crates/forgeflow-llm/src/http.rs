//! A real HTTP-backed LLM and embedding client, speaking an
//! OpenAI-compatible chat/embeddings REST surface.

use crate::client::{AgentTurn, LlmClient, ToolMessage};
use crate::embedding::EmbeddingClient;
use crate::error::LlmError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for [`HttpLlmClient`].
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL of the provider's API, e.g. `https://api.example.com/v1`.
    pub base_url: String,
    /// Bearer credential, read from `LLM_API_KEY`.
    pub api_key: String,
    /// Model identifier, read from `LLM_MODEL`.
    pub model: String,
    /// Per-call timeout.
    pub timeout: Duration,
}

/// LLM client backed by a real HTTP provider.
#[derive(Debug, Clone)]
pub struct HttpLlmClient {
    http: reqwest::Client,
    config: HttpClientConfig,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

impl HttpLlmClient {
    /// Build a client from explicit configuration.
    #[must_use]
    pub fn new(config: HttpClientConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self { http, config }
    }

    async fn chat(&self, messages: Vec<ChatMessage>, json_mode: bool) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages,
            response_format: json_mode.then(|| ResponseFormat {
                kind: "json_object".to_string(),
            }),
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::ProviderStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Transport("empty choices array".to_string()))
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete_text(&self, prompt: &str) -> Result<String, LlmError> {
        self.chat(
            vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            false,
        )
        .await
    }

    async fn complete_json(
        &self,
        prompt: &str,
        schema_hint: &str,
    ) -> Result<serde_json::Value, LlmError> {
        let full_prompt = format!("{prompt}\n\nRespond with JSON matching this shape:\n{schema_hint}");
        let text = self
            .chat(
                vec![ChatMessage {
                    role: "user".to_string(),
                    content: full_prompt.clone(),
                }],
                true,
            )
            .await?;

        match serde_json::from_str(&text) {
            Ok(value) => Ok(value),
            Err(first_err) => {
                let retry_prompt = format!(
                    "{full_prompt}\n\nYour previous response was not valid JSON ({first_err}). \
                     Respond with ONLY the JSON object, no prose."
                );
                let retry_text = self
                    .chat(
                        vec![ChatMessage {
                            role: "user".to_string(),
                            content: retry_prompt,
                        }],
                        true,
                    )
                    .await?;
                serde_json::from_str(&retry_text)
                    .map_err(|e| LlmError::SchemaParseFailure(e.to_string()))
            }
        }
    }

    async fn next_turn(&self, transcript: &[ToolMessage]) -> Result<AgentTurn, LlmError> {
        let messages = transcript
            .iter()
            .map(|m| ChatMessage {
                role: m.role.clone(),
                content: m.content.clone(),
            })
            .collect();

        let text = self.chat(messages, true).await?;
        Ok(parse_agent_turn(&text))
    }
}

/// Parse a raw tool-calling response into an [`AgentTurn`].
///
/// Expected shapes: `{"tool": "...", "input": {...}}` or
/// `{"finish": true, "artifact": "..."}`. Anything else is `Malformed`.
fn parse_agent_turn(text: &str) -> AgentTurn {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(text) else {
        return AgentTurn::Malformed { raw: text.to_string() };
    };

    if let Some(artifact) = value.get("artifact").and_then(|v| v.as_str()) {
        if value.get("finish").and_then(|v| v.as_bool()).unwrap_or(false) {
            return AgentTurn::Finish {
                artifact: artifact.to_string(),
            };
        }
    }

    if let Some(tool) = value.get("tool").and_then(|v| v.as_str()) {
        let input = value.get("input").cloned().unwrap_or(serde_json::Value::Null);
        return AgentTurn::ToolCall {
            tool: tool.to_string(),
            input,
        };
    }

    AgentTurn::Malformed { raw: text.to_string() }
}

/// Embedding client backed by the same provider's embeddings endpoint.
#[derive(Debug, Clone)]
pub struct HttpEmbeddingClient {
    http: reqwest::Client,
    config: HttpClientConfig,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

impl HttpEmbeddingClient {
    /// Build a client from explicit configuration.
    #[must_use]
    pub fn new(config: HttpClientConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self { http, config }
    }
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let request = EmbeddingRequest {
            model: &self.config.model,
            input: texts,
        };

        let response = self
            .http
            .post(format!("{}/embeddings", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::ProviderStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_finish_turn() {
        let turn = parse_agent_turn(r#"{"finish": true, "artifact": "fn main() {}"}"#);
        assert!(matches!(turn, AgentTurn::Finish { artifact } if artifact == "fn main() {}"));
    }

    #[test]
    fn parses_tool_call_turn() {
        let turn = parse_agent_turn(r#"{"tool": "write_file", "input": {"path": "a.rs"}}"#);
        assert!(matches!(turn, AgentTurn::ToolCall { tool, .. } if tool == "write_file"));
    }

    #[test]
    fn malformed_text_is_reported_as_such() {
        let turn = parse_agent_turn("not json at all");
        assert!(matches!(turn, AgentTurn::Malformed { .. }));
    }
}
