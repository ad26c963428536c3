//! API corpus records and discovery results.

use serde::{Deserialize, Serialize};

/// One parameter of an endpoint's request schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSchema {
    /// Parameter name.
    pub name: String,
    /// Declared type (`"string"`, `"integer"`, ...).
    pub ty: String,
    /// Whether the parameter is required.
    pub required: bool,
    /// Human-readable description.
    pub description: String,
}

/// One documented API operation, authored offline and loaded into the corpus at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEndpointDocument {
    /// Service the endpoint belongs to (e.g. `"slack"`).
    pub service: String,
    /// Endpoint path or operation name (e.g. `"chat.postMessage"`).
    pub path: String,
    /// HTTP method or protocol variant (e.g. `"POST"`).
    pub method: String,
    /// Natural-language description of what the endpoint does.
    pub description: String,
    /// Request parameter schema.
    pub parameters: Vec<ParamSchema>,
    /// Response schema, as a free-form JSON value describing its shape.
    pub response_schema: serde_json::Value,
    /// Identifier of the authentication scheme the endpoint requires
    /// (e.g. `"bearer_token"`), used to resolve which environment
    /// variable supplies the credential.
    pub auth_scheme: String,
    /// A short reference code example, shown to the code generator.
    pub example: String,
}

impl ApiEndpointDocument {
    /// Build the text embedded into the vector index for this endpoint:
    /// service, path, and description concatenated, matching the
    /// query string shape built for actions during retrieval.
    #[must_use]
    pub fn embedding_text(&self) -> String {
        format!("{} {} {}", self.service, self.path, self.description)
    }

    /// The environment variable name the DAG planner declares for this
    /// endpoint's credential, and the generated artifact reads it from:
    /// `{SERVICE}_BOT_TOKEN` for bearer tokens, `{SERVICE}_APP_PASSWORD`
    /// for app passwords, else `{SERVICE}_{SCHEME}` for anything else.
    /// Matches the convention named by `spec.md` §6's example variables
    /// (`SLACK_BOT_TOKEN`, `GMAIL_APP_PASSWORD`).
    #[must_use]
    pub fn credential_env_var(&self) -> String {
        let service = self.service.to_uppercase();
        match self.auth_scheme.as_str() {
            "bearer_token" => format!("{service}_BOT_TOKEN"),
            "app_password" => format!("{service}_APP_PASSWORD"),
            other => format!("{service}_{}", other.to_uppercase()),
        }
    }
}

/// The outcome of matching one action against the corpus: the chosen
/// endpoint, a match score, and the LLM's justification for the pick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredEndpoint {
    /// The matched endpoint document.
    pub document: ApiEndpointDocument,
    /// Match score in `[0, 1]`.
    pub match_score: f64,
    /// One-sentence justification for the match.
    pub justification: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_endpoint() -> ApiEndpointDocument {
        ApiEndpointDocument {
            service: "slack".to_string(),
            path: "chat.postMessage".to_string(),
            method: "POST".to_string(),
            description: "Post a message to a channel".to_string(),
            parameters: vec![ParamSchema {
                name: "channel".to_string(),
                ty: "string".to_string(),
                required: true,
                description: "target channel".to_string(),
            }],
            response_schema: serde_json::json!({"ok": "boolean"}),
            auth_scheme: "bearer_token".to_string(),
            example: "client.chat_postMessage(channel=..., text=...)".to_string(),
        }
    }

    #[test]
    fn embedding_text_includes_service_and_path() {
        let doc = sample_endpoint();
        let text = doc.embedding_text();
        assert!(text.contains("slack"));
        assert!(text.contains("chat.postMessage"));
    }

    #[test]
    fn discovered_endpoint_round_trips_through_json() {
        let discovered = DiscoveredEndpoint {
            document: sample_endpoint(),
            match_score: 0.92,
            justification: "exact service and verb match".to_string(),
        };

        let json = serde_json::to_string(&discovered).unwrap();
        let back: DiscoveredEndpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(discovered, back);
    }
}
