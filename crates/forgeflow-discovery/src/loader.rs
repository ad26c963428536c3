//! Loads the API corpus from disk: a JSON array of
//! [`ApiEndpointDocument`], authored offline by whoever curates the
//! integrations this deployment exposes.

use crate::error::DiscoveryError;
use forgeflow_types::endpoint::ApiEndpointDocument;
use std::path::Path;

/// Parse a corpus from an in-memory JSON string.
pub fn load_from_str(json: &str, path_for_errors: &str) -> Result<Vec<ApiEndpointDocument>, DiscoveryError> {
    serde_json::from_str(json).map_err(|source| DiscoveryError::CorpusParse {
        path: path_for_errors.to_string(),
        source,
    })
}

/// Load a corpus file from disk.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Vec<ApiEndpointDocument>, DiscoveryError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| DiscoveryError::CorpusIo {
        path: path.display().to_string(),
        source,
    })?;
    load_from_str(&contents, &path.display().to_string())
}

/// A minimal built-in corpus used when no corpus file is configured,
/// covering the services named throughout the end-to-end scenarios
/// (Slack, Gmail, a generic webhook). Production deployments are
/// expected to supply a richer corpus via [`load_from_path`].
#[must_use]
pub fn default_corpus() -> Vec<ApiEndpointDocument> {
    use forgeflow_types::endpoint::ParamSchema;

    vec![
        ApiEndpointDocument {
            service: "slack".to_string(),
            path: "chat.postMessage".to_string(),
            method: "POST".to_string(),
            description: "Post a message to a Slack channel".to_string(),
            parameters: vec![
                ParamSchema {
                    name: "channel".to_string(),
                    ty: "string".to_string(),
                    required: true,
                    description: "target channel".to_string(),
                },
                ParamSchema {
                    name: "text".to_string(),
                    ty: "string".to_string(),
                    required: true,
                    description: "message text".to_string(),
                },
            ],
            response_schema: serde_json::json!({"ok": "boolean", "ts": "string"}),
            auth_scheme: "bearer_token".to_string(),
            example: "slack.chat_postMessage(channel=channel, text=text)".to_string(),
        },
        ApiEndpointDocument {
            service: "gmail".to_string(),
            path: "messages.send".to_string(),
            method: "POST".to_string(),
            description: "Send an email message via Gmail".to_string(),
            parameters: vec![
                ParamSchema {
                    name: "to".to_string(),
                    ty: "string".to_string(),
                    required: true,
                    description: "recipient address".to_string(),
                },
                ParamSchema {
                    name: "body".to_string(),
                    ty: "string".to_string(),
                    required: true,
                    description: "message body".to_string(),
                },
            ],
            response_schema: serde_json::json!({"id": "string"}),
            auth_scheme: "app_password".to_string(),
            example: "gmail.messages_send(to=to, body=body)".to_string(),
        },
        ApiEndpointDocument {
            service: "webhook".to_string(),
            path: "generic.post".to_string(),
            method: "POST".to_string(),
            description: "Post an arbitrary JSON payload to a webhook URL".to_string(),
            parameters: vec![ParamSchema {
                name: "url".to_string(),
                ty: "string".to_string(),
                required: true,
                description: "destination URL".to_string(),
            }],
            response_schema: serde_json::json!({"status": "integer"}),
            auth_scheme: "bearer_token".to_string(),
            example: "webhook.generic_post(url=url, payload=payload)".to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_corpus_is_non_empty_and_covers_slack_and_gmail() {
        let corpus = default_corpus();
        assert!(corpus.iter().any(|d| d.service == "slack"));
        assert!(corpus.iter().any(|d| d.service == "gmail"));
    }

    #[test]
    fn load_from_str_round_trips_default_corpus() {
        let json = serde_json::to_string(&default_corpus()).unwrap();
        let loaded = load_from_str(&json, "<memory>").unwrap();
        assert_eq!(loaded.len(), default_corpus().len());
    }

    #[test]
    fn load_from_str_surfaces_parse_errors() {
        let result = load_from_str("not json", "<memory>");
        assert!(matches!(result, Err(DiscoveryError::CorpusParse { .. })));
    }

    #[test]
    fn load_from_path_surfaces_io_errors_for_missing_file() {
        let result = load_from_path("/nonexistent/corpus.json");
        assert!(matches!(result, Err(DiscoveryError::CorpusIo { .. })));
    }
}
