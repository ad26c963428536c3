//! Shared sample data for pipeline tests.

use forgeflow_types::endpoint::{ApiEndpointDocument, ParamSchema};
use forgeflow_types::requirement::{Action, RequirementRecord};

/// A small corpus covering Slack, Gmail, and a generic HTTP webhook,
/// matching the services named in the end-to-end scenarios.
#[must_use]
pub fn sample_corpus() -> Vec<ApiEndpointDocument> {
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
            service: "slack".to_string(),
            path: "users.admin.invite".to_string(),
            method: "POST".to_string(),
            description: "Invite a user to the Slack workspace".to_string(),
            parameters: vec![ParamSchema {
                name: "email".to_string(),
                ty: "string".to_string(),
                required: true,
                description: "invitee email".to_string(),
            }],
            response_schema: serde_json::json!({"ok": "boolean"}),
            auth_scheme: "bearer_token".to_string(),
            example: "slack.users_admin_invite(email=email)".to_string(),
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
    ]
}

/// `"Send a message 'Hello' to Slack channel #general."`
#[must_use]
pub fn happy_slack_post_requirement() -> RequirementRecord {
    RequirementRecord::new("send a hello message to the #general slack channel")
        .with_action(
            Action::new("post_message")
                .with_service("slack")
                .with_parameter("channel", "#general")
                .with_parameter("text", "Hello"),
        )
        .with_confidence(0.9)
}

/// `"On new hire, send welcome email and create a Slack account."`
#[must_use]
pub fn parallel_onboarding_requirement() -> RequirementRecord {
    RequirementRecord::new("on new hire, send welcome email and create a slack account")
        .with_action(Action::new("send_email").with_service("gmail"))
        .with_action(Action::new("create_slack_account").with_service("slack"))
        .with_confidence(0.85)
}
