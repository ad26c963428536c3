//! The requirement record produced by the conversation stage.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One extracted action: a service hint, a verb, and its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Best-guess service this action targets (e.g. `"slack"`), if stated.
    pub service_hint: Option<String>,
    /// The verb describing what the action does (e.g. `"send_message"`).
    pub verb: String,
    /// Extracted parameters, keyed by parameter name.
    pub parameters: BTreeMap<String, String>,
    /// Free text describing ordering relative to other actions
    /// (e.g. `"after create_slack_account"`), used by the planner's
    /// control-dependency inference.
    pub ordering_hint: Option<String>,
    /// Services explicitly excluded from consideration for this action
    /// (e.g. the user said "not through email"), as opposed to
    /// `service_hint`, which is a bias rather than a constraint. Used
    /// by discovery to filter corpus candidates per `spec.md` §4.3.
    #[serde(default)]
    pub excluded_services: Vec<String>,
}

impl Action {
    /// Create an action with no parameters or ordering hint yet.
    #[must_use]
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            service_hint: None,
            verb: verb.into(),
            parameters: BTreeMap::new(),
            ordering_hint: None,
            excluded_services: Vec::new(),
        }
    }

    /// Attach a service hint.
    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service_hint = Some(service.into());
        self
    }

    /// Attach an explicitly excluded service.
    #[must_use]
    pub fn with_excluded_service(mut self, service: impl Into<String>) -> Self {
        self.excluded_services.push(service.into());
        self
    }

    /// Attach a parameter.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Attach an ordering hint.
    #[must_use]
    pub fn with_ordering_hint(mut self, hint: impl Into<String>) -> Self {
        self.ordering_hint = Some(hint.into());
        self
    }
}

/// A normalized description of user intent, extracted by the conversation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementRecord {
    /// Short natural-language summary of the request.
    pub summary: String,
    /// The actions the workflow must perform, in the order the user described them.
    pub actions: Vec<Action>,
    /// Confidence in `[0, 1]` that the extraction is complete enough to proceed.
    pub confidence: f64,
    /// Outstanding clarification questions, if confidence was insufficient.
    pub clarification_questions: Vec<String>,
    /// Sensible defaults the engine assumed for low-impact gaps, surfaced to the user.
    pub assumed_defaults: Vec<String>,
}

impl RequirementRecord {
    /// Create an empty requirement record with zero confidence.
    #[must_use]
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            actions: Vec::new(),
            confidence: 0.0,
            clarification_questions: Vec::new(),
            assumed_defaults: Vec::new(),
        }
    }

    /// Add an action.
    #[must_use]
    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Set the confidence score.
    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Whether the record carries zero actions (the `MISSING_PARAM` boundary case).
    #[must_use]
    pub fn has_no_actions(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_builder_sets_fields() {
        let action = Action::new("post_message")
            .with_service("slack")
            .with_parameter("channel", "#general")
            .with_excluded_service("discord");

        assert_eq!(action.verb, "post_message");
        assert_eq!(action.service_hint.as_deref(), Some("slack"));
        assert_eq!(action.parameters.get("channel").map(String::as_str), Some("#general"));
        assert_eq!(action.excluded_services, vec!["discord".to_string()]);
    }

    #[test]
    fn excluded_services_defaults_to_empty_when_absent_from_json() {
        let action: Action = serde_json::from_str(
            r#"{"service_hint": null, "verb": "post_message", "parameters": {}, "ordering_hint": null}"#,
        )
        .unwrap();
        assert!(action.excluded_services.is_empty());
    }

    #[test]
    fn requirement_record_detects_no_actions() {
        let record = RequirementRecord::new("automate onboarding");
        assert!(record.has_no_actions());
    }

    #[test]
    fn requirement_record_round_trips_through_json() {
        let record = RequirementRecord::new("send a slack message")
            .with_action(Action::new("post_message").with_service("slack"))
            .with_confidence(0.9);

        let json = serde_json::to_string(&record).unwrap();
        let back: RequirementRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }
}
