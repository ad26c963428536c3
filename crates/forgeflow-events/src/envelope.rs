//! The event envelope pushed on the event channel.

use forgeflow_types::pipeline_state::Stage;
use forgeflow_types::ids::CorrelationId;
use serde::{Deserialize, Serialize};

/// `{correlation_id, seq, stage, event_type, ts, phase, data?, message?}`
/// per the external event contract. Clients MUST ignore unknown
/// `event_type` values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// The run this event belongs to.
    pub correlation_id: CorrelationId,
    /// Monotonic sequence number, unique and strictly increasing per correlation id.
    pub seq: u64,
    /// The stage that emitted this event.
    pub stage: Stage,
    /// Dotted event type, e.g. `"stage.started"`, `"discovery.miss"`, `"tool.calling"`.
    pub event_type: String,
    /// Emission timestamp (RFC 3339).
    pub ts: chrono::DateTime<chrono::Utc>,
    /// `"started" | "completed" | "failed"` or another stage-specific phase tag.
    pub phase: String,
    /// Stage-specific structured payload.
    pub data: Option<serde_json::Value>,
    /// Optional human-readable message.
    pub message: Option<String>,
}

impl EventEnvelope {
    /// Construct an envelope; `ts` is taken as a parameter since the
    /// current time cannot be read from inside a deterministic workflow.
    #[must_use]
    pub fn new(
        correlation_id: CorrelationId,
        seq: u64,
        stage: Stage,
        event_type: impl Into<String>,
        phase: impl Into<String>,
        ts: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Self {
            correlation_id,
            seq,
            stage,
            event_type: event_type.into(),
            ts,
            phase: phase.into(),
            data: None,
            message: None,
        }
    }

    /// Attach a structured payload.
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Attach a human-readable message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_optional_fields() {
        let event = EventEnvelope::new(
            CorrelationId::new(),
            1,
            Stage::ApiDiscovery,
            "discovery.miss",
            "failed",
            chrono::Utc::now(),
        )
        .with_message("no candidate above floor");

        assert_eq!(event.event_type, "discovery.miss");
        assert_eq!(event.message.as_deref(), Some("no candidate above floor"));
    }

    #[test]
    fn round_trips_through_json() {
        let event = EventEnvelope::new(
            CorrelationId::new(),
            1,
            Stage::Conversation,
            "stage.started",
            "started",
            chrono::Utc::now(),
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: EventEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }
}
