//! The event sink: the push channel external observers subscribe to.

use crate::envelope::EventEnvelope;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors emitting an event. Per the event contract, events are advisory:
/// the runner logs and continues rather than failing a stage over this.
#[derive(Debug, Error)]
pub enum EventError {
    /// No subscriber was listening; not itself a correctness problem.
    #[error("no active subscriber for event")]
    NoSubscriber,
}

/// Push channel for pipeline progress events.
///
/// Implementations MUST preserve emission order within a single
/// correlation id; no ordering is guaranteed across correlation ids.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one event to all current observers.
    async fn emit(&self, event: EventEnvelope) -> Result<(), EventError>;
}

/// An [`EventSink`] backed by a `tokio::sync::broadcast` channel, fanning
/// events out to any number of observer tasks.
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    sender: broadcast::Sender<EventEnvelope>,
}

impl BroadcastEventSink {
    /// Create a sink with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe a new observer.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastEventSink {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl EventSink for BroadcastEventSink {
    async fn emit(&self, event: EventEnvelope) -> Result<(), EventError> {
        tracing::debug!(
            correlation_id = %event.correlation_id,
            seq = event.seq,
            event_type = %event.event_type,
            "emitting event"
        );
        self.sender
            .send(event)
            .map(|_| ())
            .map_err(|_| EventError::NoSubscriber)
    }
}

/// An [`EventSink`] that discards every event; useful for tests and
/// dry-run invocations that don't need observers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSink;

#[async_trait]
impl EventSink for NullEventSink {
    async fn emit(&self, _event: EventEnvelope) -> Result<(), EventError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgeflow_types::ids::CorrelationId;
    use forgeflow_types::pipeline_state::Stage;

    fn sample_event(seq: u64) -> EventEnvelope {
        EventEnvelope::new(
            CorrelationId::new(),
            seq,
            Stage::Conversation,
            "stage.started",
            "started",
            chrono::Utc::now(),
        )
    }

    #[tokio::test]
    async fn broadcast_sink_delivers_to_subscriber() {
        let sink = BroadcastEventSink::new(16);
        let mut rx = sink.subscribe();

        sink.emit(sample_event(1)).await.unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received.seq, 1);
    }

    #[tokio::test]
    async fn broadcast_sink_without_subscriber_reports_no_subscriber() {
        let sink = BroadcastEventSink::new(16);
        let result = sink.emit(sample_event(1)).await;
        assert!(matches!(result, Err(EventError::NoSubscriber)));
    }

    #[tokio::test]
    async fn null_sink_always_succeeds() {
        let sink = NullEventSink;
        assert!(sink.emit(sample_event(1)).await.is_ok());
    }
}
