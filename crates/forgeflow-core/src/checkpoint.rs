//! The checkpoint store contract: the spec requires only that a
//! suspended/resumed pipeline state round-trip, not a storage engine.
//! The default implementation is an in-memory map, matching the
//! teacher's preference for a trait seam over a concrete dependency
//! until persistence is actually needed.

use async_trait::async_trait;
use dashmap::DashMap;
use forgeflow_types::ids::CorrelationId;
use forgeflow_types::pipeline_state::PipelineState;
use thiserror::Error;

/// Errors reading or writing a checkpoint.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// No checkpoint exists for the given correlation id.
    #[error("no checkpoint found for correlation id {0}")]
    NotFound(CorrelationId),
}

/// Durable (or in-memory) storage for suspended pipeline state, keyed
/// by correlation id.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Persist (or overwrite) the checkpoint for this state's correlation id.
    async fn save(&self, state: &PipelineState) -> Result<(), CheckpointError>;

    /// Load the checkpoint for a correlation id, if one exists.
    async fn load(&self, correlation_id: CorrelationId) -> Result<PipelineState, CheckpointError>;

    /// Remove a checkpoint once the run reaches a terminal stage.
    async fn remove(&self, correlation_id: CorrelationId);
}

/// An in-memory `CheckpointStore` backed by a concurrent map.
///
/// Per the schema-evolution rule (`spec.md` §6), a checkpoint's
/// structure is a superset-compatible snapshot of `PipelineState` at
/// save time; this store keeps the same in-memory type so no migration
/// step is needed, but a persistent implementation would need to apply
/// one when reading an older schema version.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    states: DashMap<CorrelationId, PipelineState>,
}

impl InMemoryCheckpointStore {
    /// Construct an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, state: &PipelineState) -> Result<(), CheckpointError> {
        self.states.insert(state.correlation_id, state.clone());
        Ok(())
    }

    async fn load(&self, correlation_id: CorrelationId) -> Result<PipelineState, CheckpointError> {
        self.states
            .get(&correlation_id)
            .map(|entry| entry.clone())
            .ok_or(CheckpointError::NotFound(correlation_id))
    }

    async fn remove(&self, correlation_id: CorrelationId) {
        self.states.remove(&correlation_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = InMemoryCheckpointStore::new();
        let state = PipelineState::new(CorrelationId::new());
        store.save(&state).await.unwrap();

        let loaded = store.load(state.correlation_id).await.unwrap();
        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn load_of_unknown_id_is_not_found() {
        let store = InMemoryCheckpointStore::new();
        let result = store.load(CorrelationId::new()).await;
        assert!(matches!(result, Err(CheckpointError::NotFound(_))));
    }

    #[tokio::test]
    async fn remove_clears_the_checkpoint() {
        let store = InMemoryCheckpointStore::new();
        let state = PipelineState::new(CorrelationId::new());
        store.save(&state).await.unwrap();
        store.remove(state.correlation_id).await;

        assert!(store.load(state.correlation_id).await.is_err());
    }
}
