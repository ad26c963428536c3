//! The generated artifact: source text implementing a workflow DAG.

use crate::hash::ContentHash;
use crate::ids::StepId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The current source text for a workflow, mutable across self-debug iterations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    /// Full source text of the single logical module.
    pub source: String,
    /// Per-step source fragments, keyed by step id, as written during generation.
    pub step_fragments: BTreeMap<StepId, String>,
    /// The set of imports the artifact declares.
    pub imports: Vec<String>,
}

impl GeneratedArtifact {
    /// An empty artifact with no source yet.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            source: String::new(),
            step_fragments: BTreeMap::new(),
            imports: Vec::new(),
        }
    }

    /// Content hash of the current source text, used to detect no-op patches
    /// and to key debug-record diffs.
    #[must_use]
    pub fn content_hash(&self) -> ContentHash {
        ContentHash::compute(self.source.as_bytes())
    }

    /// Replace the source text, e.g. after a self-debug patch.
    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
    }

    /// Record a per-step fragment, appended to the full source.
    pub fn push_step_fragment(&mut self, step_id: StepId, fragment: impl Into<String>) {
        let fragment = fragment.into();
        self.source.push_str(&fragment);
        self.source.push('\n');
        self.step_fragments.insert(step_id, fragment);
    }
}

impl Default for GeneratedArtifact {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_step_fragment_appends_to_source() {
        let mut artifact = GeneratedArtifact::empty();
        let step = StepId::new();
        artifact.push_step_fragment(step, "async fn step_1() {}");
        assert!(artifact.source.contains("async fn step_1"));
        assert_eq!(artifact.step_fragments.len(), 1);
    }

    #[test]
    fn content_hash_changes_with_source() {
        let mut artifact = GeneratedArtifact::empty();
        let before = artifact.content_hash();
        artifact.set_source("fn main() {}");
        assert_ne!(before, artifact.content_hash());
    }
}
