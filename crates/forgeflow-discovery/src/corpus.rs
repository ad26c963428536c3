//! The API corpus: endpoint documents plus the credential-availability gate.

use forgeflow_types::endpoint::ApiEndpointDocument;
use std::collections::HashMap;

/// Tracks which services have their required credential present in the
/// environment. Missing credentials filter a service out of discovery
/// candidates entirely (a non-fatal `discovery.skipped` event), per the
/// per-service configuration contract.
#[derive(Debug, Clone, Default)]
pub struct CredentialGate {
    available: HashMap<String, bool>,
}

impl CredentialGate {
    /// Build a gate from a service-name → has-credential map.
    #[must_use]
    pub fn new(available: HashMap<String, bool>) -> Self {
        Self { available }
    }

    /// A gate that treats every service as having its credential present,
    /// useful for tests that don't exercise the skip path.
    #[must_use]
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Whether `service` has its credential available. Services not
    /// present in the map default to available, since the corpus may
    /// document services this deployment never restricts.
    #[must_use]
    pub fn is_available(&self, service: &str) -> bool {
        *self.available.get(service).unwrap_or(&true)
    }
}

/// The loaded set of documented endpoints, embedded once at startup.
#[derive(Debug, Clone)]
pub struct Corpus {
    documents: Vec<ApiEndpointDocument>,
}

impl Corpus {
    /// Load a static corpus. The corpus is append-only within a run;
    /// deletion is not supported.
    #[must_use]
    pub fn new(documents: Vec<ApiEndpointDocument>) -> Self {
        Self { documents }
    }

    /// All documents, in load order (the order embedded into the index).
    #[must_use]
    pub fn documents(&self) -> &[ApiEndpointDocument] {
        &self.documents
    }

    /// Indices of documents available as candidates for `service_hint`,
    /// after applying the credential gate and any explicit per-action
    /// exclusions. The hint biases nothing here — service filtering by
    /// hint alone is the caller's job, not the corpus's; this only
    /// removes services whose credentials are missing or explicitly
    /// excluded.
    #[must_use]
    pub fn candidate_indices(&self, excluded_services: &[String], gate: &CredentialGate) -> Vec<usize> {
        self.documents
            .iter()
            .enumerate()
            .filter(|(_, doc)| !excluded_services.contains(&doc.service) && gate.is_available(&doc.service))
            .map(|(idx, _)| idx)
            .collect()
    }
}
