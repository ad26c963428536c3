//! Semantic retrieval + LLM-ranked selection over the API corpus.

use crate::corpus::{Corpus, CredentialGate};
use crate::error::DiscoveryError;
use crate::index::VectorIndex;
use forgeflow_llm::client::LlmClient;
use forgeflow_llm::embedding::EmbeddingClient;
use forgeflow_types::endpoint::DiscoveredEndpoint;
use forgeflow_types::requirement::Action;
use std::sync::Arc;

/// Default top-K candidates retrieved per action before LLM ranking.
pub const DEFAULT_TOP_K: usize = 5;

/// Default floor below which a top-1 match is treated as a miss.
pub const DEFAULT_SIMILARITY_FLOOR: f64 = 0.5;

/// The result of discovering endpoints for one requirement record.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    /// Endpoints successfully matched, one per resolvable action.
    pub matched: Vec<DiscoveredEndpoint>,
    /// Verbs of actions that fell below the similarity floor and were dropped.
    pub skipped_miss: Vec<String>,
    /// Verbs of actions skipped because their service's credential was unavailable.
    pub skipped_credential: Vec<String>,
    /// Whether any action missed while at least one other matched
    /// (`discovery.partial`, as opposed to a uniform hit or total miss).
    pub partial: bool,
}

/// Drives retrieval + LLM selection for every action in a requirement record.
pub struct Discoverer {
    corpus: Arc<Corpus>,
    index: Arc<VectorIndex>,
    llm: Arc<dyn LlmClient>,
    embedder: Arc<dyn EmbeddingClient>,
    gate: CredentialGate,
    top_k: usize,
    similarity_floor: f64,
}

impl Discoverer {
    /// Construct a discoverer over a pre-built corpus and index.
    #[must_use]
    pub fn new(
        corpus: Arc<Corpus>,
        index: Arc<VectorIndex>,
        llm: Arc<dyn LlmClient>,
        embedder: Arc<dyn EmbeddingClient>,
        gate: CredentialGate,
    ) -> Self {
        Self {
            corpus,
            index,
            llm,
            embedder,
            gate,
            top_k: DEFAULT_TOP_K,
            similarity_floor: DEFAULT_SIMILARITY_FLOOR,
        }
    }

    /// Override the configurable similarity floor (an implementers'
    /// open question in the source heuristic; exposed here as configuration).
    #[must_use]
    pub fn with_similarity_floor(mut self, floor: f64) -> Self {
        self.similarity_floor = floor;
        self
    }

    /// Discover endpoints for every action, aggregating into one report.
    pub async fn discover_all(&self, actions: &[Action]) -> Result<DiscoveryReport, DiscoveryError> {
        let mut report = DiscoveryReport::default();

        for action in actions {
            let candidate_indices = self.corpus.candidate_indices(&action.excluded_services, &self.gate);

            if candidate_indices.is_empty() {
                report.skipped_credential.push(action.verb.clone());
                continue;
            }

            let query_text = Self::query_text(action);
            let query_embedding = self
                .embedder
                .embed_one(&query_text)
                .await
                .map_err(|e| DiscoveryError::Embedding(e.to_string()))?;

            let top_candidates = self.index.top_k_among(&query_embedding, &candidate_indices, self.top_k);

            if top_candidates.is_empty() {
                report.skipped_miss.push(action.verb.clone());
                continue;
            }

            let discovered = if top_candidates.len() == 1 {
                // Exactly one candidate above the floor-eligible set: select
                // without LLM rerank, per the boundary behavior.
                let only = &top_candidates[0];
                let document = self.corpus.documents()[only.document_index].clone();
                DiscoveredEndpoint {
                    document,
                    match_score: f64::from(only.similarity).clamp(0.0, 1.0),
                    justification: "sole candidate above retrieval threshold".to_string(),
                }
            } else {
                self.rank_with_llm(action, &top_candidates).await?
            };

            if discovered.match_score < self.similarity_floor {
                report.skipped_miss.push(action.verb.clone());
                continue;
            }

            report.matched.push(discovered);
        }

        report.partial = !report.matched.is_empty()
            && (!report.skipped_miss.is_empty() || !report.skipped_credential.is_empty());

        Ok(report)
    }

    fn query_text(action: &Action) -> String {
        let params = action
            .parameters
            .keys()
            .cloned()
            .collect::<Vec<_>>()
            .join(" ");
        match &action.service_hint {
            Some(service) => format!("{} {} {}", action.verb, params, service),
            None => format!("{} {}", action.verb, params),
        }
    }

    async fn rank_with_llm(
        &self,
        action: &Action,
        candidates: &[crate::index::ScoredCandidate],
    ) -> Result<DiscoveredEndpoint, DiscoveryError> {
        let candidate_docs: Vec<_> = candidates
            .iter()
            .map(|c| &self.corpus.documents()[c.document_index])
            .collect();

        let prompt = format!(
            "Action: {} (service hint: {:?})\nCandidates:\n{}",
            action.verb,
            action.service_hint,
            candidate_docs
                .iter()
                .enumerate()
                .map(|(i, d)| format!("{i}: {} {} - {}", d.service, d.path, d.description))
                .collect::<Vec<_>>()
                .join("\n")
        );

        let response = self
            .llm
            .complete_json(&prompt, r#"{"selected_index": int, "match_score": float, "justification": string}"#)
            .await
            .map_err(|e| DiscoveryError::Llm(e.to_string()))?;

        let selected_index = response
            .get("selected_index")
            .and_then(serde_json::Value::as_u64)
            .ok_or(DiscoveryError::SelectionOutOfRange)? as usize;

        let document = candidate_docs
            .get(selected_index)
            .ok_or(DiscoveryError::SelectionOutOfRange)?;

        let match_score = response
            .get("match_score")
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(f64::from(candidates[selected_index.min(candidates.len() - 1)].similarity));

        let justification = response
            .get("justification")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("llm-ranked match")
            .to_string();

        Ok(DiscoveredEndpoint {
            document: (*document).clone(),
            match_score,
            justification,
        })
    }
}
