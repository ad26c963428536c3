//! The deploy handoff seam: packaging a finished artifact is out of
//! scope (`spec.md` §1), but the runner still needs a concrete trait to
//! call at the end of a successful run.

use async_trait::async_trait;
use forgeflow_types::artifact::GeneratedArtifact;
use forgeflow_types::dag::WorkflowDag;
use forgeflow_types::execution::ExecutionResult;
use thiserror::Error;

/// Errors handing a finished artifact off to the external packager.
#[derive(Debug, Error)]
pub enum DeployError {
    /// The packager rejected the handoff.
    #[error("packager rejected handoff: {0}")]
    Rejected(String),
}

/// Packages (or otherwise dispatches) a successfully executed artifact.
/// Implemented externally in production; the core only defines the seam.
#[async_trait]
pub trait Packager: Send + Sync {
    /// Hand off the finished artifact, its DAG, declared environment
    /// variables, and the sandbox run report that validated it.
    async fn hand_off(
        &self,
        artifact: &GeneratedArtifact,
        dag: &WorkflowDag,
        env_vars: &[String],
        run_report: &ExecutionResult,
    ) -> Result<(), DeployError>;
}

/// A `Packager` that accepts every handoff without doing anything,
/// satisfying the contract for tests and dry runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPackager;

#[async_trait]
impl Packager for NullPackager {
    async fn hand_off(
        &self,
        _artifact: &GeneratedArtifact,
        _dag: &WorkflowDag,
        _env_vars: &[String],
        _run_report: &ExecutionResult,
    ) -> Result<(), DeployError> {
        Ok(())
    }
}
