//! Errors raised by the sandbox executor and self-debugger.

use thiserror::Error;

/// Errors executing an artifact in the sandbox.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// Neither sandbox backend could be constructed/reached.
    #[error("sandbox backend unavailable: {0}")]
    BackendUnavailable(String),
    /// The execution exceeded its wall-clock timeout and was terminated.
    #[error("sandbox execution timed out after {0:?}")]
    Timeout(std::time::Duration),
    /// The backend failed to spawn the execution at all.
    #[error("failed to spawn sandbox execution: {0}")]
    Spawn(String),
}

/// Errors running the self-debug diagnose/patch cycle.
#[derive(Debug, Error)]
pub enum DebugError {
    /// The classification LLM call failed.
    #[error("self-debug classification failed: {0}")]
    Classification(String),
    /// The patch LLM call failed.
    #[error("self-debug patch generation failed: {0}")]
    Patch(String),
    /// The patch dropped or renamed a step's public function, violating
    /// the "preserve every step's public signature" contract.
    #[error("patched artifact is missing expected step function `{0}`")]
    MissingStepFunction(String),
    /// The patch dropped one of the DAG's declared environment variables.
    #[error("patched artifact no longer references required env var `{0}`")]
    MissingEnvironmentVar(String),
    /// The self-debug attempt budget was exhausted.
    #[error("self-debug attempt budget ({max_attempts}) exhausted")]
    BudgetExhausted {
        /// The configured maximum number of attempts.
        max_attempts: u32,
    },
}
