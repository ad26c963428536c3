//! Results captured from a sandbox execution.

use crate::ids::StepId;
use serde::{Deserialize, Serialize};

/// A status transition emitted for one step during a sandbox run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepStatus {
    /// The step this transition concerns.
    pub step_id: StepId,
    /// Outcome of this step (`"ok"`, `"failed"`, `"skipped"`, ...).
    pub status: String,
    /// Optional detail, e.g. the captured error for a failed step.
    pub message: Option<String>,
}

/// The outcome of one sandbox execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Process exit status; `0` means success.
    pub exit_status: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Wall-clock duration of the execution, in milliseconds.
    pub elapsed_ms: u64,
    /// Per-step status transitions observed during the run.
    pub step_statuses: Vec<StepStatus>,
}

impl ExecutionResult {
    /// Whether the execution succeeded (exit status zero).
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.exit_status == 0
    }

    /// Best-effort extraction of the last exception/traceback block from stderr,
    /// used to seed the self-debugger's classification prompt.
    #[must_use]
    pub fn last_traceback_frame(&self) -> Option<&str> {
        self.stderr.lines().last().filter(|l| !l.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn succeeded_checks_exit_status() {
        let ok = ExecutionResult {
            exit_status: 0,
            stdout: String::new(),
            stderr: String::new(),
            elapsed_ms: 10,
            step_statuses: vec![],
        };
        assert!(ok.succeeded());

        let failed = ExecutionResult {
            exit_status: 1,
            ..ok
        };
        assert!(!failed.succeeded());
    }

    #[test]
    fn last_traceback_frame_returns_final_nonempty_line() {
        let result = ExecutionResult {
            exit_status: 1,
            stdout: String::new(),
            stderr: "Traceback (most recent call last):\nModuleNotFoundError: requests\n".to_string(),
            elapsed_ms: 0,
            step_statuses: vec![],
        };
        assert_eq!(result.last_traceback_frame(), Some("ModuleNotFoundError: requests"));
    }
}
