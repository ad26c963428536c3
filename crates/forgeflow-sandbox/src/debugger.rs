//! The self-debugger: classify a sandbox failure, then patch the
//! artifact, bounded by a configured attempt ceiling.

use crate::error::DebugError;
use forgeflow_types::debug::{DebugRecord, ErrorCategory};
use forgeflow_types::execution::ExecutionResult;
use forgeflow_llm::client::LlmClient;
use std::sync::Arc;

/// Runs the classify-then-patch cycle against one failing artifact.
pub struct SelfDebugger {
    llm: Arc<dyn LlmClient>,
    max_attempts: u32,
}

impl SelfDebugger {
    /// Construct a debugger bounded to `max_attempts` patch cycles.
    #[must_use]
    pub fn new(llm: Arc<dyn LlmClient>, max_attempts: u32) -> Self {
        Self { llm, max_attempts }
    }

    /// Classify a failed execution's root cause.
    pub async fn classify(&self, result: &ExecutionResult) -> Result<(ErrorCategory, String), DebugError> {
        let tail = result.last_traceback_frame().unwrap_or("(no stderr captured)");
        let prompt = format!(
            "A generated workflow artifact failed during sandbox execution.\n\
             exit status: {}\n\
             stderr (last line): {tail}\n\
             full stderr:\n{}\n\n\
             Classify the root cause into exactly one of: IMPORT_ERROR, AUTH_FAILURE, \
             SCHEMA_MISMATCH, RATE_LIMIT, MISSING_PARAM, LOGIC_ERROR, NETWORK_ERROR, \
             TIMEOUT, SECURITY_VIOLATION, UNKNOWN. Respond as JSON with fields \
             `category` and `root_cause` (one sentence).",
            result.exit_status, result.stderr,
        );

        let value = self
            .llm
            .complete_json(&prompt, r#"{"category": "string", "root_cause": "string"}"#)
            .await
            .map_err(|e| DebugError::Classification(e.to_string()))?;

        let category = value
            .get("category")
            .and_then(|v| v.as_str())
            .map(ErrorCategory::from_llm_str)
            .unwrap_or(ErrorCategory::Unknown);
        let root_cause = value
            .get("root_cause")
            .and_then(|v| v.as_str())
            .unwrap_or("unclassified failure")
            .to_string();

        Ok((category, root_cause))
    }

    /// Produce a patched artifact, validated to preserve every step
    /// function name and every declared environment variable reference
    /// the original artifact contained. Returns the debug record paired
    /// with the patched source text the runner should re-enter security
    /// review with.
    pub async fn patch(
        &self,
        attempt: u32,
        artifact_source: &str,
        category: ErrorCategory,
        root_cause: &str,
        required_step_fns: &[String],
        required_env_vars: &[String],
    ) -> Result<(DebugRecord, String), DebugError> {
        if attempt > self.max_attempts {
            return Err(DebugError::BudgetExhausted {
                max_attempts: self.max_attempts,
            });
        }

        let prompt = format!(
            "The following generated workflow artifact failed with root cause: {root_cause}\n\
             (category: {category:?})\n\n\
             Artifact source:\n{artifact_source}\n\n\
             Return the complete corrected artifact source as JSON: \
             {{\"artifact\": \"...\", \"fix_description\": \"one sentence\"}}. \
             Preserve every existing step function's name and signature, and keep \
             reading the same environment variables by name; only change what is \
             necessary to fix the root cause."
        );

        let value = self
            .llm
            .complete_json(&prompt, r#"{"artifact": "string", "fix_description": "string"}"#)
            .await
            .map_err(|e| DebugError::Patch(e.to_string()))?;

        let patched = value
            .get("artifact")
            .and_then(|v| v.as_str())
            .ok_or_else(|| DebugError::Patch("response missing `artifact` field".to_string()))?
            .to_string();
        let fix_description = value
            .get("fix_description")
            .and_then(|v| v.as_str())
            .unwrap_or("applied fix")
            .to_string();

        for name in required_step_fns {
            if !patched.contains(&format!("fn {name}")) {
                return Err(DebugError::MissingStepFunction(name.clone()));
            }
        }
        for var in required_env_vars {
            if !patched.contains(var) {
                return Err(DebugError::MissingEnvironmentVar(var.clone()));
            }
        }

        let diff = line_diff(artifact_source, &patched);

        Ok((
            DebugRecord {
                attempt,
                category,
                root_cause: root_cause.to_string(),
                fix_description,
                diff,
            },
            patched,
        ))
    }
}

/// A minimal line-oriented diff, sufficient for audit trails: no
/// alignment/LCS, just a before/after line listing of what changed.
fn line_diff(before: &str, after: &str) -> String {
    let before_lines: Vec<&str> = before.lines().collect();
    let after_lines: Vec<&str> = after.lines().collect();
    let mut out = String::new();

    let max_len = before_lines.len().max(after_lines.len());
    for i in 0..max_len {
        let b = before_lines.get(i).copied();
        let a = after_lines.get(i).copied();
        match (b, a) {
            (Some(b), Some(a)) if b == a => {}
            (Some(b), Some(a)) => {
                out.push_str(&format!("-{b}\n+{a}\n"));
            }
            (Some(b), None) => out.push_str(&format!("-{b}\n")),
            (None, Some(a)) => out.push_str(&format!("+{a}\n")),
            (None, None) => {}
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgeflow_test_utils::MockLlmClient;

    #[tokio::test]
    async fn classify_maps_llm_response_to_known_category() {
        let llm = Arc::new(MockLlmClient::new().with_json_response(
            serde_json::json!({"category": "IMPORT_ERROR", "root_cause": "missing requests module"}),
        ));
        let debugger = SelfDebugger::new(llm, 3);
        let result = ExecutionResult {
            exit_status: 1,
            stdout: String::new(),
            stderr: "ModuleNotFoundError: requests".to_string(),
            elapsed_ms: 0,
            step_statuses: vec![],
        };
        let (category, root_cause) = debugger.classify(&result).await.unwrap();
        assert_eq!(category, ErrorCategory::ImportError);
        assert!(root_cause.contains("requests"));
    }

    #[tokio::test]
    async fn patch_rejects_response_missing_required_step_function() {
        let llm = Arc::new(MockLlmClient::new().with_json_response(serde_json::json!({
            "artifact": "async fn step_other() {}",
            "fix_description": "renamed function"
        })));
        let debugger = SelfDebugger::new(llm, 3);
        let result = debugger
            .patch(
                1,
                "async fn step_post_message() {}",
                ErrorCategory::LogicError,
                "wrong function name",
                &["step_post_message".to_string()],
                &[],
            )
            .await;
        assert!(matches!(result, Err(DebugError::MissingStepFunction(_))));
    }

    #[tokio::test]
    async fn patch_rejects_response_missing_required_env_var() {
        let llm = Arc::new(MockLlmClient::new().with_json_response(serde_json::json!({
            "artifact": "async fn step_post_message() {}",
            "fix_description": "dropped credential read"
        })));
        let debugger = SelfDebugger::new(llm, 3);
        let result = debugger
            .patch(
                1,
                "async fn step_post_message() { std::env::var(\"SLACK_BOT_TOKEN\")?; }",
                ErrorCategory::AuthFailure,
                "bad token handling",
                &["step_post_message".to_string()],
                &["SLACK_BOT_TOKEN".to_string()],
            )
            .await;
        assert!(matches!(result, Err(DebugError::MissingEnvironmentVar(_))));
    }

    #[tokio::test]
    async fn patch_succeeds_and_produces_a_diff_when_contract_preserved() {
        let llm = Arc::new(MockLlmClient::new().with_json_response(serde_json::json!({
            "artifact": "async fn step_post_message() { std::env::var(\"SLACK_BOT_TOKEN\")?; /* fixed */ }",
            "fix_description": "added missing await"
        })));
        let debugger = SelfDebugger::new(llm, 3);
        let (record, patched) = debugger
            .patch(
                1,
                "async fn step_post_message() { std::env::var(\"SLACK_BOT_TOKEN\")?; }",
                ErrorCategory::LogicError,
                "missing await",
                &["step_post_message".to_string()],
                &["SLACK_BOT_TOKEN".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(record.attempt, 1);
        assert!(!record.diff.is_empty());
        assert!(patched.contains("fixed"));
    }

    #[tokio::test]
    async fn patch_fails_budget_check_past_max_attempts() {
        let llm = Arc::new(MockLlmClient::new());
        let debugger = SelfDebugger::new(llm, 2);
        let result = debugger
            .patch(3, "source", ErrorCategory::Unknown, "cause", &[], &[])
            .await;
        assert!(matches!(result, Err(DebugError::BudgetExhausted { max_attempts: 2 })));
    }
}
