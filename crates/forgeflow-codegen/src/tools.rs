//! The fixed tool set the code generation agent may invoke, and the
//! driver-side dispatch that actually performs each tool's side effects.
//!
//! Per the tool-calling design note, the LLM client only ever returns a
//! decision (tool name + input, or finish); the driver in [`crate::tool_loop`]
//! is what touches the virtual filesystem and the corpus, never the LLM
//! response itself.

use crate::error::CodegenError;
use dashmap::DashMap;
use forgeflow_types::endpoint::ApiEndpointDocument;

/// One logged tool invocation, retained for the `tool.calling` event
/// trail and for tests asserting on agent behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocationLog {
    /// Name of the invoked tool.
    pub tool: String,
    /// The tool's input payload.
    pub input: serde_json::Value,
}

/// Whether `fetch_web_page` is permitted to run. Off by default per the
/// tool protocol contract.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolPermissions {
    /// Enables `fetch_web_page`.
    pub web_fetch_enabled: bool,
}

/// The driver's execution surface for the fixed tool set: a corpus
/// snapshot (for `fetch_spec`) and an in-memory virtual filesystem
/// (for `write_file`/`read_file`), scoped to one codegen run.
#[derive(Debug, Default)]
pub struct ToolExecutor {
    corpus: Vec<ApiEndpointDocument>,
    files: DashMap<String, String>,
    permissions: ToolPermissions,
}

impl ToolExecutor {
    /// Construct an executor over a corpus snapshot.
    #[must_use]
    pub fn new(corpus: Vec<ApiEndpointDocument>, permissions: ToolPermissions) -> Self {
        Self {
            corpus,
            files: DashMap::new(),
            permissions,
        }
    }

    /// Execute one tool call, returning the text placed into the
    /// transcript as the `"tool"`-role message content.
    pub fn execute(&self, tool: &str, input: &serde_json::Value) -> Result<String, CodegenError> {
        match tool {
            "fetch_spec" => self.fetch_spec(input),
            "fetch_web_page" => Ok(self.fetch_web_page(input)),
            "write_file" => self.write_file(input),
            "read_file" => self.read_file(input),
            other => Err(CodegenError::UnknownTool(other.to_string())),
        }
    }

    fn fetch_spec(&self, input: &serde_json::Value) -> Result<String, CodegenError> {
        let service = input
            .get("service")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| invalid("fetch_spec", "missing `service`"))?;
        let path = input
            .get("path")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| invalid("fetch_spec", "missing `path`"))?;

        let document = self
            .corpus
            .iter()
            .find(|d| d.service == service && d.path == path)
            .ok_or_else(|| CodegenError::SpecNotFound {
                service: service.to_string(),
                path: path.to_string(),
            })?;

        serde_json::to_string(document).map_err(|e| invalid("fetch_spec", &e.to_string()))
    }

    fn fetch_web_page(&self, input: &serde_json::Value) -> String {
        let url = input.get("url").and_then(serde_json::Value::as_str).unwrap_or("");
        if !self.permissions.web_fetch_enabled {
            return format!("fetch_web_page is disabled for this run (requested: {url})");
        }
        // The real fetch is an external concern left to the driver's
        // embedding application; the core only defines the contract and
        // truncates whatever text comes back.
        format!("fetch_web_page not wired to a live fetcher in this deployment ({url})")
    }

    fn write_file(&self, input: &serde_json::Value) -> Result<String, CodegenError> {
        let path = input
            .get("path")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| invalid("write_file", "missing `path`"))?;
        let contents = input
            .get("contents")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| invalid("write_file", "missing `contents`"))?;

        self.files.insert(path.to_string(), contents.to_string());
        Ok(path.to_string())
    }

    fn read_file(&self, input: &serde_json::Value) -> Result<String, CodegenError> {
        let path = input
            .get("path")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| invalid("read_file", "missing `path`"))?;

        self.files
            .get(path)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| invalid("read_file", &format!("no fragment written at `{path}`")))
    }

    /// Snapshot of all fragments written so far, in arbitrary order;
    /// used by the artifact writer to assemble per-step source.
    #[must_use]
    pub fn written_files(&self) -> Vec<(String, String)> {
        self.files.iter().map(|e| (e.key().clone(), e.value().clone())).collect()
    }
}

fn invalid(tool: &str, reason: &str) -> CodegenError {
    CodegenError::InvalidToolInput {
        tool: tool.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgeflow_types::endpoint::ParamSchema;

    fn sample_doc() -> ApiEndpointDocument {
        ApiEndpointDocument {
            service: "slack".to_string(),
            path: "chat.postMessage".to_string(),
            method: "POST".to_string(),
            description: "post a message".to_string(),
            parameters: vec![ParamSchema {
                name: "channel".to_string(),
                ty: "string".to_string(),
                required: true,
                description: "target channel".to_string(),
            }],
            response_schema: serde_json::json!({}),
            auth_scheme: "bearer_token".to_string(),
            example: String::new(),
        }
    }

    #[test]
    fn fetch_spec_returns_matching_document() {
        let executor = ToolExecutor::new(vec![sample_doc()], ToolPermissions::default());
        let result = executor
            .execute("fetch_spec", &serde_json::json!({"service": "slack", "path": "chat.postMessage"}))
            .unwrap();
        assert!(result.contains("chat.postMessage"));
    }

    #[test]
    fn fetch_spec_missing_endpoint_is_an_error() {
        let executor = ToolExecutor::new(vec![], ToolPermissions::default());
        let result = executor.execute("fetch_spec", &serde_json::json!({"service": "x", "path": "y"}));
        assert!(matches!(result, Err(CodegenError::SpecNotFound { .. })));
    }

    #[test]
    fn write_then_read_file_round_trips() {
        let executor = ToolExecutor::new(vec![], ToolPermissions::default());
        executor
            .execute("write_file", &serde_json::json!({"path": "step_1.rs", "contents": "fn x() {}"}))
            .unwrap();

        let read_back = executor.execute("read_file", &serde_json::json!({"path": "step_1.rs"})).unwrap();
        assert_eq!(read_back, "fn x() {}");
    }

    #[test]
    fn web_fetch_disabled_by_default_returns_placeholder_not_error() {
        let executor = ToolExecutor::new(vec![], ToolPermissions::default());
        let result = executor.execute("fetch_web_page", &serde_json::json!({"url": "https://example.com"})).unwrap();
        assert!(result.contains("disabled"));
    }

    #[test]
    fn unknown_tool_is_rejected() {
        let executor = ToolExecutor::new(vec![], ToolPermissions::default());
        let result = executor.execute("delete_everything", &serde_json::json!({}));
        assert!(matches!(result, Err(CodegenError::UnknownTool(_))));
    }
}
