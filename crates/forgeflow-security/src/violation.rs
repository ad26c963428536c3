//! Violation categories and severities reported by the scanner.

use serde::{Deserialize, Serialize};

/// The fixed blacklist categories the scanner checks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Evaluation of a string as code, or import of an arbitrary name at runtime.
    DynamicCodeExecution,
    /// A shell invocation built from an interpolated/formatted string.
    ShellInjection,
    /// A literal matching a credential shape (service-token prefix or
    /// high-entropy string ≥32 chars) outside a comment.
    CredentialLiteral,
    /// A filesystem write outside the workflow's designated output directory.
    FilesystemWriteOutsideOutputDir,
}

impl Category {
    /// Short machine-stable name, used in log lines and test assertions.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DynamicCodeExecution => "dynamic_code_execution",
            Self::ShellInjection => "shell_injection",
            Self::CredentialLiteral => "credential_literal",
            Self::FilesystemWriteOutsideOutputDir => "filesystem_write_outside_output_dir",
        }
    }
}

/// Whether a category fails the stage outright or is merely surfaced
/// to the user. Configurable per deployment; the default maps every
/// category to `Blocking`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Fails the security stage and enters self-debug with `SECURITY_VIOLATION`.
    Blocking,
    /// Reported to the user but does not fail the stage.
    Advisory,
}

/// One reported finding: its category, severity, source line, and a
/// short human-readable description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Which rule matched.
    pub category: Category,
    /// Blocking or advisory, per the scanner's configured severities.
    pub severity: Severity,
    /// 1-based line number in the scanned source.
    pub line: usize,
    /// Short human-readable description of the match.
    pub message: String,
}
