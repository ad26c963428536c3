//! Errors raised by the security scanner.

use thiserror::Error;

/// Raised when the scan turns up one or more blocking violations.
#[derive(Debug, Error)]
#[error("security review failed with {blocking_count} blocking violation(s)")]
pub struct SecurityViolationError {
    /// Number of blocking-severity violations found.
    pub blocking_count: usize,
}
