//! Self-debug error classification and per-attempt debug records.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The closed set of error categories the self-debugger classifies failures into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// A required module/dependency could not be imported.
    ImportError,
    /// A credential was rejected by the target service.
    AuthFailure,
    /// A request or response did not match the expected schema.
    SchemaMismatch,
    /// The target service throttled the request.
    RateLimit,
    /// A required parameter was absent.
    MissingParam,
    /// A logic error in the generated code.
    LogicError,
    /// A network-level failure.
    NetworkError,
    /// An operation exceeded its timeout.
    Timeout,
    /// The artifact failed the security review.
    SecurityViolation,
    /// None of the above; the catch-all for unparsed/unexpected categories.
    Unknown,
}

impl ErrorCategory {
    /// Parse an LLM-returned category string, mapping anything outside the
    /// closed set to [`ErrorCategory::Unknown`] rather than erroring.
    #[must_use]
    pub fn from_llm_str(s: &str) -> Self {
        Self::from_str(s).unwrap_or(Self::Unknown)
    }
}

impl FromStr for ErrorCategory {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "IMPORT_ERROR" => Ok(Self::ImportError),
            "AUTH_FAILURE" => Ok(Self::AuthFailure),
            "SCHEMA_MISMATCH" => Ok(Self::SchemaMismatch),
            "RATE_LIMIT" => Ok(Self::RateLimit),
            "MISSING_PARAM" => Ok(Self::MissingParam),
            "LOGIC_ERROR" => Ok(Self::LogicError),
            "NETWORK_ERROR" => Ok(Self::NetworkError),
            "TIMEOUT" => Ok(Self::Timeout),
            "SECURITY_VIOLATION" => Ok(Self::SecurityViolation),
            "UNKNOWN" => Ok(Self::Unknown),
            _ => Err(()),
        }
    }
}

/// One iteration of the self-debug loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugRecord {
    /// 1-based attempt index.
    pub attempt: u32,
    /// Classified error category.
    pub category: ErrorCategory,
    /// One-sentence root-cause diagnosis.
    pub root_cause: String,
    /// Description of the fix that was applied.
    pub fix_description: String,
    /// Unified diff of the artifact before and after the patch.
    pub diff: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_categories_parse() {
        assert_eq!(ErrorCategory::from_llm_str("IMPORT_ERROR"), ErrorCategory::ImportError);
        assert_eq!(ErrorCategory::from_llm_str("timeout"), ErrorCategory::Timeout);
    }

    #[test]
    fn unrecognized_categories_map_to_unknown() {
        assert_eq!(ErrorCategory::from_llm_str("SOMETHING_NEW"), ErrorCategory::Unknown);
        assert_eq!(ErrorCategory::from_llm_str(""), ErrorCategory::Unknown);
    }
}
