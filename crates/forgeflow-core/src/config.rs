//! Runtime configuration, loaded from environment variables per the
//! external interfaces contract (`spec.md` §6). The teacher reads
//! configuration structurally rather than through a dedicated config
//! crate, so this follows plain `std::env` plus `serde`-friendly
//! defaults rather than introducing a new dependency for it.

use std::collections::HashMap;
use std::time::Duration;

/// Default self-debug attempt budget when `MAX_DEBUG_ATTEMPTS` is unset.
pub const DEFAULT_MAX_DEBUG_ATTEMPTS: u32 = 3;

/// Default sandbox wall-clock timeout when `SANDBOX_TIMEOUT` is unset.
pub const DEFAULT_SANDBOX_TIMEOUT: Duration = Duration::from_secs(30);

/// Default confidence threshold below which the conversation engine
/// suspends for clarification.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Prefix for per-service credential environment variables, e.g.
/// `FORGEFLOW_CREDENTIAL_SLACK`. Kept as an extension point for
/// services the built-in table below doesn't name.
const CREDENTIAL_ENV_PREFIX: &str = "FORGEFLOW_CREDENTIAL_";

/// The literal per-service credential variables named by `spec.md` §6,
/// mapped to the service they gate. A service is considered
/// credentialed if *any* of its listed variables is set and non-empty,
/// matching `GMAIL_ADDRESS`/`GMAIL_APP_PASSWORD` both gating `"gmail"`.
const KNOWN_CREDENTIAL_VARS: &[(&str, &str)] = &[
    ("SLACK_BOT_TOKEN", "slack"),
    ("GMAIL_ADDRESS", "gmail"),
    ("GMAIL_APP_PASSWORD", "gmail"),
    ("GOOGLE_API_KEY", "google"),
];

/// Process-wide configuration, assembled once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Credential for the configured LLM provider.
    pub llm_api_key: Option<String>,
    /// Model identifier passed to the LLM provider.
    pub llm_model: String,
    /// Self-debug attempt budget (`N_max`).
    pub max_debug_attempts: u32,
    /// Sandbox execution wall-clock timeout.
    pub sandbox_timeout: Duration,
    /// Confidence floor for proceeding without clarification.
    pub confidence_threshold: f64,
    /// Service name -> has-credential, derived from `FORGEFLOW_CREDENTIAL_*`
    /// environment variables being present and non-empty.
    pub service_credentials: HashMap<String, bool>,
}

impl Config {
    /// Load configuration from the process environment, falling back to
    /// documented defaults for anything unset.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_iter(std::env::vars())
    }

    /// Load configuration from an arbitrary iterator of environment
    /// variables, so tests can exercise env parsing without mutating the
    /// real process environment.
    #[must_use]
    pub fn from_env_iter(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut llm_api_key = None;
        let mut llm_model = "gpt-4o-mini".to_string();
        let mut max_debug_attempts = DEFAULT_MAX_DEBUG_ATTEMPTS;
        let mut sandbox_timeout = DEFAULT_SANDBOX_TIMEOUT;
        let mut confidence_threshold = DEFAULT_CONFIDENCE_THRESHOLD;
        let mut service_credentials = HashMap::new();

        for (key, value) in vars {
            match key.as_str() {
                "LLM_API_KEY" if !value.is_empty() => llm_api_key = Some(value),
                "LLM_MODEL" if !value.is_empty() => llm_model = value,
                "MAX_DEBUG_ATTEMPTS" => {
                    if let Ok(parsed) = value.parse() {
                        max_debug_attempts = parsed;
                    }
                }
                "SANDBOX_TIMEOUT" => {
                    if let Ok(seconds) = value.parse() {
                        sandbox_timeout = Duration::from_secs(seconds);
                    }
                }
                "CONFIDENCE_THRESHOLD" => {
                    if let Ok(parsed) = value.parse() {
                        confidence_threshold = parsed;
                    }
                }
                key if key.starts_with(CREDENTIAL_ENV_PREFIX) => {
                    let service = key[CREDENTIAL_ENV_PREFIX.len()..].to_lowercase();
                    service_credentials.insert(service, !value.is_empty());
                }
                key => {
                    if let Some((_, service)) = KNOWN_CREDENTIAL_VARS.iter().find(|(var, _)| *var == key) {
                        let present = !value.is_empty();
                        service_credentials
                            .entry((*service).to_string())
                            .and_modify(|has| *has = *has || present)
                            .or_insert(present);
                    }
                }
            }
        }

        Self {
            llm_api_key,
            llm_model,
            max_debug_attempts,
            sandbox_timeout,
            confidence_threshold,
            service_credentials,
        }
    }

    /// Whether a live HTTP LLM client should be constructed, as opposed
    /// to falling back to a mock for local/manual testing.
    #[must_use]
    pub fn has_live_llm_credential(&self) -> bool {
        self.llm_api_key.is_some()
    }
}
