//! The secret resolver seam: per-service credential lookup is out of
//! scope for the core (`spec.md` §1), but the sandbox executor still
//! needs a concrete way to turn the DAG's declared environment variable
//! names into values at execution time, without those values ever
//! passing through the pipeline state or the generated artifact.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Errors resolving a credential.
#[derive(Debug, Error)]
pub enum SecretError {
    /// The backing store could not be reached.
    #[error("secret store unavailable: {0}")]
    Unavailable(String),
}

/// Resolves the DAG's declared environment variable names to credential
/// values at sandbox execution time. Implemented externally in
/// production (a key-value secret store); the core only defines the seam.
#[async_trait]
pub trait SecretResolver: Send + Sync {
    /// Resolve one environment variable name to its credential value, or
    /// `None` if this resolver holds nothing for it.
    async fn resolve(&self, env_var: &str) -> Result<Option<String>, SecretError>;

    /// Resolve every name in `env_vars`, skipping names with no value
    /// rather than failing the whole batch — a missing credential
    /// surfaces downstream as an `AUTH_FAILURE`/`MISSING_PARAM` sandbox
    /// failure, not as a resolver error.
    async fn resolve_all(&self, env_vars: &[String]) -> Result<HashMap<String, String>, SecretError> {
        let mut resolved = HashMap::with_capacity(env_vars.len());
        for name in env_vars {
            if let Some(value) = self.resolve(name).await? {
                resolved.insert(name.clone(), value);
            }
        }
        Ok(resolved)
    }
}

/// Resolves credentials from the current process environment. The
/// default for local/manual runs; production deployments supply their
/// own `SecretResolver` backed by a real secret store.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecretResolver;

#[async_trait]
impl SecretResolver for EnvSecretResolver {
    async fn resolve(&self, env_var: &str) -> Result<Option<String>, SecretError> {
        Ok(std::env::var(env_var).ok().filter(|v| !v.is_empty()))
    }
}

/// Resolves nothing, for tests exercising the sandbox stage without
/// real credentials.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSecretResolver;

#[async_trait]
impl SecretResolver for NullSecretResolver {
    async fn resolve(&self, _env_var: &str) -> Result<Option<String>, SecretError> {
        Ok(None)
    }
}

/// Resolves from a fixed in-memory map, for deterministic pipeline tests.
#[derive(Debug, Default, Clone)]
pub struct StaticSecretResolver(HashMap<String, String>);

impl StaticSecretResolver {
    /// Build a resolver over a fixed name -> value map.
    #[must_use]
    pub fn new(values: HashMap<String, String>) -> Self {
        Self(values)
    }
}

#[async_trait]
impl SecretResolver for StaticSecretResolver {
    async fn resolve(&self, env_var: &str) -> Result<Option<String>, SecretError> {
        Ok(self.0.get(env_var).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_resolver_resolves_nothing() {
        let resolver = NullSecretResolver;
        let resolved = resolver.resolve_all(&["SLACK_BOT_TOKEN".to_string()]).await.unwrap();
        assert!(resolved.is_empty());
    }

    #[tokio::test]
    async fn static_resolver_resolves_known_names_and_skips_unknown() {
        let mut values = HashMap::new();
        values.insert("SLACK_BOT_TOKEN".to_string(), "xoxb-test".to_string());
        let resolver = StaticSecretResolver::new(values);

        let resolved = resolver
            .resolve_all(&["SLACK_BOT_TOKEN".to_string(), "GMAIL_APP_PASSWORD".to_string()])
            .await
            .unwrap();

        assert_eq!(resolved.get("SLACK_BOT_TOKEN").map(String::as_str), Some("xoxb-test"));
        assert!(!resolved.contains_key("GMAIL_APP_PASSWORD"));
    }
}
