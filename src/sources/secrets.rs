//! Remote secret-store configuration loader.

use super::{ConfigMap, LoadContext, SourceLoader};
use crate::core::{EnvironmentPaths, SourceType};
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Transport for a secret store.
///
/// Implementations map "secret does not exist" to `Ok(None)`; every other
/// failure is an error.
#[async_trait]
pub trait SecretsBackend: Send + Sync {
    /// Fetch the string payload of a secret.
    async fn get_secret_string(&self, secret_id: &str) -> Result<Option<String>>;

    /// Whether the backend can be reached (credentials, region, ...).
    async fn is_available(&self) -> bool {
        true
    }
}

/// Loader that reads one JSON secret per environment tier.
///
/// The secret id is the base path joined with the tier's path segment, e.g.
/// `/myapp` + production -> `/myapp/prod`. The secret payload must be a JSON
/// object; its entries become the loaded keys.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use tiered_config::sources::{InMemorySecrets, SecretsStoreLoader};
///
/// let backend = Arc::new(InMemorySecrets::new());
/// let loader = SecretsStoreLoader::new(backend, "/myapp");
/// ```
pub struct SecretsStoreLoader {
    backend: Arc<dyn SecretsBackend>,
    base_path: String,
    paths: EnvironmentPaths,
    priority: i32,
}

impl SecretsStoreLoader {
    /// Create a loader with the default tier mapping.
    pub fn new(backend: Arc<dyn SecretsBackend>, base_path: impl Into<String>) -> Self {
        Self {
            backend,
            base_path: base_path.into(),
            paths: EnvironmentPaths::default(),
            priority: 100,
        }
    }

    /// Replace the tier-to-segment mapping.
    pub fn with_paths(mut self, paths: EnvironmentPaths) -> Self {
        self.paths = paths;
        self
    }

    /// Set the priority for this loader.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

#[async_trait]
impl SourceLoader for SecretsStoreLoader {
    async fn load(&self, ctx: &LoadContext) -> Result<ConfigMap> {
        let secret_id = self.paths.resolve(&self.base_path, ctx.environment)?;

        let Some(payload) = self.backend.get_secret_string(&secret_id).await? else {
            tracing::debug!(secret_id = %secret_id, "Secret not found");
            return Ok(ConfigMap::new());
        };

        if payload.trim().is_empty() {
            return Ok(ConfigMap::new());
        }

        match serde_json::from_str::<Value>(&payload) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(ConfigError::ParseError(format!(
                "Secret '{}' is not a JSON object",
                secret_id
            ))),
            Err(e) => Err(ConfigError::ParseError(format!(
                "Secret '{}' is not valid JSON: {}",
                secret_id, e
            ))),
        }
    }

    async fn is_available(&self, ctx: &LoadContext) -> bool {
        !ctx.environment.is_local() && self.backend.is_available().await
    }

    fn name(&self) -> String {
        format!("secrets:{}", self.base_path)
    }

    fn source_type(&self) -> SourceType {
        SourceType::SecretsStore
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// In-process secret store, handy for local development and tests.
#[derive(Debug, Default, Clone)]
pub struct InMemorySecrets {
    secrets: HashMap<String, String>,
}

impl InMemorySecrets {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a secret payload.
    pub fn with_secret(mut self, secret_id: impl Into<String>, payload: impl Into<String>) -> Self {
        self.secrets.insert(secret_id.into(), payload.into());
        self
    }
}

#[async_trait]
impl SecretsBackend for InMemorySecrets {
    async fn get_secret_string(&self, secret_id: &str) -> Result<Option<String>> {
        Ok(self.secrets.get(secret_id).cloned())
    }
}
