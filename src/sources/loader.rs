//! Source loader trait.

use crate::core::{EnvironmentTier, SourceType};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// A mapping from string key to arbitrary (possibly nested) value.
pub type ConfigMap = serde_json::Map<String, serde_json::Value>;

/// Per-pass context handed to every loader.
///
/// Built once at the top of an aggregation pass so that every loader sees the
/// same environment tier and the same view of the process variables.
#[derive(Debug, Clone, Default)]
pub struct LoadContext {
    /// The resolved environment tier.
    pub environment: EnvironmentTier,
    /// Snapshot of process variables taken at the start of the pass.
    pub variables: HashMap<String, String>,
}

impl LoadContext {
    /// Create a context for a tier with the given variable snapshot.
    pub fn new(environment: EnvironmentTier, variables: HashMap<String, String>) -> Self {
        Self {
            environment,
            variables,
        }
    }

    /// Look up a variable in the snapshot.
    pub fn var(&self, key: &str) -> Option<&str> {
        self.variables.get(key).map(String::as_str)
    }
}

/// Trait for configuration loaders.
///
/// Implement this trait to plug a new backend into the aggregator.
///
/// # Contract
///
/// - `load` returns an empty map when the backend simply has no data. Only
///   genuine backend failures are errors.
/// - `is_available` is a cheap probe. A loader reporting `false` is skipped
///   and its `load` is never called.
#[async_trait]
pub trait SourceLoader: Send + Sync {
    /// Fetch the full key/value set of this source.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails (access denied, malformed request,
    /// transient fault).
    async fn load(&self, ctx: &LoadContext) -> Result<ConfigMap>;

    /// Whether this loader should run in the given context.
    async fn is_available(&self, ctx: &LoadContext) -> bool;

    /// Get a human-readable name for this loader (for logging/debugging).
    fn name(&self) -> String;

    /// The kind of source this loader produces.
    fn source_type(&self) -> SourceType;

    /// Base priority of the source this loader produces.
    fn priority(&self) -> i32 {
        100
    }
}
