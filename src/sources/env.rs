//! Environment variable configuration loader.

use super::{ConfigMap, LoadContext, SourceLoader};
use crate::core::SourceType;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::ffi::OsString;

/// Environment variable configuration loader.
///
/// Reads the variable snapshot of the current pass, keeps the variables that
/// start with the configured prefix and strips that prefix from the keys.
/// Values are kept as strings; schema validation coerces them later.
///
/// # Examples
///
/// ```rust
/// use tiered_config::sources::EnvLoader;
///
/// // APP_DATABASE_HOST=db -> DATABASE_HOST = "db"
/// let loader = EnvLoader::with_prefix("APP");
/// ```
pub struct EnvLoader {
    prefix: Option<String>,
    priority: i32,
}

impl EnvLoader {
    /// Create a loader that exposes every variable unchanged.
    pub fn new() -> Self {
        Self {
            prefix: None,
            priority: 100,
        }
    }

    /// Create a loader that keeps only variables starting with `prefix`.
    ///
    /// A trailing `_` is appended to the prefix when missing, so `APP`
    /// matches `APP_PORT` but not `APPLICATION`.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        if !prefix.is_empty() && !prefix.ends_with('_') {
            prefix.push('_');
        }
        Self {
            prefix: Some(prefix).filter(|p| !p.is_empty()),
            priority: 100,
        }
    }

    /// Set the priority for this loader.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot the process environment.
///
/// Variables whose name or value is not valid Unicode are skipped.
pub fn process_variables() -> HashMap<String, String> {
    collect_variables(std::env::vars_os())
}

pub(crate) fn collect_variables<I>(vars: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
            (Ok(key), Ok(value)) => Some((key, value)),
            (Ok(key), Err(_)) => {
                tracing::debug!(key = %key, "Skipping variable with non-Unicode value");
                None
            }
            (Err(key), _) => {
                tracing::debug!(key = ?key, "Skipping variable with non-Unicode name");
                None
            }
        })
        .collect()
}

#[async_trait]
impl SourceLoader for EnvLoader {
    async fn load(&self, ctx: &LoadContext) -> Result<ConfigMap> {
        let mut map = ConfigMap::new();
        for (key, value) in &ctx.variables {
            let stripped = match &self.prefix {
                Some(prefix) => match key.strip_prefix(prefix.as_str()) {
                    Some(rest) if !rest.is_empty() => rest,
                    _ => continue,
                },
                None => key.as_str(),
            };
            map.insert(stripped.to_string(), Value::String(value.clone()));
        }
        Ok(map)
    }

    async fn is_available(&self, _ctx: &LoadContext) -> bool {
        true
    }

    fn name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("env:{}*", prefix),
            None => "env:*".to_string(),
        }
    }

    fn source_type(&self) -> SourceType {
        SourceType::Environment
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}
