//! Hierarchical parameter-store configuration loader.

use super::{ConfigMap, LoadContext, SourceLoader};
use crate::core::{EnvironmentPaths, SourceType};
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// A single parameter returned by a parameter store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Fully-qualified parameter name, e.g. `/myapp/prod/DATABASE_HOST`.
    pub name: String,
    /// Decrypted parameter value.
    pub value: String,
}

/// One page of a by-path listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterPage {
    /// Parameters on this page.
    pub parameters: Vec<Parameter>,
    /// Continuation token; `None` when the listing is exhausted.
    pub next_token: Option<String>,
}

/// Transport for a hierarchical parameter store.
#[async_trait]
pub trait ParameterBackend: Send + Sync {
    /// List parameters recursively below `path`, decrypted, one page at a time.
    async fn get_parameters_by_path(
        &self,
        path: &str,
        next_token: Option<String>,
    ) -> Result<ParameterPage>;

    /// Whether the backend can be reached (credentials, region, ...).
    async fn is_available(&self) -> bool {
        true
    }
}

/// Loader that reads every parameter below `<base_path>/<tier segment>`.
///
/// Parameter names are turned into flat keys by stripping the resolved base
/// path, removing every `/` and upper-casing the rest. Names that end up
/// empty are dropped.
pub struct ParameterStoreLoader {
    backend: Arc<dyn ParameterBackend>,
    base_path: String,
    paths: EnvironmentPaths,
    priority: i32,
    max_pages: usize,
}

impl ParameterStoreLoader {
    /// Create a loader with the default tier mapping.
    pub fn new(backend: Arc<dyn ParameterBackend>, base_path: impl Into<String>) -> Self {
        Self {
            backend,
            base_path: base_path.into(),
            paths: EnvironmentPaths::default(),
            priority: 100,
            max_pages: 10_000,
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

    /// Upper bound on pages followed before the listing is considered broken.
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }
}

/// Turn a fully-qualified parameter name into a flat key.
pub(crate) fn parameter_key(name: &str, resolved_path: &str) -> Option<String> {
    let relative = name.strip_prefix(resolved_path).unwrap_or(name);
    let key: String = relative.chars().filter(|c| *c != '/').collect();
    if key.is_empty() {
        None
    } else {
        Some(key.to_uppercase())
    }
}

#[async_trait]
impl SourceLoader for ParameterStoreLoader {
    async fn load(&self, ctx: &LoadContext) -> Result<ConfigMap> {
        let path = self.paths.resolve(&self.base_path, ctx.environment)?;

        let mut map = ConfigMap::new();
        let mut token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self
                .backend
                .get_parameters_by_path(&path, token.take())
                .await?;
            pages += 1;

            for parameter in page.parameters {
                match parameter_key(&parameter.name, &path) {
                    Some(key) => {
                        map.insert(key, Value::String(parameter.value));
                    }
                    None => tracing::debug!(
                        name = %parameter.name,
                        "Skipping parameter with empty key"
                    ),
                }
            }

            match page.next_token {
                Some(next) if !next.is_empty() => {
                    if pages >= self.max_pages {
                        return Err(ConfigError::BackendError(format!(
                            "Parameter listing for '{}' exceeded {} pages",
                            path, self.max_pages
                        )));
                    }
                    token = Some(next);
                }
                _ => break,
            }
        }

        tracing::debug!(path = %path, pages, keys = map.len(), "Loaded parameters");
        Ok(map)
    }

    async fn is_available(&self, ctx: &LoadContext) -> bool {
        !ctx.environment.is_local() && self.backend.is_available().await
    }

    fn name(&self) -> String {
        format!("parameters:{}", self.base_path)
    }

    fn source_type(&self) -> SourceType {
        SourceType::ParameterStore
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// In-process parameter store that pages its results.
#[derive(Debug, Clone)]
pub struct InMemoryParameters {
    parameters: Vec<Parameter>,
    page_size: usize,
}

impl InMemoryParameters {
    /// Create an empty store returning up to 10 parameters per page.
    pub fn new() -> Self {
        Self {
            parameters: Vec::new(),
            page_size: 10,
        }
    }

    /// Add a parameter.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push(Parameter {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Set the page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

impl Default for InMemoryParameters {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ParameterBackend for InMemoryParameters {
    async fn get_parameters_by_path(
        &self,
        path: &str,
        next_token: Option<String>,
    ) -> Result<ParameterPage> {
        let offset = match next_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| ConfigError::BackendError(format!("Invalid token '{}'", token)))?,
            None => 0,
        };

        let prefix = format!("{}/", path.trim_end_matches('/'));
        let matching: Vec<&Parameter> = self
            .parameters
            .iter()
            .filter(|p| p.name.starts_with(&prefix))
            .collect();

        let end = (offset + self.page_size).min(matching.len());
        let parameters = matching
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .map(|p| (*p).clone())
            .collect();
        let next_token = (end < matching.len()).then(|| end.to_string());

        Ok(ParameterPage {
            parameters,
            next_token,
        })
    }
}
