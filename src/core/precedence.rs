//! Precedence-based merging of labeled configuration sources.
//!
//! Every source gets an effective priority (its base priority plus a boost
//! decided by its type and the active [`PrecedencePolicy`]). Sources are then
//! deep-merged from lowest to highest effective priority, so the highest
//! priority source wins every leaf it defines.

use crate::error::{ConfigError, Result};
use crate::sources::ConfigMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Boost step between source types under a boosting policy.
///
/// Large enough that ordinary base priorities never reorder two types.
pub const TYPE_BOOST: f64 = 1_000_000.0;

/// Where a configuration source came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
    /// Process environment variables.
    Environment,
    /// A remote secret store.
    SecretsStore,
    /// A remote hierarchical parameter store.
    ParameterStore,
    /// A file on local disk.
    LocalFile,
}

impl SourceType {
    /// Canonical kebab-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Environment => "environment",
            Self::SecretsStore => "secrets-store",
            Self::ParameterStore => "parameter-store",
            Self::LocalFile => "local-file",
        }
    }

    /// Whether the source is backed by a remote service.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::SecretsStore | Self::ParameterStore)
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "environment" => Ok(Self::Environment),
            "secrets-store" => Ok(Self::SecretsStore),
            "parameter-store" => Ok(Self::ParameterStore),
            "local-file" => Ok(Self::LocalFile),
            other => Err(ConfigError::ParseError(format!(
                "Unknown source type '{}'",
                other
            ))),
        }
    }
}

/// Rule deciding which source wins on key collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrecedencePolicy {
    /// Remote-backed sources outrank local ones (secrets > parameters > local).
    #[default]
    AwsFirst,
    /// Local sources outrank remote ones.
    LocalFirst,
    /// No boosting; sources apply in list order, last wins.
    Merge,
}

impl PrecedencePolicy {
    /// Wire name of the policy.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwsFirst => "aws-first",
            Self::LocalFirst => "local-first",
            Self::Merge => "merge",
        }
    }
}

impl fmt::Display for PrecedencePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrecedencePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "aws-first" => Ok(Self::AwsFirst),
            "local-first" => Ok(Self::LocalFirst),
            "merge" => Ok(Self::Merge),
            other => Err(ConfigError::ParseError(format!(
                "Unknown precedence policy '{}'",
                other
            ))),
        }
    }
}

/// A labeled chunk of configuration data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationSource {
    /// Human-readable identifier.
    pub name: String,
    /// Kind of backend the data came from.
    #[serde(rename = "type")]
    pub source_type: SourceType,
    /// Caller-assigned base priority.
    pub priority: f64,
    /// The configuration data; must be an object.
    pub data: Value,
    /// Optional logical grouping tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// When the data was retrieved.
    pub loaded_at: DateTime<Utc>,
    /// Non-fatal issues met while loading.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ConfigurationSource {
    /// Create a source stamped with the current time.
    pub fn new(
        name: impl Into<String>,
        source_type: SourceType,
        priority: f64,
        data: impl Into<Value>,
    ) -> Self {
        Self {
            name: name.into(),
            source_type,
            priority,
            data: data.into(),
            namespace: None,
            loaded_at: Utc::now(),
            errors: Vec::new(),
        }
    }

    /// Tag the source with a namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Attach non-fatal loading issues.
    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = errors;
        self
    }

    /// Override the retrieval timestamp.
    pub fn with_loaded_at(mut self, loaded_at: DateTime<Utc>) -> Self {
        self.loaded_at = loaded_at;
        self
    }

    /// The data as a map, if it is an object.
    pub fn data_map(&self) -> Option<&ConfigMap> {
        self.data.as_object()
    }
}

/// Check every source's structural invariants.
///
/// All violations are collected, each qualified by the source's index.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidSources`] listing every violation.
pub fn validate_sources(sources: &[ConfigurationSource]) -> Result<()> {
    let mut issues = Vec::new();

    for (index, source) in sources.iter().enumerate() {
        if source.name.trim().is_empty() {
            issues.push(format!("source at index {} must have a non-empty name", index));
        }
        if !source.priority.is_finite() {
            issues.push(format!("source at index {} must have a numeric priority", index));
        }
        if !source.data.is_object() {
            issues.push(format!("source at index {} must have object data", index));
        }
        if source.namespace.as_deref().is_some_and(|ns| ns.trim().is_empty()) {
            issues.push(format!("source at index {} has an empty namespace", index));
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::InvalidSources(issues))
    }
}

/// Base priority plus the policy-dependent type boost.
pub fn effective_priority(source: &ConfigurationSource, policy: PrecedencePolicy) -> f64 {
    let rank = match (policy, source.source_type) {
        (PrecedencePolicy::Merge, _) => 0.0,
        (PrecedencePolicy::AwsFirst, SourceType::SecretsStore) => 2.0,
        (PrecedencePolicy::AwsFirst, SourceType::ParameterStore) => 1.0,
        (PrecedencePolicy::AwsFirst, _) => 0.0,
        (PrecedencePolicy::LocalFirst, SourceType::Environment | SourceType::LocalFile) => 2.0,
        (PrecedencePolicy::LocalFirst, SourceType::ParameterStore) => 1.0,
        (PrecedencePolicy::LocalFirst, SourceType::SecretsStore) => 0.0,
    };
    source.priority + rank * TYPE_BOOST
}

/// Merge sources under a precedence policy.
///
/// - An empty list yields an empty map; a single source yields its data unchanged.
/// - Under [`PrecedencePolicy::Merge`] sources apply in list order.
/// - Otherwise sources are stably sorted by effective priority (ascending) and
///   applied in that order.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidSources`] if any source is malformed.
pub fn merge_sources(
    sources: &[ConfigurationSource],
    policy: PrecedencePolicy,
) -> Result<ConfigMap> {
    validate_sources(sources)?;

    match sources {
        [] => return Ok(ConfigMap::new()),
        [only] => return Ok(only.data_map().cloned().unwrap_or_default()),
        _ => {}
    }

    let mut ordered: Vec<&ConfigurationSource> = sources.iter().collect();
    if policy != PrecedencePolicy::Merge {
        ordered.sort_by(|a, b| {
            effective_priority(a, policy).total_cmp(&effective_priority(b, policy))
        });
    }

    tracing::debug!(
        ?policy,
        order = ?ordered.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
        "Merging configuration sources"
    );

    let mut merged = ConfigMap::new();
    for source in ordered {
        if let Some(data) = source.data_map() {
            deep_merge(&mut merged, data);
        }
    }
    Ok(merged)
}

/// Recursively merge `incoming` into `target`.
///
/// Nested objects merge key by key; any other value (scalars, arrays, null)
/// replaces what `target` held.
pub fn deep_merge(target: &mut ConfigMap, incoming: &ConfigMap) {
    for (key, value) in incoming {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(nested)) => deep_merge(existing, nested),
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Last-writer-wins merge of top-level keys.
pub fn shallow_merge(target: &mut ConfigMap, incoming: ConfigMap) {
    target.extend(incoming);
}
