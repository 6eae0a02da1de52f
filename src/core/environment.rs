//! Environment tier resolution.
//!
//! The tier is resolved once at the top of every aggregation pass and then
//! threaded through the loaders via [`LoadContext`](crate::sources::LoadContext).

use crate::error::{ConfigError, Result};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Default name of the primary tier variable.
pub const DEFAULT_ENVIRONMENT_VAR: &str = "APP_ENV";

/// Default name of the secondary (fallback) tier variable.
pub const DEFAULT_FALLBACK_ENVIRONMENT_VAR: &str = "DEPLOY_ENV";

/// Deployment stage of the running process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EnvironmentTier {
    /// Local/offline development. Remote loaders never run in this tier.
    #[default]
    Local,
    /// Shared development environment.
    Development,
    /// Automated test environment.
    Test,
    /// Pre-production.
    Staging,
    /// Production.
    Production,
}

impl EnvironmentTier {
    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Development => "development",
            Self::Test => "test",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }

    /// Whether remote-backed loaders are skipped in this tier.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local)
    }
}

impl fmt::Display for EnvironmentTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnvironmentTier {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "offline" => Ok(Self::Local),
            "development" | "dev" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            "staging" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            other => Err(ConfigError::ParseError(format!(
                "Unknown environment tier '{}'",
                other
            ))),
        }
    }
}

/// Resolve the active tier from a primary and a secondary signal.
///
/// An unrecognized primary value falls back to the secondary one; if neither is
/// usable the tier defaults to [`EnvironmentTier::Local`]. Every rejected value
/// is reported with `tracing::warn!`.
pub fn resolve_environment(primary: Option<&str>, secondary: Option<&str>) -> EnvironmentTier {
    if let Some(value) = primary {
        match value.parse() {
            Ok(tier) => return tier,
            Err(_) => tracing::warn!(value, "Unrecognized primary environment tier"),
        }
    }

    if let Some(value) = secondary {
        match value.parse() {
            Ok(tier) => return tier,
            Err(_) => tracing::warn!(value, "Unrecognized fallback environment tier"),
        }
    }

    if primary.is_some() || secondary.is_some() {
        tracing::warn!("Falling back to the local environment tier");
    }
    EnvironmentTier::Local
}

/// Mapping from environment tier to remote path segment.
///
/// Remote loaders combine a base path with the segment of the active tier.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentPaths {
    segments: HashMap<EnvironmentTier, String>,
}

impl EnvironmentPaths {
    /// An empty mapping; every tier is unmapped.
    pub fn empty() -> Self {
        Self {
            segments: HashMap::new(),
        }
    }

    /// Set the segment used for a tier.
    pub fn with_segment(mut self, tier: EnvironmentTier, segment: impl Into<String>) -> Self {
        self.segments.insert(tier, segment.into());
        self
    }

    /// The segment for a tier, if mapped.
    pub fn segment(&self, tier: EnvironmentTier) -> Option<&str> {
        self.segments.get(&tier).map(String::as_str)
    }

    /// Join `base_path` with the segment for `tier`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvironmentMapping`] when the tier is unmapped.
    pub fn resolve(&self, base_path: &str, tier: EnvironmentTier) -> Result<String> {
        let segment = self
            .segment(tier)
            .ok_or_else(|| ConfigError::MissingEnvironmentMapping {
                environment: tier.to_string(),
            })?;

        let base = base_path.trim_end_matches('/');
        let segment = segment.trim_matches('/');
        if base.is_empty() {
            Ok(format!("/{}", segment))
        } else {
            Ok(format!("{}/{}", base, segment))
        }
    }
}

impl Default for EnvironmentPaths {
    fn default() -> Self {
        Self::empty()
            .with_segment(EnvironmentTier::Development, "dev")
            .with_segment(EnvironmentTier::Test, "test")
            .with_segment(EnvironmentTier::Staging, "staging")
            .with_segment(EnvironmentTier::Production, "prod")
    }
}
