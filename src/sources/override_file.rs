//! Local developer override file.

use super::ConfigMap;
use crate::error::{ConfigError, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Default location of the override file, relative to the working directory.
pub const DEFAULT_OVERRIDE_FILE: &str = ".env.local";

/// Default variable whose presence marks a developer credential profile.
pub const DEFAULT_PROFILE_MARKER: &str = "AWS_PROFILE";

/// A `KEY=value` file merged on top of everything else in the local tier.
///
/// The file uses dotenv syntax (comments, quoting and `export` prefixes are
/// handled by `dotenvy`). Values are never written to the process environment.
#[derive(Debug, Clone)]
pub struct OverrideFile {
    path: PathBuf,
}

impl OverrideFile {
    /// Create a handle for the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file exists on disk.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Parse the file into a flat map of string values.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains a malformed line.
    pub fn parse(&self) -> Result<ConfigMap> {
        let entries = dotenvy::from_path_iter(&self.path).map_err(|e| {
            ConfigError::LoadError(format!(
                "Failed to open override file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let mut map = ConfigMap::new();
        for entry in entries {
            let (key, value) = entry.map_err(|e| {
                ConfigError::ParseError(format!(
                    "Malformed override file {}: {}",
                    self.path.display(),
                    e
                ))
            })?;
            map.insert(key, Value::String(value));
        }
        Ok(map)
    }

    /// Name used for diagnostics and for the produced source.
    pub fn name(&self) -> String {
        format!("override:{}", self.path.display())
    }
}

impl Default for OverrideFile {
    fn default() -> Self {
        Self::new(DEFAULT_OVERRIDE_FILE)
    }
}
