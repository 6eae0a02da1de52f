//! File-based configuration loader.

use super::{ConfigMap, LoadContext, SourceLoader};
use crate::core::SourceType;
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use config::File;
use std::path::PathBuf;

/// File-based configuration loader.
///
/// Loads configuration from YAML, TOML, or JSON files with automatic format detection
/// based on file extension. Produces `local-file` sources.
///
/// # Examples
///
/// ```rust,no_run
/// use tiered_config::sources::FileLoader;
///
/// let loader = FileLoader::new("config/default.yaml").required(true);
/// ```
pub struct FileLoader {
    path: PathBuf,
    required: bool,
    priority: i32,
}

impl FileLoader {
    /// Create a new, optional file loader.
    ///
    /// The format is detected from the file extension:
    /// - `.yaml`, `.yml` -> YAML
    /// - `.toml` -> TOML
    /// - `.json` -> JSON
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            required: false,
            priority: 100,
        }
    }

    /// Treat a missing file as a failure instead of an empty source.
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Set the priority for this loader.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Validate that the file extension is supported.
    fn validate_extension(&self) -> Result<()> {
        let extension = self
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| {
                ConfigError::LoadError(format!(
                    "Unable to determine file format for: {}",
                    self.path.display()
                ))
            })?;

        match extension {
            "yaml" | "yml" | "toml" | "json" => Ok(()),
            _ => Err(ConfigError::LoadError(format!(
                "Unsupported file extension: {}. Supported: .yaml, .yml, .toml, .json",
                extension
            ))),
        }
    }
}

#[async_trait]
impl SourceLoader for FileLoader {
    async fn load(&self, _ctx: &LoadContext) -> Result<ConfigMap> {
        self.validate_extension()?;

        if !self.path.exists() {
            if self.required {
                return Err(ConfigError::LoadError(format!(
                    "Configuration file not found: {}",
                    self.path.display()
                )));
            }
            tracing::debug!(path = %self.path.display(), "Optional configuration file absent");
            return Ok(ConfigMap::new());
        }

        let loaded = config::Config::builder()
            .add_source(File::from(self.path.clone()).required(true))
            .build()
            .map_err(|e| ConfigError::LoadError(format!("Failed to load file: {}", e)))?;

        loaded.try_deserialize::<ConfigMap>().map_err(|e| {
            ConfigError::DeserializationError(format!("Failed to parse file: {}", e))
        })
    }

    async fn is_available(&self, _ctx: &LoadContext) -> bool {
        true
    }

    fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn source_type(&self) -> SourceType {
        SourceType::LocalFile
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_validate_extension() {
        assert!(FileLoader::new("config.yaml").validate_extension().is_ok());
        assert!(FileLoader::new("config.yml").validate_extension().is_ok());
        assert!(FileLoader::new("config.toml").validate_extension().is_ok());
        assert!(FileLoader::new("config.json").validate_extension().is_ok());
        assert!(FileLoader::new("config.txt").validate_extension().is_err());
        assert!(FileLoader::new("config").validate_extension().is_err());
    }

    #[tokio::test]
    async fn test_load_nested_yaml_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        fs::write(
            &config_path,
            r#"
server:
  port: 8080
  host: localhost
"#,
        )
        .unwrap();

        let map = FileLoader::new(&config_path)
            .load(&LoadContext::default())
            .await
            .unwrap();
        assert_eq!(map["server"]["port"], 8080);
        assert_eq!(map["server"]["host"], "localhost");
    }

    #[tokio::test]
    async fn test_missing_optional_file_is_empty() {
        let map = FileLoader::new("/nonexistent/config.yaml")
            .load(&LoadContext::default())
            .await
            .unwrap();
        assert!(map.is_empty());
    }

    #[tokio::test]
    async fn test_missing_required_file_fails() {
        let result = FileLoader::new("/nonexistent/config.yaml")
            .required(true)
            .load(&LoadContext::default())
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_name_and_type() {
        let loader = FileLoader::new("config.yaml").with_priority(200);
        assert!(loader.name().contains("config.yaml"));
        assert_eq!(loader.priority(), 200);
        assert_eq!(loader.source_type(), SourceType::LocalFile);
    }
}
