//! Error types for tiered-config.

use std::fmt;
use std::time::Duration;

/// Result type alias for tiered-config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while aggregating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A loader's `load` call failed. Carries the loader name and the cause.
    #[error("Loader '{loader}' failed: {source}")]
    LoaderFailure {
        /// Name of the loader that failed
        loader: String,
        /// The underlying failure
        #[source]
        source: Box<ConfigError>,
    },

    /// One or more configuration sources failed their structural checks.
    #[error("Invalid configuration sources: {}", .0.join("; "))]
    InvalidSources(Vec<String>),

    /// Merged configuration failed schema validation.
    #[error("Configuration validation failed: {0}")]
    ValidationError(ValidationError),

    /// The active environment tier has no configured path segment.
    #[error("No path mapping configured for environment '{environment}'")]
    MissingEnvironmentMapping {
        /// The tier that could not be mapped
        environment: String,
    },

    /// The initialization pass was cancelled before it completed.
    #[error("Configuration initialization cancelled")]
    InitializationCancelled,

    /// The initialization pass did not complete within its deadline.
    #[error("Configuration initialization timed out after {0:?}")]
    InitializationTimedOut(Duration),

    /// Configuration was read before a successful aggregation pass.
    #[error("Configuration has not been initialized")]
    NotInitialized,

    /// A remote backend reported a failure.
    #[error("Backend error: {0}")]
    BackendError(String),

    /// Failed to load configuration from a source.
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    /// Failed to deserialize configuration.
    #[error("Failed to deserialize configuration: {0}")]
    DeserializationError(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse configuration data.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Generic error for other cases.
    #[error("Configuration error: {0}")]
    Other(String),
}

impl ConfigError {
    /// Wrap an error with the name of the loader that produced it.
    pub fn loader_failure(loader: impl Into<String>, source: ConfigError) -> Self {
        Self::LoaderFailure {
            loader: loader.into(),
            source: Box::new(source),
        }
    }

    /// Whether this error must abort the pass regardless of the error policy.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::MissingEnvironmentMapping { .. } | Self::InvalidSources(_) => true,
            Self::LoaderFailure { source, .. } => source.is_fatal(),
            _ => false,
        }
    }

    /// The validation failure carried by this error, if any.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            Self::ValidationError(err) => Some(err),
            _ => None,
        }
    }
}

/// Validation error for configuration validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Custom validation error with a message.
    Custom(String),

    /// A specific field has an invalid value.
    InvalidField {
        /// The field name/path
        field: String,
        /// The reason why it's invalid
        reason: String,
    },

    /// Multiple validation errors occurred.
    Multiple(Vec<ValidationError>),
}

impl ValidationError {
    /// Create a custom validation error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Create an invalid field error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Collapse a list of violations into a single error.
    ///
    /// Returns `None` when the list is empty.
    pub fn from_violations(mut errors: Vec<ValidationError>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Multiple(errors)),
        }
    }

    /// Every field path named by this error, in reporting order.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Self::Custom(_) => Vec::new(),
            Self::InvalidField { field, .. } => vec![field.as_str()],
            Self::Multiple(errors) => errors.iter().flat_map(|e| e.fields()).collect(),
        }
    }

    /// Number of individual violations.
    pub fn len(&self) -> usize {
        match self {
            Self::Multiple(errors) => errors.iter().map(ValidationError::len).sum(),
            _ => 1,
        }
    }

    /// Always false; a validation error carries at least one violation.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(msg) => write!(f, "{}", msg),
            Self::InvalidField { field, reason } => {
                write!(f, "Field '{}' is invalid: {}", field, reason)
            }
            Self::Multiple(errors) => {
                writeln!(f, "Multiple validation errors:")?;
                for (i, err) in errors.iter().enumerate() {
                    writeln!(f, "  {}. {}", i + 1, err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for ConfigError {
    fn from(err: ValidationError) -> Self {
        ConfigError::ValidationError(err)
    }
}
