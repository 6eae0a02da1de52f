//! # tiered-config
//!
//! Environment-aware configuration aggregation from layered sources.
//!
//! ## Overview
//!
//! `tiered-config` collects configuration from several sources and turns it
//! into one validated, read-only view:
//! - Process variables, local YAML/TOML/JSON files and a developer override file
//! - Remote secret stores and hierarchical parameter stores, selected per
//!   environment tier (local, development, test, staging, production)
//! - Deterministic precedence between source types (`aws-first`,
//!   `local-first`, `merge`)
//! - Schema validation with type coercion and defaults
//! - Namespace factories exposing per-component slices of the configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tiered_config::prelude::*;
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct AppConfig {
//!     #[serde(rename = "PORT")]
//!     port: u16,
//!     #[serde(rename = "DATABASE_URL")]
//!     database_url: String,
//! }
//!
//! # async fn example() -> tiered_config::error::Result<()> {
//! let config = ConfigAggregator::builder()
//!     .with_file("config/default.yaml")
//!     .with_env("APP")
//!     .with_schema(
//!         Schema::new()
//!             .field(FieldSpec::new("PORT", FieldKind::Integer).default_value(8080))
//!             .field(FieldSpec::new("DATABASE_URL", FieldKind::String).required()),
//!     )
//!     .build::<AppConfig>()
//!     .await?;
//!
//! // Lock-free reads of the current snapshot
//! let cfg = config.get_all()?;
//! println!("Server port: {}", cfg.port);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `secrets-aws`: AWS Secrets Manager backend
//! - `parameters-aws`: AWS Systems Manager Parameter Store backend
//! - `aws`: both AWS backends
//! - `metrics`: OpenTelemetry pass metrics
//!
//! ```toml
//! [dependencies]
//! tiered-config = { version = "0.1", features = ["aws"] }
//! ```

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod sources;

#[cfg(feature = "metrics")]
pub mod metrics;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{
        AggregatorState, ConfigAggregator, ConfigAggregatorBuilder, ConfigurationSource,
        EnvironmentPaths, EnvironmentTier, ErrorPolicy, FieldKind, FieldSpec, NamespaceFactory,
        PrecedencePolicy, Schema, SourceType,
    };
    pub use crate::error::{ConfigError, Result, ValidationError};
    pub use crate::sources::{ConfigMap, LoadContext, SourceLoader};
}
