//! Built-in metrics for aggregation passes.
//!
//! Provides OpenTelemetry metrics tracking:
//! - Pass attempts/success/failures
//! - Pass duration
//! - Loaded sources and loader failures
//! - Validation failures
//! - Configuration age
//!
//! # Examples
//!
//! ```rust,no_run
//! use tiered_config::prelude::*;
//! use tiered_config::metrics::AggregationMetrics;
//! use opentelemetry::global;
//!
//! # async fn example() -> Result<()> {
//! let metrics = AggregationMetrics::new(global::meter("my-app"));
//!
//! let config = ConfigAggregator::builder()
//!     .with_env("APP")
//!     .with_metrics(metrics)
//!     .build::<ConfigMap>()
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod aggregation_metrics;

pub use aggregation_metrics::AggregationMetrics;
