//! Aggregation metrics using OpenTelemetry.

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use std::sync::Arc;
use std::time::Instant;

/// Metrics collector for aggregation passes.
///
/// Tracks pass attempts, success/failure rates, latencies, loader failures and
/// the number of sources that made it into the last successful pass.
///
/// # Examples
///
/// ```rust,no_run
/// use tiered_config::metrics::AggregationMetrics;
/// use opentelemetry::global;
///
/// let meter = global::meter("tiered-config");
/// let metrics = AggregationMetrics::new(meter);
///
/// let timer = metrics.start_pass();
/// // ... aggregate ...
/// metrics.record_pass_success(timer, 3);
/// ```
#[derive(Clone)]
pub struct AggregationMetrics {
    pass_attempts: Counter<u64>,
    pass_success: Counter<u64>,
    pass_failures: Counter<u64>,
    pass_duration: Histogram<f64>,
    loaded_sources: Gauge<i64>,
    loader_failures: Counter<u64>,
    validation_failures: Counter<u64>,
    config_age_seconds: Gauge<i64>,
    last_success: Arc<parking_lot::Mutex<Instant>>,
}

impl AggregationMetrics {
    /// Create a new metrics collector with the provided meter.
    pub fn new(meter: Meter) -> Self {
        let pass_attempts = meter
            .u64_counter("tiered_config.pass.attempts")
            .with_description("Total number of aggregation passes started")
            .build();

        let pass_success = meter
            .u64_counter("tiered_config.pass.success")
            .with_description("Number of successful aggregation passes")
            .build();

        let pass_failures = meter
            .u64_counter("tiered_config.pass.failures")
            .with_description("Number of failed aggregation passes")
            .build();

        let pass_duration = meter
            .f64_histogram("tiered_config.pass.duration")
            .with_description("Duration of aggregation passes in seconds")
            .with_unit("s")
            .build();

        let loaded_sources = meter
            .i64_gauge("tiered_config.sources.loaded")
            .with_description("Sources merged by the last successful pass")
            .build();

        let loader_failures = meter
            .u64_counter("tiered_config.loader.failures")
            .with_description("Loader failures tolerated or propagated")
            .build();

        let validation_failures = meter
            .u64_counter("tiered_config.validation.failures")
            .with_description("Number of schema validation failures")
            .build();

        let config_age_seconds = meter
            .i64_gauge("tiered_config.age")
            .with_description("Time since the last successful pass in seconds")
            .with_unit("s")
            .build();

        Self {
            pass_attempts,
            pass_success,
            pass_failures,
            pass_duration,
            loaded_sources,
            loader_failures,
            validation_failures,
            config_age_seconds,
            last_success: Arc::new(parking_lot::Mutex::new(Instant::now())),
        }
    }

    /// Start a pass timer.
    pub fn start_pass(&self) -> Instant {
        self.pass_attempts.add(1, &[]);
        Instant::now()
    }

    /// Record a successful pass.
    pub fn record_pass_success(&self, start: Instant, sources: usize) {
        self.pass_success.add(1, &[]);
        self.pass_duration.record(start.elapsed().as_secs_f64(), &[]);
        self.loaded_sources
            .record(i64::try_from(sources).unwrap_or(i64::MAX), &[]);
        *self.last_success.lock() = Instant::now();
    }

    /// Record a failed pass.
    pub fn record_pass_failure(&self, start: Instant) {
        self.pass_failures.add(1, &[]);
        self.pass_duration.record(start.elapsed().as_secs_f64(), &[]);
    }

    /// Record a failing loader.
    pub fn record_loader_failure(&self, loader: &str) {
        self.loader_failures
            .add(1, &[KeyValue::new("loader", loader.to_string())]);
    }

    /// Record a validation failure.
    pub fn record_validation_failure(&self) {
        self.validation_failures.add(1, &[]);
    }

    /// Update the configuration age metric.
    pub fn update_config_age(&self) {
        let age_secs = self.last_success.lock().elapsed().as_secs();
        self.config_age_seconds
            .record(i64::try_from(age_secs).unwrap_or(i64::MAX), &[]);
    }
}
