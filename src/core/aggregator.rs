//! The aggregation engine owning the validated configuration.

use crate::core::environment::{EnvironmentTier, resolve_environment};
use crate::core::namespace::{NamespaceFactory, create_factories};
use crate::core::options::AggregatorOptions;
use crate::core::orchestrator::{LoaderFailure, LoadingOrchestrator};
use crate::core::precedence::{ConfigurationSource, merge_sources};
use crate::core::validation::lookup;
use crate::error::{ConfigError, Result, ValidationError};
use crate::sources::{ConfigMap, LoadContext};
use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

#[cfg(feature = "metrics")]
use crate::metrics::AggregationMetrics;

/// Type alias for typed validator functions.
pub(crate) type Validator<T> =
    Arc<dyn Fn(&T) -> std::result::Result<(), ValidationError> + Send + Sync>;

/// Type alias for the process-variable snapshot provider.
pub(crate) type VariableProvider = Arc<dyn Fn() -> HashMap<String, String> + Send + Sync>;

/// Lifecycle of an aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorState {
    /// No pass has run yet.
    Uninitialized,
    /// The first pass (or one after a failure) is in flight.
    Initializing,
    /// The last pass succeeded; configuration is readable.
    Ready,
    /// The last pass failed; configuration is not readable.
    Failed,
}

/// Puts the state back where it was if a pass future is dropped mid-flight.
struct StateRestore<'a> {
    state: &'a RwLock<AggregatorState>,
    previous: Option<AggregatorState>,
}

impl<'a> StateRestore<'a> {
    /// Enter a pass. A refresh over a live snapshot stays `Ready`.
    fn begin(state: &'a RwLock<AggregatorState>, serving: bool) -> Self {
        let mut current = state.write();
        let previous = *current;
        if !serving {
            *current = AggregatorState::Initializing;
        }
        Self {
            state,
            previous: Some(previous),
        }
    }

    fn disarm(&mut self) {
        self.previous = None;
    }
}

impl Drop for StateRestore<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            tracing::debug!(?previous, "Aggregation pass dropped before completion");
            *self.state.write() = previous;
        }
    }
}

/// Everything produced by one successful pass.
struct Snapshot<T> {
    values: Arc<ConfigMap>,
    typed: Arc<T>,
    environment: EnvironmentTier,
    sources: Vec<ConfigurationSource>,
    failures: Vec<LoaderFailure>,
    factories: Vec<NamespaceFactory>,
    loaded_at: DateTime<Utc>,
}

/// Aggregated, validated configuration with read-only access.
///
/// Readers get lock-free access to an immutable snapshot. Passes
/// ([`initialize`](Self::initialize), [`refresh`](Self::refresh)) are
/// serialized; readers keep seeing the previous snapshot until a pass
/// completes and the new one is swapped in atomically.
///
/// # Examples
///
/// ```rust,no_run
/// use tiered_config::prelude::*;
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize)]
/// struct AppConfig {
///     #[serde(rename = "PORT")]
///     port: u16,
/// }
///
/// # async fn example() -> Result<()> {
/// let config = ConfigAggregator::builder()
///     .with_env("APP")
///     .with_schema(Schema::new().field(FieldSpec::new("PORT", FieldKind::Integer).required()))
///     .build::<AppConfig>()
///     .await?;
///
/// println!("Port: {}", config.get_all()?.port);
/// # Ok(())
/// # }
/// ```
pub struct ConfigAggregator<T = ConfigMap> {
    current: Arc<ArcSwapOption<Snapshot<T>>>,
    state: Arc<RwLock<AggregatorState>>,
    orchestrator: Arc<LoadingOrchestrator>,
    options: Arc<AggregatorOptions>,
    validator: Option<Validator<T>>,
    variables: VariableProvider,
    pass_guard: Arc<tokio::sync::Mutex<()>>,
    #[cfg(feature = "metrics")]
    metrics: Option<AggregationMetrics>,
}

impl<T> std::fmt::Debug for ConfigAggregator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigAggregator")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<T> ConfigAggregator<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    pub(crate) fn from_parts(
        orchestrator: LoadingOrchestrator,
        options: AggregatorOptions,
        validator: Option<Validator<T>>,
        variables: VariableProvider,
    ) -> Self {
        Self {
            current: Arc::new(ArcSwapOption::empty()),
            state: Arc::new(RwLock::new(AggregatorState::Uninitialized)),
            orchestrator: Arc::new(orchestrator),
            options: Arc::new(options),
            validator,
            variables,
            pass_guard: Arc::new(tokio::sync::Mutex::new(())),
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    #[cfg(feature = "metrics")]
    pub(crate) fn with_metrics(mut self, metrics: Option<AggregationMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Run the initial aggregation pass.
    ///
    /// # Errors
    ///
    /// Returns the loader, source, validation or deserialization error that
    /// aborted the pass, or a cancellation error when the configured timeout
    /// elapses.
    pub async fn initialize(&self) -> Result<()> {
        self.run_pass(std::future::pending::<()>()).await
    }

    /// Run a pass that is abandoned as soon as `cancel` completes.
    ///
    /// In-flight remote fetches are dropped and the call fails with
    /// [`ConfigError::InitializationCancelled`].
    pub async fn initialize_with_cancel<F>(&self, cancel: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.run_pass(cancel).await
    }

    /// Discard the current snapshot and aggregate again.
    ///
    /// Readers keep the previous snapshot until the new one is ready. If the
    /// pass fails the previous snapshot is dropped and the aggregator is
    /// [`AggregatorState::Failed`].
    pub async fn refresh(&self) -> Result<()> {
        tracing::info!("Refreshing configuration");
        self.run_pass(std::future::pending::<()>()).await
    }

    async fn run_pass<F>(&self, cancel: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let _guard = self.pass_guard.lock().await;
        let mut restore = StateRestore::begin(&self.state, self.current.load().is_some());

        #[cfg(feature = "metrics")]
        let timer = self.metrics.as_ref().map(|metrics| {
            if self.current.load().is_some() {
                metrics.update_config_age();
            }
            metrics.start_pass()
        });

        let pass = self.aggregate();
        let result = match self.options.timeout {
            Some(limit) => tokio::select! {
                outcome = tokio::time::timeout(limit, pass) => {
                    outcome.unwrap_or(Err(ConfigError::InitializationTimedOut(limit)))
                }
                _ = cancel => Err(ConfigError::InitializationCancelled),
            },
            None => tokio::select! {
                outcome = pass => outcome,
                _ = cancel => Err(ConfigError::InitializationCancelled),
            },
        };

        restore.disarm();
        match result {
            Ok(snapshot) => {
                tracing::info!(
                    environment = %snapshot.environment,
                    sources = snapshot.sources.len(),
                    keys = snapshot.values.len(),
                    "Configuration ready"
                );
                #[cfg(feature = "metrics")]
                if let (Some(metrics), Some(timer)) = (&self.metrics, timer) {
                    metrics.record_pass_success(timer, snapshot.sources.len());
                    metrics.update_config_age();
                }
                self.current.store(Some(Arc::new(snapshot)));
                *self.state.write() = AggregatorState::Ready;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "Configuration aggregation failed");
                #[cfg(feature = "metrics")]
                if let (Some(metrics), Some(timer)) = (&self.metrics, timer) {
                    if let ConfigError::LoaderFailure { loader, .. } = &err {
                        metrics.record_loader_failure(loader);
                    }
                    if err.validation().is_some() {
                        metrics.record_validation_failure();
                    }
                    metrics.record_pass_failure(timer);
                }
                self.current.store(None);
                *self.state.write() = AggregatorState::Failed;
                Err(err)
            }
        }
    }

    async fn aggregate(&self) -> Result<Snapshot<T>> {
        let options = &self.options;
        let variables = (self.variables)();
        let environment = resolve_environment(
            variables.get(&options.environment_var).map(String::as_str),
            variables
                .get(&options.fallback_environment_var)
                .map(String::as_str),
        );
        tracing::debug!(%environment, "Resolved environment tier");

        let ctx = LoadContext::new(environment, variables);
        let outcome = self.orchestrator.load_all(&ctx).await?;

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            for failure in &outcome.failures {
                metrics.record_loader_failure(&failure.loader);
            }
        }

        let merged = match options.precedence {
            Some(policy) => merge_sources(&outcome.sources, policy)?,
            None => outcome.merged,
        };

        let values = if options.validate {
            options.schema.validate(&merged)?
        } else {
            merged
        };

        let typed: T = serde_json::from_value(Value::Object(values.clone()))
            .map_err(|e| ConfigError::DeserializationError(e.to_string()))?;

        if let Some(validator) = &self.validator {
            validator(&typed)?;
        }

        let factories = create_factories(&values, &options.namespaces);

        Ok(Snapshot {
            values: Arc::new(values),
            typed: Arc::new(typed),
            environment,
            sources: outcome.sources,
            failures: outcome.failures,
            factories,
            loaded_at: Utc::now(),
        })
    }
}

impl<T> ConfigAggregator<T> {
    fn snapshot(&self) -> Result<Arc<Snapshot<T>>> {
        self.current.load_full().ok_or(ConfigError::NotInitialized)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> AggregatorState {
        *self.state.read()
    }

    /// Whether configuration can be read.
    ///
    /// Stays `true` while a refresh runs over a live snapshot.
    pub fn is_initialized(&self) -> bool {
        self.current.load().is_some()
    }

    /// Read one value. Dotted keys address nested objects.
    ///
    /// Returns `Ok(None)` when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotInitialized`] before a successful pass.
    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        let snapshot = self.snapshot()?;
        Ok(lookup(&snapshot.values, key).cloned())
    }

    /// Read one value and deserialize it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotInitialized`] before a successful pass, or a
    /// deserialization error if the value does not fit `V`.
    pub fn get_as<V: DeserializeOwned>(&self, key: &str) -> Result<Option<V>> {
        self.get(key)?
            .map(|value| {
                serde_json::from_value(value).map_err(|e| {
                    ConfigError::DeserializationError(format!("Key '{}': {}", key, e))
                })
            })
            .transpose()
    }

    /// The whole typed configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotInitialized`] before a successful pass.
    pub fn get_all(&self) -> Result<Arc<T>> {
        Ok(Arc::clone(&self.snapshot()?.typed))
    }

    /// The validated key/value data behind the typed configuration.
    pub fn raw(&self) -> Result<Arc<ConfigMap>> {
        Ok(Arc::clone(&self.snapshot()?.values))
    }

    /// The environment tier the current snapshot was built for.
    pub fn environment(&self) -> Result<EnvironmentTier> {
        Ok(self.snapshot()?.environment)
    }

    /// When the current snapshot was built.
    pub fn loaded_at(&self) -> Result<DateTime<Utc>> {
        Ok(self.snapshot()?.loaded_at)
    }

    /// The labeled sources that fed the current snapshot.
    pub fn sources(&self) -> Result<Vec<ConfigurationSource>> {
        Ok(self.snapshot()?.sources.clone())
    }

    /// Loader failures tolerated while building the current snapshot.
    pub fn failures(&self) -> Result<Vec<LoaderFailure>> {
        Ok(self.snapshot()?.failures.clone())
    }

    /// Factories for every configured namespace that is valid and non-empty.
    pub fn namespace_factories(&self) -> Result<Vec<NamespaceFactory>> {
        Ok(self.snapshot()?.factories.clone())
    }

    /// The factory for one namespace, if it was produced.
    pub fn namespace_factory(&self, namespace: &str) -> Result<Option<NamespaceFactory>> {
        Ok(self
            .snapshot()?
            .factories
            .iter()
            .find(|f| f.namespace() == namespace)
            .cloned())
    }

    /// Names of the registered loaders, in run order.
    pub fn loader_names(&self) -> Vec<String> {
        self.orchestrator.loader_names()
    }
}

impl<T> Clone for ConfigAggregator<T> {
    fn clone(&self) -> Self {
        Self {
            current: Arc::clone(&self.current),
            state: Arc::clone(&self.state),
            orchestrator: Arc::clone(&self.orchestrator),
            options: Arc::clone(&self.options),
            validator: self.validator.clone(),
            variables: Arc::clone(&self.variables),
            pass_guard: Arc::clone(&self.pass_guard),
            #[cfg(feature = "metrics")]
            metrics: self.metrics.clone(),
        }
    }
}
