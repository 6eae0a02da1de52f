//! Builder for constructing ConfigAggregator instances.

use crate::core::aggregator::{ConfigAggregator, Validator, VariableProvider};
use crate::core::environment::EnvironmentPaths;
use crate::core::options::{AggregatorOptions, ErrorPolicy};
use crate::core::orchestrator::LoadingOrchestrator;
use crate::core::precedence::PrecedencePolicy;
use crate::core::validation::Schema;
use crate::error::{Result, ValidationError};
use crate::sources::{
    ConfigMap, EnvLoader, FileLoader, OverrideFile, ParameterBackend, ParameterStoreLoader,
    SecretsBackend, SecretsStoreLoader, SourceLoader, process_variables,
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "metrics")]
use crate::metrics::AggregationMetrics;

/// Type alias for any-based validator functions used during building.
type AnyValidator =
    Arc<dyn Fn(&dyn std::any::Any) -> std::result::Result<(), ValidationError> + Send + Sync>;

/// Builder for constructing a `ConfigAggregator`.
///
/// Loaders run in the order they are added; later loaders win on key
/// collisions unless a [`PrecedencePolicy`] is set.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use tiered_config::prelude::*;
/// use tiered_config::sources::InMemorySecrets;
///
/// # async fn example() -> Result<()> {
/// let secrets = InMemorySecrets::new().with_secret("/myapp/prod", r#"{"DB_PASSWORD":"x"}"#);
///
/// let config = ConfigAggregator::builder()
///     .with_file("config/default.yaml")
///     .with_secrets_store(Arc::new(secrets), "/myapp")
///     .with_env("APP")
///     .with_precedence(PrecedencePolicy::AwsFirst)
///     .fallback_to_local()
///     .build::<ConfigMap>()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct ConfigAggregatorBuilder {
    loaders: Vec<Arc<dyn SourceLoader>>,
    options: AggregatorOptions,
    paths: EnvironmentPaths,
    variables: Option<HashMap<String, String>>,
    validator: Option<AnyValidator>,
    #[cfg(feature = "metrics")]
    metrics: Option<AggregationMetrics>,
}

impl ConfigAggregatorBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            loaders: Vec::new(),
            options: AggregatorOptions::default(),
            paths: EnvironmentPaths::default(),
            variables: None,
            validator: None,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Add a custom loader.
    pub fn with_loader<L: SourceLoader + 'static>(mut self, loader: L) -> Self {
        self.loaders.push(Arc::new(loader));
        self
    }

    /// Add a loader that is shared with other owners.
    pub fn with_shared_loader(mut self, loader: Arc<dyn SourceLoader>) -> Self {
        self.loaders.push(loader);
        self
    }

    /// Add process variables whose names start with `prefix_`.
    ///
    /// An empty prefix loads every variable.
    pub fn with_env(self, prefix: &str) -> Self {
        self.with_loader(EnvLoader::with_prefix(prefix))
    }

    /// Add an optional local file. Supported formats: YAML, TOML, JSON.
    pub fn with_file(self, path: impl Into<PathBuf>) -> Self {
        self.with_loader(FileLoader::new(path))
    }

    /// Replace the tier-to-segment mapping used by remote loaders added after
    /// this call.
    pub fn with_environment_paths(mut self, paths: EnvironmentPaths) -> Self {
        self.paths = paths;
        self
    }

    /// Add a secret-store loader reading `<base_path>/<tier segment>`.
    pub fn with_secrets_store(
        self,
        backend: Arc<dyn SecretsBackend>,
        base_path: impl Into<String>,
    ) -> Self {
        let loader = SecretsStoreLoader::new(backend, base_path).with_paths(self.paths.clone());
        self.with_loader(loader)
    }

    /// Add a parameter-store loader reading below `<base_path>/<tier segment>`.
    pub fn with_parameter_store(
        self,
        backend: Arc<dyn ParameterBackend>,
        base_path: impl Into<String>,
    ) -> Self {
        let loader = ParameterStoreLoader::new(backend, base_path).with_paths(self.paths.clone());
        self.with_loader(loader)
    }

    /// Validate merged data against `schema`.
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.options.schema = schema;
        self.options.validate = true;
        self
    }

    /// Skip schema validation and use the merged data as-is.
    pub fn without_validation(mut self) -> Self {
        self.options.validate = false;
        self
    }

    /// Set the loader failure policy.
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.options.error_policy = policy;
        self
    }

    /// Abort the pass on the first loader failure.
    pub fn fail_on_error(self) -> Self {
        self.with_error_policy(ErrorPolicy::fail_fast())
    }

    /// Record loader failures and continue with the remaining loaders.
    pub fn fallback_to_local(self) -> Self {
        self.with_error_policy(ErrorPolicy::fallback())
    }

    /// Combine loader outputs through the precedence engine.
    pub fn with_precedence(mut self, policy: PrecedencePolicy) -> Self {
        self.options.precedence = Some(policy);
        self
    }

    /// Expose one namespace as a factory.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.options.namespaces.push(namespace.into());
        self
    }

    /// Expose several namespaces as factories.
    pub fn with_namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options
            .namespaces
            .extend(namespaces.into_iter().map(Into::into));
        self
    }

    /// Abandon a pass that takes longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Use custom variable names for tier resolution.
    pub fn with_environment_vars(
        mut self,
        primary: impl Into<String>,
        fallback: impl Into<String>,
    ) -> Self {
        self.options.environment_var = primary.into();
        self.options.fallback_environment_var = fallback.into();
        self
    }

    /// Use a different developer override file.
    pub fn with_override_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.override_file = Some(path.into());
        self
    }

    /// Never merge a developer override file.
    pub fn without_override_file(mut self) -> Self {
        self.options.override_file = None;
        self
    }

    /// Variable whose presence enables the override file.
    pub fn with_profile_marker(mut self, var: impl Into<String>) -> Self {
        self.options.profile_marker_var = var.into();
        self
    }

    /// Read variables from `variables` instead of the process environment.
    pub fn with_variables<I, K, V>(mut self, variables: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.variables = Some(
            variables
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Replace all options at once.
    pub fn with_options(mut self, options: AggregatorOptions) -> Self {
        self.options = options;
        self
    }

    /// Add a validation function that runs on the typed configuration after
    /// schema validation, on every pass.
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
    ///     .with_validation(|config: &AppConfig| {
    ///         if config.port < 1024 {
    ///             return Err(ValidationError::invalid_field("PORT", "must be >= 1024"));
    ///         }
    ///         Ok(())
    ///     })
    ///     .build::<AppConfig>()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_validation<F, T>(mut self, validator: F) -> Self
    where
        F: Fn(&T) -> std::result::Result<(), ValidationError> + Send + Sync + 'static,
        T: 'static,
    {
        self.validator = Some(Arc::new(move |config: &dyn std::any::Any| {
            let typed_config = config
                .downcast_ref::<T>()
                .ok_or_else(|| ValidationError::custom("Type mismatch in validator"))?;
            validator(typed_config)
        }));
        self
    }

    /// Record pass metrics.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, metrics: AggregationMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the aggregator without running a pass.
    pub fn build_uninitialized<T>(self) -> ConfigAggregator<T>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let mut orchestrator = LoadingOrchestrator::new(self.options.error_policy);
        for loader in self.loaders {
            orchestrator.add_loader(loader);
        }
        if let Some(path) = &self.options.override_file {
            orchestrator = orchestrator.with_override_file(
                OverrideFile::new(path),
                self.options.profile_marker_var.clone(),
            );
        }

        let validator: Option<Validator<T>> = self.validator.map(|v| {
            Arc::new(move |config: &T| v(config as &dyn std::any::Any)) as Validator<T>
        });

        let variables: VariableProvider = match self.variables {
            Some(fixed) => Arc::new(move || fixed.clone()),
            None => Arc::new(process_variables),
        };

        let aggregator =
            ConfigAggregator::from_parts(orchestrator, self.options, validator, variables);

        #[cfg(feature = "metrics")]
        let aggregator = aggregator.with_metrics(self.metrics);

        aggregator
    }

    /// Build the aggregator and run the initial pass.
    ///
    /// # Type Parameters
    ///
    /// * `T` - The configuration type (must implement `DeserializeOwned`)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A loader fails and the error policy does not tolerate it
    /// - Schema validation fails
    /// - Deserialization or the custom validator fails
    /// - The pass times out
    pub async fn build<T>(self) -> Result<ConfigAggregator<T>>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let aggregator = self.build_uninitialized::<T>();
        aggregator.initialize().await?;
        Ok(aggregator)
    }
}

impl Default for ConfigAggregatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigAggregator<ConfigMap> {
    /// Create a new builder for constructing an aggregator.
    pub fn builder() -> ConfigAggregatorBuilder {
        ConfigAggregatorBuilder::new()
    }
}
