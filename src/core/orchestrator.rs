//! Loading orchestrator that runs loaders in order and merges their output.

use crate::core::options::ErrorPolicy;
use crate::core::precedence::{ConfigurationSource, SourceType, shallow_merge};
use crate::error::{ConfigError, Result};
use crate::sources::{ConfigMap, LoadContext, OverrideFile, SourceLoader};
use serde_json::Value;
use std::sync::Arc;

/// Base priority given to the local override file.
pub const OVERRIDE_PRIORITY: f64 = 1_000.0;

/// A loader failure that was recorded instead of aborting the pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderFailure {
    /// Name of the failing loader.
    pub loader: String,
    /// Rendered error.
    pub message: String,
}

/// Result of one orchestrated load.
#[derive(Debug, Clone, Default)]
pub struct LoadOutcome {
    /// All loader outputs, shallow-merged in loader order.
    pub merged: ConfigMap,
    /// One labeled source per successful loader, in loader order.
    pub sources: Vec<ConfigurationSource>,
    /// Loaders that were skipped as unavailable.
    pub skipped: Vec<String>,
    /// Failures tolerated under the error policy.
    pub failures: Vec<LoaderFailure>,
}

/// Runs loaders sequentially in precedence order.
///
/// Later loaders win on top-level key collisions. Unavailable loaders are
/// skipped; in the local tier remote loaders are skipped without probing.
pub struct LoadingOrchestrator {
    loaders: Vec<Arc<dyn SourceLoader>>,
    error_policy: ErrorPolicy,
    override_file: Option<OverrideFile>,
    profile_marker_var: String,
}

impl LoadingOrchestrator {
    /// Create an orchestrator with no loaders.
    pub fn new(error_policy: ErrorPolicy) -> Self {
        Self {
            loaders: Vec::new(),
            error_policy,
            override_file: None,
            profile_marker_var: crate::sources::DEFAULT_PROFILE_MARKER.to_string(),
        }
    }

    /// Append a loader. Loaders run in insertion order.
    pub fn add_loader(&mut self, loader: Arc<dyn SourceLoader>) {
        self.loaders.push(loader);
    }

    /// Enable the local developer override file.
    pub fn with_override_file(
        mut self,
        file: OverrideFile,
        profile_marker_var: impl Into<String>,
    ) -> Self {
        self.override_file = Some(file);
        self.profile_marker_var = profile_marker_var.into();
        self
    }

    /// Names of the registered loaders, in run order.
    pub fn loader_names(&self) -> Vec<String> {
        self.loaders.iter().map(|l| l.name()).collect()
    }

    /// Decide whether a failure aborts the pass.
    fn handle_failure(&self, error: ConfigError, failures: &mut Vec<LoaderFailure>) -> Result<()> {
        if error.is_fatal() || !self.error_policy.tolerates_failures() {
            tracing::warn!(error = %error, "Aborting configuration load");
            return Err(error);
        }

        let loader = match &error {
            ConfigError::LoaderFailure { loader, .. } => loader.clone(),
            _ => String::new(),
        };
        tracing::warn!(
            loader = %loader,
            error = %error,
            "Loader failed, continuing with remaining sources"
        );
        failures.push(LoaderFailure {
            loader,
            message: error.to_string(),
        });
        Ok(())
    }

    /// Run every loader and merge the results.
    ///
    /// # Errors
    ///
    /// Returns the wrapped [`ConfigError::LoaderFailure`] of the first failing
    /// loader unless the error policy tolerates it. Fatal errors such as
    /// [`ConfigError::MissingEnvironmentMapping`] always propagate.
    pub async fn load_all(&self, ctx: &LoadContext) -> Result<LoadOutcome> {
        let mut outcome = LoadOutcome::default();

        for loader in &self.loaders {
            let name = loader.name();

            if ctx.environment.is_local() && loader.source_type().is_remote() {
                tracing::debug!(loader = %name, "Skipping remote loader in local tier");
                outcome.skipped.push(name);
                continue;
            }

            if !loader.is_available(ctx).await {
                tracing::debug!(loader = %name, "Loader unavailable, skipping");
                outcome.skipped.push(name);
                continue;
            }

            match loader.load(ctx).await {
                Ok(values) => {
                    tracing::debug!(
                        loader = %name,
                        keys = values.len(),
                        "Loaded configuration source"
                    );
                    outcome.sources.push(ConfigurationSource::new(
                        name,
                        loader.source_type(),
                        f64::from(loader.priority()),
                        Value::Object(values.clone()),
                    ));
                    shallow_merge(&mut outcome.merged, values);
                }
                Err(err) => {
                    let wrapped = ConfigError::loader_failure(name, err);
                    self.handle_failure(wrapped, &mut outcome.failures)?;
                }
            }
        }

        self.apply_override(ctx, &mut outcome)?;
        Ok(outcome)
    }

    fn apply_override(&self, ctx: &LoadContext, outcome: &mut LoadOutcome) -> Result<()> {
        let Some(file) = &self.override_file else {
            return Ok(());
        };
        if !ctx.environment.is_local()
            || ctx.var(&self.profile_marker_var).is_none()
            || !file.exists()
        {
            return Ok(());
        }

        match file.parse() {
            Ok(values) => {
                tracing::info!(
                    path = %file.path().display(),
                    keys = values.len(),
                    "Applying local override file"
                );
                outcome.sources.push(ConfigurationSource::new(
                    file.name(),
                    SourceType::LocalFile,
                    OVERRIDE_PRIORITY,
                    Value::Object(values.clone()),
                ));
                shallow_merge(&mut outcome.merged, values);
                Ok(())
            }
            Err(err) => {
                let wrapped = ConfigError::loader_failure(file.name(), err);
                self.handle_failure(wrapped, &mut outcome.failures)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EnvironmentTier;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct MockLoader {
        name: String,
        source_type: SourceType,
        available: bool,
        values: std::result::Result<ConfigMap, String>,
        loads: AtomicUsize,
    }

    impl MockLoader {
        fn new(name: &str, source_type: SourceType, values: serde_json::Value) -> Self {
            Self {
                name: name.to_string(),
                source_type,
                available: true,
                values: Ok(values.as_object().cloned().unwrap()),
                loads: AtomicUsize::new(0),
            }
        }

        fn failing(name: &str) -> Self {
            Self {
                name: name.to_string(),
                source_type: SourceType::Environment,
                available: true,
                values: Err("connection reset".to_string()),
                loads: AtomicUsize::new(0),
            }
        }

        fn unavailable(mut self) -> Self {
            self.available = false;
            self
        }
    }

    #[async_trait]
    impl SourceLoader for MockLoader {
        async fn load(&self, _ctx: &LoadContext) -> Result<ConfigMap> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.values.clone().map_err(ConfigError::BackendError)
        }

        async fn is_available(&self, _ctx: &LoadContext) -> bool {
            self.available
        }

        fn name(&self) -> String {
            self.name.clone()
        }

        fn source_type(&self) -> SourceType {
            self.source_type
        }
    }

    fn ctx(tier: EnvironmentTier) -> LoadContext {
        LoadContext::new(tier, HashMap::new())
    }

    #[tokio::test]
    async fn test_later_loader_wins() {
        let mut orchestrator = LoadingOrchestrator::new(ErrorPolicy::fail_fast());
        orchestrator.add_loader(Arc::new(MockLoader::new(
            "env",
            SourceType::Environment,
            json!({"a": "env", "b": "env"}),
        )));
        orchestrator.add_loader(Arc::new(MockLoader::new(
            "secrets",
            SourceType::SecretsStore,
            json!({"a": "secrets"}),
        )));

        let outcome = orchestrator.load_all(&ctx(EnvironmentTier::Production)).await.unwrap();
        assert_eq!(serde_json::Value::Object(outcome.merged), json!({"a": "secrets", "b": "env"}));
        assert_eq!(outcome.sources.len(), 2);
        assert_eq!(outcome.sources[1].source_type, SourceType::SecretsStore);
    }

    #[tokio::test]
    async fn test_unavailable_loader_never_loaded() {
        let skipped = Arc::new(
            MockLoader::new("params", SourceType::ParameterStore, json!({"a": 1})).unavailable(),
        );
        let mut orchestrator = LoadingOrchestrator::new(ErrorPolicy::fail_fast());
        orchestrator.add_loader(Arc::new(MockLoader::new(
            "env",
            SourceType::Environment,
            json!({"b": 2}),
        )));
        orchestrator.add_loader(skipped.clone());

        let outcome = orchestrator.load_all(&ctx(EnvironmentTier::Test)).await.unwrap();
        assert_eq!(skipped.loads.load(Ordering::SeqCst), 0);
        assert_eq!(outcome.skipped, vec!["params".to_string()]);
        assert_eq!(serde_json::Value::Object(outcome.merged), json!({"b": 2}));
    }

    #[tokio::test]
    async fn test_remote_loaders_skipped_in_local_tier() {
        let remote = Arc::new(MockLoader::new(
            "secrets",
            SourceType::SecretsStore,
            json!({"a": 1}),
        ));
        let mut orchestrator = LoadingOrchestrator::new(ErrorPolicy::fail_fast());
        orchestrator.add_loader(remote.clone());

        let outcome = orchestrator.load_all(&ctx(EnvironmentTier::Local)).await.unwrap();
        assert_eq!(remote.loads.load(Ordering::SeqCst), 0);
        assert!(outcome.merged.is_empty());
    }

    #[tokio::test]
    async fn test_failure_aborts_under_fail_fast() {
        let mut orchestrator = LoadingOrchestrator::new(ErrorPolicy::fail_fast());
        orchestrator.add_loader(Arc::new(MockLoader::failing("broken")));
        orchestrator.add_loader(Arc::new(MockLoader::new(
            "env",
            SourceType::Environment,
            json!({"a": 1}),
        )));

        let err = orchestrator.load_all(&ctx(EnvironmentTier::Test)).await.unwrap_err();
        assert!(matches!(err, ConfigError::LoaderFailure { ref loader, .. } if loader == "broken"));
    }

    #[tokio::test]
    async fn test_failure_recorded_under_fallback() {
        let mut orchestrator = LoadingOrchestrator::new(ErrorPolicy::fallback());
        orchestrator.add_loader(Arc::new(MockLoader::failing("broken")));
        orchestrator.add_loader(Arc::new(MockLoader::new(
            "env",
            SourceType::Environment,
            json!({"a": 1}),
        )));

        let outcome = orchestrator.load_all(&ctx(EnvironmentTier::Test)).await.unwrap();
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].loader, "broken");
        assert_eq!(outcome.merged["a"], 1);
    }

    #[tokio::test]
    async fn test_no_silent_swallow_when_both_flags_off() {
        let policy = ErrorPolicy {
            fail_on_error: false,
            fallback_to_local: false,
        };
        let mut orchestrator = LoadingOrchestrator::new(policy);
        orchestrator.add_loader(Arc::new(MockLoader::failing("broken")));
        assert!(orchestrator.load_all(&ctx(EnvironmentTier::Test)).await.is_err());
    }

    #[tokio::test]
    async fn test_override_file_applies_in_local_tier_with_profile() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".env.local");
        fs::write(&path, "A=override\nC=new\n").unwrap();

        let mut orchestrator = LoadingOrchestrator::new(ErrorPolicy::fail_fast())
            .with_override_file(OverrideFile::new(&path), "AWS_PROFILE");
        orchestrator.add_loader(Arc::new(MockLoader::new(
            "env",
            SourceType::Environment,
            json!({"A": "env", "B": "env"}),
        )));

        let mut variables = HashMap::new();
        variables.insert("AWS_PROFILE".to_string(), "dev".to_string());
        let local = LoadContext::new(EnvironmentTier::Local, variables.clone());

        let outcome = orchestrator.load_all(&local).await.unwrap();
        assert_eq!(
            serde_json::Value::Object(outcome.merged),
            json!({"A": "override", "B": "env", "C": "new"})
        );
        assert_eq!(outcome.sources.last().unwrap().source_type, SourceType::LocalFile);

        // No profile marker: override ignored.
        let outcome = orchestrator.load_all(&ctx(EnvironmentTier::Local)).await.unwrap();
        assert_eq!(outcome.merged["A"], "env");

        // Not the local tier: override ignored.
        let staging = LoadContext::new(EnvironmentTier::Staging, variables);
        let outcome = orchestrator.load_all(&staging).await.unwrap();
        assert_eq!(outcome.merged["A"], "env");
    }

    #[test]
    fn test_loader_names() {
        let mut orchestrator = LoadingOrchestrator::new(ErrorPolicy::default());
        orchestrator.add_loader(Arc::new(MockLoader::new(
            "one",
            SourceType::Environment,
            json!({}),
        )));
        orchestrator.add_loader(Arc::new(MockLoader::new("two", SourceType::LocalFile, json!({}))));
        assert_eq!(orchestrator.loader_names(), vec!["one", "two"]);
    }
}
