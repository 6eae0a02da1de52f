//! Integration tests exercising remote stores, precedence, failures and namespaces.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tiered_config::prelude::*;
use tiered_config::sources::{
    InMemoryParameters, InMemorySecrets, ParameterBackend, ParameterPage, SecretsBackend,
};

struct FlakySecrets {
    failing: AtomicBool,
}

#[async_trait]
impl SecretsBackend for FlakySecrets {
    async fn get_secret_string(&self, _secret_id: &str) -> Result<Option<String>> {
        if self.failing.load(Ordering::SeqCst) {
            Err(ConfigError::BackendError("AccessDeniedException".to_string()))
        } else {
            Ok(Some(r#"{"DB_PASSWORD": "hunter2"}"#.to_string()))
        }
    }
}

struct ProbedLoader {
    available: bool,
    loads: AtomicUsize,
}

#[async_trait]
impl SourceLoader for ProbedLoader {
    async fn load(&self, _ctx: &LoadContext) -> Result<ConfigMap> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(json!({"PROBED": "yes"}).as_object().cloned().unwrap())
    }

    async fn is_available(&self, _ctx: &LoadContext) -> bool {
        self.available
    }

    fn name(&self) -> String {
        "probed".to_string()
    }

    fn source_type(&self) -> SourceType {
        SourceType::LocalFile
    }
}

struct SlowParameters;

#[async_trait]
impl ParameterBackend for SlowParameters {
    async fn get_parameters_by_path(
        &self,
        _path: &str,
        _next_token: Option<String>,
    ) -> Result<ParameterPage> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(ParameterPage::default())
    }
}

fn production() -> [(&'static str, &'static str); 2] {
    [("APP_ENV", "production"), ("APP_KEY", "local")]
}

#[tokio::test]
async fn test_remote_stores_per_tier() {
    let secrets = InMemorySecrets::new()
        .with_secret("/myapp/prod", r#"{"DB_PASSWORD": "prod-secret"}"#)
        .with_secret("/myapp/staging", r#"{"DB_PASSWORD": "staging-secret"}"#);
    let parameters = InMemoryParameters::new()
        .with_page_size(1)
        .with_parameter("/myapp/prod/database_host", "db.prod")
        .with_parameter("/myapp/prod/database_port", "5432");

    let config = ConfigAggregator::builder()
        .with_parameter_store(Arc::new(parameters), "/myapp")
        .with_secrets_store(Arc::new(secrets), "/myapp")
        .with_variables(production())
        .build::<ConfigMap>()
        .await
        .unwrap();

    assert_eq!(config.environment().unwrap(), EnvironmentTier::Production);
    assert_eq!(config.get("DB_PASSWORD").unwrap(), Some(json!("prod-secret")));
    assert_eq!(config.get("DATABASE_HOST").unwrap(), Some(json!("db.prod")));
    assert_eq!(config.get("DATABASE_PORT").unwrap(), Some(json!("5432")));

    let types: Vec<SourceType> = config.sources().unwrap().iter().map(|s| s.source_type).collect();
    assert_eq!(types, vec![SourceType::ParameterStore, SourceType::SecretsStore]);
}

#[tokio::test]
async fn test_local_tier_skips_remote_stores() {
    let secrets = InMemorySecrets::new().with_secret("/myapp/dev", r#"{"DB_PASSWORD": "x"}"#);

    let config = ConfigAggregator::builder()
        .with_secrets_store(Arc::new(secrets), "/myapp")
        .with_env("APP")
        .with_variables([("APP_ENV", "offline"), ("APP_KEY", "local")])
        .build::<ConfigMap>()
        .await
        .unwrap();

    assert_eq!(config.environment().unwrap(), EnvironmentTier::Local);
    assert_eq!(config.get("DB_PASSWORD").unwrap(), None);
    assert_eq!(config.get("KEY").unwrap(), Some(json!("local")));
}

#[tokio::test]
async fn test_precedence_policies_end_to_end() {
    let build = |policy: PrecedencePolicy| {
        let secrets = InMemorySecrets::new().with_secret("/myapp/prod", r#"{"KEY": "aws"}"#);
        ConfigAggregator::builder()
            .with_secrets_store(Arc::new(secrets), "/myapp")
            .with_env("APP")
            .with_variables(production())
            .with_precedence(policy)
            .build::<ConfigMap>()
    };

    let aws_first = build(PrecedencePolicy::AwsFirst).await.unwrap();
    assert_eq!(aws_first.get("KEY").unwrap(), Some(json!("aws")));

    let local_first = build(PrecedencePolicy::LocalFirst).await.unwrap();
    assert_eq!(local_first.get("KEY").unwrap(), Some(json!("local")));
}

#[tokio::test]
async fn test_unavailable_loader_is_never_loaded() {
    let unavailable = Arc::new(ProbedLoader {
        available: false,
        loads: AtomicUsize::new(0),
    });

    let config = ConfigAggregator::builder()
        .with_shared_loader(unavailable.clone())
        .with_env("APP")
        .with_variables([("APP_KEY", "local")])
        .build::<ConfigMap>()
        .await
        .unwrap();

    assert_eq!(unavailable.loads.load(Ordering::SeqCst), 0);
    assert_eq!(config.get("PROBED").unwrap(), None);
    assert_eq!(config.get("KEY").unwrap(), Some(json!("local")));
}

#[tokio::test]
async fn test_tier_falls_back_to_secondary_variable() {
    let secondary = ConfigAggregator::builder()
        .with_variables([("APP_ENV", "qa-cluster"), ("DEPLOY_ENV", "staging")])
        .build::<ConfigMap>()
        .await
        .unwrap();
    assert_eq!(secondary.environment().unwrap(), EnvironmentTier::Staging);

    let neither = ConfigAggregator::builder()
        .with_variables([("APP_ENV", "qa-cluster"), ("DEPLOY_ENV", "nowhere")])
        .build::<ConfigMap>()
        .await
        .unwrap();
    assert_eq!(neither.environment().unwrap(), EnvironmentTier::Local);

    let custom = ConfigAggregator::builder()
        .with_environment_vars("STAGE", "TIER")
        .with_variables([("STAGE", "dev")])
        .build::<ConfigMap>()
        .await
        .unwrap();
    assert_eq!(custom.environment().unwrap(), EnvironmentTier::Development);
}

#[tokio::test]
async fn test_loader_failure_aborts_by_default() {
    let secrets = Arc::new(FlakySecrets {
        failing: AtomicBool::new(true),
    });

    let err = ConfigAggregator::builder()
        .with_secrets_store(secrets, "/myapp")
        .with_variables(production())
        .build::<ConfigMap>()
        .await
        .unwrap_err();

    match err {
        ConfigError::LoaderFailure { loader, source } => {
            assert_eq!(loader, "secrets:/myapp");
            assert!(matches!(*source, ConfigError::BackendError(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_fallback_records_failure_and_continues() {
    let secrets = Arc::new(FlakySecrets {
        failing: AtomicBool::new(true),
    });

    let config = ConfigAggregator::builder()
        .with_secrets_store(secrets, "/myapp")
        .with_env("APP")
        .with_variables(production())
        .fallback_to_local()
        .build::<ConfigMap>()
        .await
        .unwrap();

    assert_eq!(config.get("KEY").unwrap(), Some(json!("local")));
    let failures = config.failures().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].loader, "secrets:/myapp");
}

#[tokio::test]
async fn test_missing_environment_mapping_is_fatal_under_fallback() {
    let err = ConfigAggregator::builder()
        .with_environment_paths(
            EnvironmentPaths::empty().with_segment(EnvironmentTier::Development, "dev"),
        )
        .with_secrets_store(Arc::new(InMemorySecrets::new()), "/myapp")
        .with_variables(production())
        .fallback_to_local()
        .build::<ConfigMap>()
        .await
        .unwrap_err();

    assert!(err.is_fatal());
    assert!(err.to_string().contains("production"));
}

#[tokio::test]
async fn test_failed_refresh_discards_snapshot() {
    let secrets = Arc::new(FlakySecrets {
        failing: AtomicBool::new(false),
    });

    let config = ConfigAggregator::builder()
        .with_secrets_store(secrets.clone(), "/myapp")
        .with_variables(production())
        .build::<ConfigMap>()
        .await
        .unwrap();
    assert_eq!(config.get("DB_PASSWORD").unwrap(), Some(json!("hunter2")));

    secrets.failing.store(true, Ordering::SeqCst);
    assert!(config.refresh().await.is_err());
    assert_eq!(config.state(), AggregatorState::Failed);
    assert!(matches!(config.get("DB_PASSWORD"), Err(ConfigError::NotInitialized)));

    secrets.failing.store(false, Ordering::SeqCst);
    config.refresh().await.unwrap();
    assert!(config.is_initialized());
}

#[tokio::test(start_paused = true)]
async fn test_slow_remote_store_times_out() {
    let err = ConfigAggregator::builder()
        .with_parameter_store(Arc::new(SlowParameters), "/myapp")
        .with_variables(production())
        .with_timeout(Duration::from_secs(5))
        .build::<ConfigMap>()
        .await
        .unwrap_err();

    assert!(matches!(err, ConfigError::InitializationTimedOut(_)));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_signal_abandons_pass() {
    let config = ConfigAggregator::builder()
        .with_parameter_store(Arc::new(SlowParameters), "/myapp")
        .with_variables(production())
        .build_uninitialized::<ConfigMap>();

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let pass = config.initialize_with_cancel(async {
        let _ = rx.await;
    });
    tx.send(()).unwrap();

    assert!(matches!(pass.await, Err(ConfigError::InitializationCancelled)));
    assert_eq!(config.state(), AggregatorState::Failed);
}

#[tokio::test]
async fn test_namespace_factories() {
    let config = ConfigAggregator::builder()
        .with_env("APP")
        .with_variables([
            ("APP_DATABASE_HOST", "h"),
            ("APP_DATABASE_PORT", "5432"),
            ("APP_DATABASE_MAX_POOL", "10"),
            ("APP_NAME", "x"),
        ])
        .with_namespaces(["database", "cache", "system"])
        .build::<ConfigMap>()
        .await
        .unwrap();

    let factories = config.namespace_factories().unwrap();
    assert_eq!(factories.len(), 1);

    let database = config.namespace_factory("database").unwrap().unwrap();
    assert!(database.is_valid());
    assert_eq!(
        serde_json::Value::Object((*database.create()).clone()),
        json!({"host": "h", "port": "5432", "maxPool": "10"})
    );

    assert!(config.namespace_factory("cache").unwrap().is_none());
    assert!(config.namespace_factory("system").unwrap().is_none());
}
