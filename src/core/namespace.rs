//! Namespace organization of flat configuration.
//!
//! A flat blob such as `{DATABASE_HOST: "h", APP_NAME: "x"}` is split into
//! per-namespace objects using three strategies, applied in this fixed order
//! with later strategies deep-merged over earlier ones:
//!
//! 1. direct key: `{"database": {...}}`
//! 2. prefixed key: `DATABASE_MAX_POOL` -> `database.maxPool`
//! 3. path key: `/app/database/connection/timeout` -> `database.connection.timeout`
//!
//! Keys claimed by no namespace land in the reserved `default` bucket unchanged.

use crate::core::precedence::{ConfigurationSource, PrecedencePolicy, deep_merge, merge_sources};
use crate::error::Result;
use crate::sources::ConfigMap;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Name of the bucket collecting unmatched keys.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Names that may not be used as namespaces.
pub const RESERVED_NAMESPACES: &[&str] = &["config", "default", "global", "system"];

/// Mapping from namespace name to its configuration object.
pub type NamespaceMap = BTreeMap<String, ConfigMap>;

/// Outcome of checking a namespace name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NamespaceValidation {
    /// Whether the name is usable.
    pub valid: bool,
    /// Human-readable problems.
    pub issues: Vec<String>,
    /// Ways to fix the problems.
    pub suggestions: Vec<String>,
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_reserved(name: &str) -> bool {
    RESERVED_NAMESPACES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name))
}

/// Whether `name` can be used as a namespace.
pub fn is_valid_namespace(name: &str) -> bool {
    is_identifier(name) && !is_reserved(name)
}

fn sanitize(name: &str) -> String {
    let mut out: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.chars().next().is_none_or(|c| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Check a namespace name and explain any problem.
pub fn validate_namespace(name: &str) -> NamespaceValidation {
    let mut result = NamespaceValidation::default();

    if name.trim().is_empty() {
        result.issues.push("namespace name must not be empty".to_string());
        result
            .suggestions
            .push("use a descriptive identifier such as 'database'".to_string());
        return result;
    }

    if !is_identifier(name) {
        result.issues.push(format!(
            "namespace '{}' must start with a letter or underscore and contain only \
             letters, digits and underscores",
            name
        ));
        result.suggestions.push(format!("rename it to '{}'", sanitize(name)));
    }

    if is_reserved(name) {
        result.issues.push(format!("namespace '{}' is a reserved word", name));
        result
            .suggestions
            .push(format!("use a more specific name such as '{}_settings'", name.to_lowercase()));
    }

    result.valid = result.issues.is_empty();
    result
}

/// Check a namespace name and that `config` actually holds data for it.
pub fn validate_namespace_config(config: &ConfigMap, name: &str) -> NamespaceValidation {
    let mut result = validate_namespace(name);
    if result.valid && extract_namespace(config, name).is_empty() {
        result.valid = false;
        result
            .issues
            .push(format!("namespace '{}' has no configuration", name));
        result.suggestions.push(format!(
            "add a '{}' object, '{}_*' keys or '/.../{}/...' path keys",
            name,
            name.to_uppercase(),
            name
        ));
    }
    result
}

/// `MAX_POOL_SIZE` -> `maxPoolSize`.
fn camel_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for (i, part) in raw.split('_').filter(|p| !p.is_empty()).enumerate() {
        let lower = part.to_lowercase();
        if i == 0 {
            out.push_str(&lower);
        } else {
            let mut chars = lower.chars();
            if let Some(first) = chars.next() {
                out.extend(first.to_uppercase());
                out.push_str(chars.as_str());
            }
        }
    }
    out
}

fn prefixed_remainder<'a>(key: &'a str, namespace: &str) -> Option<&'a str> {
    let head = key.get(..namespace.len())?;
    if !head.eq_ignore_ascii_case(namespace) {
        return None;
    }
    key[namespace.len()..]
        .strip_prefix('_')
        .filter(|rest| !rest.is_empty())
}

fn path_remainder<'a>(key: &'a str, namespace: &str) -> Option<Vec<&'a str>> {
    if !key.starts_with('/') {
        return None;
    }
    let segments: Vec<&str> = key.split('/').filter(|s| !s.is_empty()).collect();
    let position = segments
        .iter()
        .position(|s| s.eq_ignore_ascii_case(namespace))?;
    let rest = segments[position + 1..].to_vec();
    (!rest.is_empty()).then_some(rest)
}

fn nest(segments: &[&str], value: Value) -> ConfigMap {
    let mut current = value;
    for segment in segments.iter().rev() {
        let mut map = ConfigMap::new();
        map.insert((*segment).to_string(), current);
        current = Value::Object(map);
    }
    match current {
        Value::Object(map) => map,
        _ => ConfigMap::new(),
    }
}

/// Which namespace, if any, claims a top-level key.
fn claims(key: &str, value: &Value, namespace: &str) -> bool {
    (key == namespace && value.is_object())
        || prefixed_remainder(key, namespace).is_some()
        || path_remainder(key, namespace).is_some()
}

/// Extract the object for one namespace from `config`.
pub fn extract_namespace(config: &ConfigMap, namespace: &str) -> ConfigMap {
    let mut result = ConfigMap::new();

    if let Some(Value::Object(direct)) = config.get(namespace) {
        deep_merge(&mut result, direct);
    }

    for (key, value) in config {
        if let Some(rest) = prefixed_remainder(key, namespace) {
            let field = camel_case(rest);
            if !field.is_empty() {
                deep_merge(&mut result, &nest(&[field.as_str()], value.clone()));
            }
        }
    }

    for (key, value) in config {
        if let Some(segments) = path_remainder(key, namespace) {
            deep_merge(&mut result, &nest(&segments, value.clone()));
        }
    }

    result
}

/// Split `config` into the requested namespaces plus the `default` bucket.
///
/// Invalid namespace names are ignored, and namespaces (including `default`)
/// that end up empty are omitted.
pub fn organize(config: &ConfigMap, namespaces: &[impl AsRef<str>]) -> NamespaceMap {
    let valid: Vec<&str> = namespaces
        .iter()
        .map(AsRef::as_ref)
        .filter(|ns| {
            let ok = is_valid_namespace(ns);
            if !ok {
                tracing::debug!(namespace = ns, "Ignoring invalid namespace");
            }
            ok
        })
        .collect();

    let mut map = NamespaceMap::new();
    for namespace in &valid {
        let extracted = extract_namespace(config, namespace);
        if !extracted.is_empty() {
            map.insert((*namespace).to_string(), extracted);
        }
    }

    let unclaimed: ConfigMap = config
        .iter()
        .filter(|(key, value)| !valid.iter().any(|ns| claims(key, value, ns)))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    if !unclaimed.is_empty() {
        map.insert(DEFAULT_NAMESPACE.to_string(), unclaimed);
    }

    map
}

/// A callable producing one namespace's configuration, with discovery metadata.
#[derive(Debug, Clone)]
pub struct NamespaceFactory {
    namespace: String,
    valid: bool,
    config: Arc<ConfigMap>,
}

impl NamespaceFactory {
    /// Create a factory for an already resolved namespace object.
    pub fn new(namespace: impl Into<String>, config: ConfigMap) -> Self {
        let namespace = namespace.into();
        let valid = is_valid_namespace(&namespace) && !config.is_empty();
        Self {
            namespace,
            valid,
            config: Arc::new(config),
        }
    }

    /// The namespace tag.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Whether the namespace name is valid and has data.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Produce the namespace's configuration.
    pub fn create(&self) -> Arc<ConfigMap> {
        Arc::clone(&self.config)
    }
}

/// Build one factory per requested namespace that is valid and non-empty.
pub fn create_factories(
    config: &ConfigMap,
    namespaces: &[impl AsRef<str>],
) -> Vec<NamespaceFactory> {
    let organized = organize(config, namespaces);
    namespaces
        .iter()
        .map(AsRef::as_ref)
        .filter_map(|ns| {
            organized
                .get(ns)
                .map(|config| NamespaceFactory::new(ns, config.clone()))
        })
        .filter(NamespaceFactory::is_valid)
        .collect()
}

/// Merge labeled sources under `policy`, then build namespace factories.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidSources`](crate::error::ConfigError::InvalidSources)
/// if any source is malformed.
pub fn create_namespaced_factories(
    sources: &[ConfigurationSource],
    policy: PrecedencePolicy,
    namespaces: &[impl AsRef<str>],
) -> Result<Vec<NamespaceFactory>> {
    let merged = merge_sources(sources, policy)?;
    Ok(create_factories(&merged, namespaces))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::precedence::SourceType;
    use serde_json::json;

    fn map(value: Value) -> ConfigMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_scenario_prefix_and_default() {
        let config = map(json!({"DATABASE_HOST": "h", "DATABASE_PORT": "5432", "APP_NAME": "x"}));
        let organized = organize(&config, &["database"]);

        assert_eq!(organized.len(), 2);
        assert_eq!(
            Value::Object(organized["database"].clone()),
            json!({"host": "h", "port": "5432"})
        );
        assert_eq!(Value::Object(organized["default"].clone()), json!({"APP_NAME": "x"}));
    }

    #[test]
    fn test_prefix_merges_with_direct_object() {
        let config = map(json!({
            "database": {"name": "app", "host": "direct"},
            "DATABASE_HOST": "localhost",
            "DATABASE_PORT": "5432"
        }));
        let organized = organize(&config, &["database"]);
        assert_eq!(
            Value::Object(organized["database"].clone()),
            json!({"name": "app", "host": "localhost", "port": "5432"})
        );
        assert!(!organized.contains_key(DEFAULT_NAMESPACE));
    }

    #[test]
    fn test_path_keys_nest() {
        let config = map(json!({
            "/app/database/connection/timeout": "30",
            "/app/database/connection/retries": "3",
            "/app/cache/ttl": "60"
        }));
        let organized = organize(&config, &["database"]);
        assert_eq!(
            Value::Object(organized["database"].clone()),
            json!({"connection": {"timeout": "30", "retries": "3"}})
        );
        assert_eq!(
            Value::Object(organized["default"].clone()),
            json!({"/app/cache/ttl": "60"})
        );
    }

    #[test]
    fn test_strategy_order_path_wins() {
        let config = map(json!({
            "database": {"host": "direct"},
            "DATABASE_HOST": "prefixed",
            "/svc/database/host": "path"
        }));
        let extracted = extract_namespace(&config, "database");
        assert_eq!(extracted["host"], "path");
    }

    #[test]
    fn test_camel_case_and_case_folding() {
        let config = map(json!({"database_max_pool_size": "10", "Database_User": "u"}));
        let extracted = extract_namespace(&config, "database");
        assert_eq!(Value::Object(extracted), json!({"maxPoolSize": "10", "user": "u"}));
    }

    #[test]
    fn test_prefix_requires_separator() {
        let config = map(json!({"DATABASEHOST": "x", "DATABASE_": "y"}));
        assert!(extract_namespace(&config, "database").is_empty());
    }

    #[test]
    fn test_direct_scalar_not_claimed() {
        let config = map(json!({"database": "postgres://"}));
        let organized = organize(&config, &["database"]);
        assert!(!organized.contains_key("database"));
        assert_eq!(organized["default"]["database"], "postgres://");
    }

    #[test]
    fn test_validate_namespace() {
        assert!(validate_namespace("database").valid);
        assert!(validate_namespace("_private2").valid);

        let digit = validate_namespace("2fast");
        assert!(!digit.valid);
        assert_eq!(digit.suggestions, vec!["rename it to '_2fast'".to_string()]);

        let dashed = validate_namespace("my-db");
        assert!(!dashed.valid);
        assert!(dashed.suggestions[0].contains("my_db"));

        let reserved = validate_namespace("config");
        assert!(!reserved.valid);
        assert!(reserved.issues[0].contains("reserved"));

        assert!(!validate_namespace("").valid);
    }

    #[test]
    fn test_validate_namespace_config_reports_empty() {
        let config = map(json!({"APP_NAME": "x"}));
        let result = validate_namespace_config(&config, "database");
        assert!(!result.valid);
        assert!(result.issues[0].contains("no configuration"));
    }

    #[test]
    fn test_factories_drop_invalid_and_empty() {
        let config = map(json!({"DATABASE_HOST": "h", "CONFIG_X": "1"}));
        let factories = create_factories(&config, &["database", "cache", "config", "9bad"]);
        assert_eq!(factories.len(), 1);

        let factory = &factories[0];
        assert_eq!(factory.namespace(), "database");
        assert!(factory.is_valid());
        assert_eq!(factory.create()["host"], "h");
    }

    #[test]
    fn test_namespaced_factories_respect_policy() {
        let sources = vec![
            ConfigurationSource::new(
                "env",
                SourceType::Environment,
                0.0,
                json!({"DATABASE_HOST": "env"}),
            ),
            ConfigurationSource::new(
                "secrets",
                SourceType::SecretsStore,
                0.0,
                json!({"DATABASE_HOST": "aws"}),
            ),
        ];
        let aws =
            create_namespaced_factories(&sources, PrecedencePolicy::AwsFirst, &["database"])
                .unwrap();
        assert_eq!(aws[0].create()["host"], "aws");

        let local =
            create_namespaced_factories(&sources, PrecedencePolicy::LocalFirst, &["database"])
                .unwrap();
        assert_eq!(local[0].create()["host"], "env");
    }
}
