//! Core aggregation types.

mod aggregator;
mod builder;
mod environment;
mod namespace;
mod options;
mod orchestrator;
mod precedence;
mod validation;

pub use aggregator::{AggregatorState, ConfigAggregator};
pub use builder::ConfigAggregatorBuilder;
pub use environment::{
    DEFAULT_ENVIRONMENT_VAR, DEFAULT_FALLBACK_ENVIRONMENT_VAR, EnvironmentPaths, EnvironmentTier,
    resolve_environment,
};
pub use namespace::{
    DEFAULT_NAMESPACE, NamespaceFactory, NamespaceMap, NamespaceValidation, RESERVED_NAMESPACES,
    create_factories, create_namespaced_factories, extract_namespace, is_valid_namespace, organize,
    validate_namespace, validate_namespace_config,
};
pub use options::{AggregatorOptions, ErrorPolicy};
pub use orchestrator::{LoadOutcome, LoaderFailure, LoadingOrchestrator, OVERRIDE_PRIORITY};
pub use precedence::{
    ConfigurationSource, PrecedencePolicy, SourceType, TYPE_BOOST, deep_merge, effective_priority,
    merge_sources, shallow_merge, validate_sources,
};
pub use validation::{FieldKind, FieldSpec, Schema, coerce};
