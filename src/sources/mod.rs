//! Configuration loader implementations.

mod env;
mod file;
mod loader;
mod override_file;
mod parameters;
mod secrets;

#[cfg(any(feature = "secrets-aws", feature = "parameters-aws"))]
pub mod aws;

pub use env::{EnvLoader, process_variables};
pub use file::FileLoader;
pub use loader::{ConfigMap, LoadContext, SourceLoader};
pub use override_file::{DEFAULT_OVERRIDE_FILE, DEFAULT_PROFILE_MARKER, OverrideFile};
pub use parameters::{
    InMemoryParameters, Parameter, ParameterBackend, ParameterPage, ParameterStoreLoader,
};
pub use secrets::{InMemorySecrets, SecretsBackend, SecretsStoreLoader};
