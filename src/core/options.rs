//! Aggregator options.

use crate::core::environment::{DEFAULT_ENVIRONMENT_VAR, DEFAULT_FALLBACK_ENVIRONMENT_VAR};
use crate::core::precedence::PrecedencePolicy;
use crate::core::validation::Schema;
use crate::sources::{DEFAULT_OVERRIDE_FILE, DEFAULT_PROFILE_MARKER};
use std::path::PathBuf;
use std::time::Duration;

/// How the orchestrator reacts to a failing loader.
///
/// A failure is skipped only when `fail_on_error` is off and
/// `fallback_to_local` is on; every other combination aborts the pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorPolicy {
    /// Abort the pass on the first backend failure.
    pub fail_on_error: bool,
    /// Continue with the remaining loaders after a failure.
    pub fallback_to_local: bool,
}

impl ErrorPolicy {
    /// Abort on any loader failure.
    pub fn fail_fast() -> Self {
        Self {
            fail_on_error: true,
            fallback_to_local: false,
        }
    }

    /// Record loader failures and continue.
    pub fn fallback() -> Self {
        Self {
            fail_on_error: false,
            fallback_to_local: true,
        }
    }

    /// Whether a non-fatal loader failure may be skipped.
    pub fn tolerates_failures(&self) -> bool {
        !self.fail_on_error && self.fallback_to_local
    }
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self::fail_fast()
    }
}

/// Plain options controlling an aggregation pass.
#[derive(Debug, Clone)]
pub struct AggregatorOptions {
    /// Loader failure handling.
    pub error_policy: ErrorPolicy,
    /// Run schema validation. When off, raw data is used as-is.
    pub validate: bool,
    /// Schema applied to the merged data.
    pub schema: Schema,
    /// Precedence used to combine loader outputs.
    ///
    /// `None` keeps the orchestrator's shallow, list-ordered merge.
    pub precedence: Option<PrecedencePolicy>,
    /// Namespaces to expose as factories.
    pub namespaces: Vec<String>,
    /// Deadline for a whole pass.
    pub timeout: Option<Duration>,
    /// Primary environment tier variable.
    pub environment_var: String,
    /// Secondary environment tier variable.
    pub fallback_environment_var: String,
    /// Developer override file, merged last in the local tier.
    pub override_file: Option<PathBuf>,
    /// Variable whose presence enables the override file.
    pub profile_marker_var: String,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self {
            error_policy: ErrorPolicy::default(),
            validate: true,
            schema: Schema::new(),
            precedence: None,
            namespaces: Vec::new(),
            timeout: None,
            environment_var: DEFAULT_ENVIRONMENT_VAR.to_string(),
            fallback_environment_var: DEFAULT_FALLBACK_ENVIRONMENT_VAR.to_string(),
            override_file: Some(PathBuf::from(DEFAULT_OVERRIDE_FILE)),
            profile_marker_var: DEFAULT_PROFILE_MARKER.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_policy_matrix() {
        let cases = [
            (true, true, false),
            (true, false, false),
            (false, true, true),
            (false, false, false),
        ];
        for (fail_on_error, fallback_to_local, tolerated) in cases {
            let policy = ErrorPolicy {
                fail_on_error,
                fallback_to_local,
            };
            assert_eq!(policy.tolerates_failures(), tolerated);
        }
    }

    #[test]
    fn test_defaults() {
        let options = AggregatorOptions::default();
        assert!(options.validate);
        assert_eq!(options.error_policy, ErrorPolicy::fail_fast());
        assert_eq!(options.environment_var, "APP_ENV");
        assert!(options.precedence.is_none());
    }
}
