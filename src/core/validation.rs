//! Schema validation and type coercion.
//!
//! Raw configuration is mostly strings (environment variables, parameters).
//! A [`Schema`] describes the expected keys and types; validation coerces
//! strings into the expected type, fills in defaults and reports every
//! violation at once.
//!
//! # Examples
//!
//! ```rust
//! use serde_json::json;
//! use tiered_config::core::{FieldKind, FieldSpec, Schema};
//!
//! let schema = Schema::new()
//!     .field(FieldSpec::new("PORT", FieldKind::Integer).required())
//!     .field(FieldSpec::new("DEBUG", FieldKind::Boolean).default_value(false));
//!
//! let raw = json!({"PORT": "8080"}).as_object().cloned().unwrap();
//! let validated = schema.validate(&raw).unwrap();
//! assert_eq!(validated["PORT"], 8080);
//! assert_eq!(validated["DEBUG"], false);
//! ```

use crate::error::ValidationError;
use crate::sources::ConfigMap;
use serde_json::{Number, Value};
use std::fmt;

/// Expected type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Any string; numbers and booleans are stringified.
    String,
    /// A whole number.
    Integer,
    /// Any number.
    Float,
    /// `true` / `false`.
    Boolean,
    /// A list; strings holding a JSON array are parsed.
    Array,
    /// A nested object; strings holding a JSON object are parsed.
    Object,
    /// Anything, left as-is.
    Any,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Any => "any",
        };
        f.write_str(name)
    }
}

/// Declaration of a single configuration field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    path: String,
    kind: FieldKind,
    required: bool,
    default: Option<Value>,
    allowed: Option<Vec<Value>>,
}

impl FieldSpec {
    /// Declare an optional field. `path` may be dotted (`database.port`).
    pub fn new(path: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            path: path.into(),
            kind,
            required: false,
            default: None,
            allowed: None,
        }
    }

    /// Fail validation when the field is missing and has no default.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Value used when the field is missing.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Restrict the (coerced) value to a fixed set.
    pub fn one_of<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// The field path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The expected kind.
    pub fn kind(&self) -> FieldKind {
        self.kind
    }
}

/// Declarative description of the expected configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: Vec<FieldSpec>,
    deny_unknown: bool,
}

impl Schema {
    /// An empty schema accepting anything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field declaration.
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    /// Report top-level keys that no field declares.
    pub fn deny_unknown(mut self) -> Self {
        self.deny_unknown = true;
        self
    }

    /// Declared fields.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Validate and coerce `raw`.
    ///
    /// Undeclared keys are passed through unchanged unless
    /// [`deny_unknown`](Self::deny_unknown) is set.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming every offending field.
    pub fn validate(&self, raw: &ConfigMap) -> Result<ConfigMap, ValidationError> {
        let mut output = raw.clone();
        let mut violations = Vec::new();

        for spec in &self.fields {
            let present = lookup(raw, &spec.path).filter(|v| !v.is_null());

            let value = match (present, &spec.default) {
                (Some(value), _) => value.clone(),
                (None, Some(default)) => default.clone(),
                (None, None) => {
                    if spec.required {
                        violations.push(ValidationError::invalid_field(&spec.path, "is required"));
                    }
                    continue;
                }
            };

            match coerce(value, spec.kind) {
                Ok(coerced) => {
                    if let Some(allowed) = &spec.allowed {
                        if !allowed.contains(&coerced) {
                            violations.push(ValidationError::invalid_field(
                                &spec.path,
                                format!("must be one of {}", Value::Array(allowed.clone())),
                            ));
                            continue;
                        }
                    }
                    if let Err(reason) = insert(&mut output, &spec.path, coerced) {
                        violations.push(ValidationError::invalid_field(&spec.path, reason));
                    }
                }
                Err(reason) => violations.push(ValidationError::invalid_field(&spec.path, reason)),
            }
        }

        if self.deny_unknown {
            for key in raw.keys() {
                let declared = self.fields.iter().any(|spec| {
                    spec.path == *key || spec.path.split('.').next() == Some(key.as_str())
                });
                if !declared {
                    violations.push(ValidationError::invalid_field(key, "is not allowed"));
                }
            }
        }

        match ValidationError::from_violations(violations) {
            Some(err) => Err(err),
            None => Ok(output),
        }
    }
}

/// Find a value by dotted path; an exact top-level key takes precedence.
pub(crate) fn lookup<'a>(map: &'a ConfigMap, path: &str) -> Option<&'a Value> {
    if let Some(value) = map.get(path) {
        return Some(value);
    }
    let mut segments = path.split('.');
    let mut current = map.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Write `value` at `path`, creating missing parent objects.
///
/// Fails without touching `map` when an existing parent is not an object.
fn insert(map: &mut ConfigMap, path: &str, value: Value) -> Result<(), String> {
    if map.contains_key(path) || !path.contains('.') {
        map.insert(path.to_string(), value);
        return Ok(());
    }

    let segments: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
        return Ok(());
    };

    let mut cursor: Option<&ConfigMap> = Some(&*map);
    for (depth, segment) in parents.iter().enumerate() {
        match cursor.and_then(|m| m.get(*segment)) {
            Some(Value::Object(next)) => cursor = Some(next),
            Some(_) => {
                return Err(format!(
                    "parent '{}' is not an object",
                    parents[..=depth].join(".")
                ));
            }
            None => cursor = None,
        }
    }

    let mut current = map;
    for segment in parents {
        let entry = current
            .entry((*segment).to_string())
            .or_insert_with(|| Value::Object(ConfigMap::new()));
        current = match entry {
            Value::Object(next) => next,
            _ => return Ok(()),
        };
    }
    current.insert((*last).to_string(), value);
    Ok(())
}

/// Coerce a raw value into the expected kind.
pub fn coerce(value: Value, kind: FieldKind) -> Result<Value, String> {
    let mismatch = |value: &Value| format!("expected {}, got {}", kind, describe(value));

    match kind {
        FieldKind::Any => Ok(value),
        FieldKind::String => match value {
            Value::String(_) => Ok(value),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            other => Err(mismatch(&other)),
        },
        FieldKind::Integer => match &value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value),
            Value::String(s) => {
                let trimmed = s.trim();
                trimmed
                    .parse::<i64>()
                    .map(Value::from)
                    .or_else(|_| trimmed.parse::<u64>().map(Value::from))
                    .map_err(|_| mismatch(&value))
            }
            _ => Err(mismatch(&value)),
        },
        FieldKind::Float => match &value {
            Value::Number(_) => Ok(value),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| mismatch(&value)),
            _ => Err(mismatch(&value)),
        },
        FieldKind::Boolean => match &value {
            Value::Bool(_) => Ok(value),
            Value::String(s) if s.trim() == "true" => Ok(Value::Bool(true)),
            Value::String(s) if s.trim() == "false" => Ok(Value::Bool(false)),
            _ => Err(mismatch(&value)),
        },
        FieldKind::Array => match &value {
            Value::Array(_) => Ok(value),
            Value::String(s) => match serde_json::from_str::<Value>(s.trim()) {
                Ok(parsed @ Value::Array(_)) => Ok(parsed),
                _ => Err(mismatch(&value)),
            },
            _ => Err(mismatch(&value)),
        },
        FieldKind::Object => match &value {
            Value::Object(_) => Ok(value),
            Value::String(s) => match serde_json::from_str::<Value>(s.trim()) {
                Ok(parsed @ Value::Object(_)) => Ok(parsed),
                _ => Err(mismatch(&value)),
            },
            _ => Err(mismatch(&value)),
        },
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {}", b),
        Value::Number(n) => format!("number {}", n),
        Value::String(s) => format!("string \"{}\"", s),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
    }
}
