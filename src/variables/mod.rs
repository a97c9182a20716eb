//! Variables and the embedded-variable resolution engine.
//!
//! A [`Variable`] is a named, classified, typed value whose raw form may embed
//! `${classification:content}` placeholders. The [`VariableStore`] owns every
//! variable, partitioned by [`Classification`], and turns raw values into their
//! final strings:
//!
//! ```text
//! "arn:aws:s3:::${ref:bucket}-${env:STAGE}"
//!        │                 │
//!        │                 └── env lookup (default_value extra parameter if unset)
//!        └── resolved value of build-variable `bucket`
//! ```
//!
//! Supported classifications inside snippets:
//!
//! | Tag              | Evaluates to                                                |
//! |------------------|-------------------------------------------------------------|
//! | `build-variable` | the stored value of that build variable, verbatim          |
//! | `exports`        | the stored value of that export, verbatim                  |
//! | `ref`            | the *resolved* value of that build variable                |
//! | `env`            | an environment variable, or the `default_value` parameter  |
//! | `shell`          | stdout of the command                                       |
//! | `func`           | the result of a registered function                         |
//!
//! Placeholders nest (`${func:join(items=['${ref:a}', 'b'])}`); inner placeholders
//! are substituted first. Nesting is limited to
//! [`MAX_EMBEDDED_VARIABLE_DEPTH`](crate::constants::MAX_EMBEDDED_VARIABLE_DEPTH) levels.

pub mod call;
pub mod context;
pub mod shell;
pub mod snippet;
pub mod store;

pub use call::FunctionCall;
pub use context::{EnvLookup, ResolutionMode, ResolveContext};
pub use shell::{ShellOutput, ShellRunner};
pub use snippet::{Snippet, extract_snippets, snippet_body, snippet_spans};
pub use store::VariableStore;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::core::StackyardError;

/// Auxiliary keyword arguments attached to a variable.
pub type ExtraParameters = serde_json::Map<String, serde_json::Value>;

/// Evaluation strategy of a variable or snippet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Classification {
    /// Plain manifest-level variables, addressable through `ref`
    BuildVariable,
    /// Environment lookups
    Env,
    /// Indirection to a build variable
    Ref,
    /// Shell command output
    Shell,
    /// Registered function invocation
    Func,
    /// Already-resolved outputs of other stacks
    Exports,
    /// Anything else, e.g. unit parameters
    Other,
}

impl Classification {
    /// Every recognized classification.
    pub const ALL: [Self; 7] = [
        Self::BuildVariable,
        Self::Env,
        Self::Ref,
        Self::Shell,
        Self::Func,
        Self::Exports,
        Self::Other,
    ];

    /// The tag as written in manifests and snippets.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BuildVariable => "build-variable",
            Self::Env => "env",
            Self::Ref => "ref",
            Self::Shell => "shell",
            Self::Func => "func",
            Self::Exports => "exports",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Classification {
    type Err = StackyardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|c| c.as_str() == s).ok_or_else(|| {
            StackyardError::UnknownClassification {
                classification: s.to_string(),
            }
        })
    }
}

/// Declared primitive type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Bool,
    Int,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Bool => f.write_str("bool"),
            Self::Int => f.write_str("int"),
        }
    }
}

impl FromStr for ValueType {
    type Err = StackyardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "string" | "str" => Ok(Self::String),
            "bool" | "boolean" => Ok(Self::Bool),
            "int" | "integer" => Ok(Self::Int),
            other => Err(StackyardError::ManifestValidationError {
                reason: format!("unknown value type '{other}' (expected string, bool or int)"),
            }),
        }
    }
}

/// Raw, unresolved value of a variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl VariableValue {
    /// Only the empty string counts as empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Str(s) if s.is_empty())
    }

    /// The type this value carries on its own.
    pub const fn value_type(&self) -> ValueType {
        match self {
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) => ValueType::Int,
            Self::Str(_) => ValueType::String,
        }
    }

    /// Whether the value may be stored in a variable declared as `value_type`.
    ///
    /// Strings are accepted for `bool`/`int` when they parse as such or still
    /// contain a placeholder that will produce the final value.
    pub fn is_assignable_to(&self, value_type: ValueType) -> bool {
        if self.is_empty() {
            return true;
        }
        match (self, value_type) {
            (Self::Str(_), ValueType::String)
            | (Self::Bool(_), ValueType::Bool)
            | (Self::Int(_), ValueType::Int) => true,
            (Self::Str(s), ValueType::Bool) => s.contains("${") || s.parse::<bool>().is_ok(),
            (Self::Str(s), ValueType::Int) => s.contains("${") || s.parse::<i64>().is_ok(),
            _ => false,
        }
    }
}

impl fmt::Display for VariableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for VariableValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for VariableValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<bool> for VariableValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for VariableValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// A named, classified, typed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Variable {
    id: String,
    classification: Classification,
    raw_value: VariableValue,
    value_type: ValueType,
    extra_parameters: ExtraParameters,
    checksum: String,
}

impl Variable {
    /// Create a variable whose type is inferred from its raw value.
    pub fn new(
        id: impl Into<String>,
        classification: Classification,
        raw_value: impl Into<VariableValue>,
    ) -> Self {
        let raw_value = raw_value.into();
        let value_type = raw_value.value_type();
        let checksum = compute_checksum(&raw_value);
        Self {
            id: id.into(),
            classification,
            raw_value,
            value_type,
            extra_parameters: ExtraParameters::new(),
            checksum,
        }
    }

    /// Create a variable from a textual classification and an explicit type.
    ///
    /// Fails when the classification is not recognized or when a non-empty raw
    /// value is not assignable to `value_type`.
    pub fn declared(
        id: impl Into<String>,
        classification: &str,
        raw_value: impl Into<VariableValue>,
        value_type: ValueType,
    ) -> Result<Self, StackyardError> {
        let classification: Classification = classification.parse()?;
        let id = id.into();
        let raw_value = raw_value.into();

        if !raw_value.is_assignable_to(value_type) {
            return Err(StackyardError::TypeMismatch {
                id,
                expected: value_type.to_string(),
                value: raw_value.to_string(),
            });
        }

        let checksum = compute_checksum(&raw_value);
        Ok(Self {
            id,
            classification,
            raw_value,
            value_type,
            extra_parameters: ExtraParameters::new(),
            checksum,
        })
    }

    /// Attach extra keyword parameters (`func` arguments, `env` default).
    #[must_use]
    pub fn with_extra_parameters(mut self, extra_parameters: ExtraParameters) -> Self {
        self.extra_parameters = extra_parameters;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub const fn classification(&self) -> Classification {
        self.classification
    }

    pub const fn raw_value(&self) -> &VariableValue {
        &self.raw_value
    }

    pub const fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub const fn extra_parameters(&self) -> &ExtraParameters {
        &self.extra_parameters
    }

    /// `sha256:<hex>` of the raw value, computed at creation.
    pub fn checksum(&self) -> &str {
        &self.checksum
    }
}

fn compute_checksum(raw_value: &VariableValue) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_value.to_string().as_bytes());
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_round_trips_tags() {
        for classification in Classification::ALL {
            assert_eq!(classification.as_str().parse::<Classification>().unwrap(), classification);
        }
    }

    #[test]
    fn test_unknown_classification_fails_construction() {
        let err = Variable::declared("x", "var", "value", ValueType::String).unwrap_err();
        assert_eq!(
            err,
            StackyardError::UnknownClassification {
                classification: "var".into()
            }
        );
    }

    #[test]
    fn test_declared_type_mismatch() {
        let err = Variable::declared("port", "build-variable", "eighty", ValueType::Int).unwrap_err();
        assert!(matches!(err, StackyardError::TypeMismatch { .. }));

        let err = Variable::declared("flag", "build-variable", 3_i64, ValueType::Bool).unwrap_err();
        assert!(matches!(err, StackyardError::TypeMismatch { .. }));
    }

    #[test]
    fn test_declared_accepts_empty_and_templates() {
        assert!(Variable::declared("port", "other", "", ValueType::Int).is_ok());
        assert!(Variable::declared("port", "other", "${ref:port}", ValueType::Int).is_ok());
        assert!(Variable::declared("port", "other", "8080", ValueType::Int).is_ok());
        assert!(Variable::declared("on", "other", true, ValueType::Bool).is_ok());
    }

    #[test]
    fn test_checksum_tracks_raw_value() {
        let a = Variable::new("a", Classification::BuildVariable, "one");
        let b = Variable::new("b", Classification::Exports, "one");
        let c = Variable::new("a", Classification::BuildVariable, "two");

        assert!(a.checksum().starts_with("sha256:"));
        assert_eq!(a.checksum().len(), 71);
        assert_eq!(a.checksum(), b.checksum());
        assert_ne!(a.checksum(), c.checksum());
    }

    #[test]
    fn test_value_display() {
        assert_eq!(VariableValue::from(true).to_string(), "true");
        assert_eq!(VariableValue::from(42_i64).to_string(), "42");
        assert_eq!(VariableValue::from("x").to_string(), "x");
    }
}
