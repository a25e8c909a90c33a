//! Schema violations found in a response body

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One structural mismatch between a response body and a resource schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Violation {
    /// JSON pointer into the validated value, e.g. `/data/0/attributes/accountIndexCode`
    pub path: String,
    #[serde(flatten)]
    pub kind: ViolationKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    /// Required field absent
    MissingField { field: String },
    /// Value of the wrong JSON type
    TypeMismatch { expected: String, actual: String },
    /// Value outside the declared enum
    NotInEnum { value: String },
    /// No `anyOf`/`oneOf` alternative matched
    NoMatchingAlternative,
    /// Any other keyword (`pattern`, `maxLength`, `minimum`, ...) rejected the value
    Constraint { detail: String },
    /// Body is not a resource envelope
    MissingEnvelope { detail: String },
    /// Body is empty or not JSON
    MalformedBody { detail: String },
}

impl Violation {
    #[must_use]
    pub fn new(path: impl Into<String>, kind: ViolationKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let at = if self.path.is_empty() { "/" } else { &self.path };
        match &self.kind {
            ViolationKind::MissingField { field } => {
                write!(f, "{at}: missing required field '{field}'")
            }
            ViolationKind::TypeMismatch { expected, actual } => {
                write!(f, "{at}: expected {expected}, got {actual}")
            }
            ViolationKind::NotInEnum { value } => write!(f, "{at}: {value} is not an allowed value"),
            ViolationKind::NoMatchingAlternative => {
                write!(f, "{at}: matches none of the declared alternatives")
            }
            ViolationKind::Constraint { detail } => write!(f, "{at}: {detail}"),
            ViolationKind::MissingEnvelope { detail } => write!(f, "{at}: {detail}"),
            ViolationKind::MalformedBody { detail } => write!(f, "{at}: {detail}"),
        }
    }
}
