//! Per-field assertions over returned resources
//!
//! A collection passes only if every element conforms: each record must
//! match the filter that produced it.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::envelope::{ResourceData, attribute};

/// Comparison strategy between an attribute and the expected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// Attribute (as string) equals the expected value exactly
    Equals,
    /// Attribute, lower-cased, starts with the expected value lower-cased
    StartsWithCi,
}

impl Comparison {
    #[must_use]
    pub fn holds(self, actual: &str, expected: &str) -> bool {
        match self {
            Self::Equals => actual == expected,
            Self::StartsWithCi => actual.to_lowercase().starts_with(&expected.to_lowercase()),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::StartsWithCi => "starts_with_ci",
        }
    }
}

impl std::fmt::Display for Comparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One assertion against one test value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionSpec {
    pub attribute: String,
    pub comparison: Comparison,
    pub expected: String,
}

/// A resource whose attribute did not satisfy the comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Mismatch {
    /// Position in the collection (`None` for a singular resource)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    pub attribute: String,
    pub comparison: Comparison,
    pub expected: String,
    /// Observed value, `None` when the attribute is absent
    pub actual: Option<String>,
}

impl std::fmt::Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(idx) = self.index {
            write!(f, "[{idx}] ")?;
        }
        match &self.actual {
            Some(actual) => write!(
                f,
                "{}: expected {} \"{}\", got \"{actual}\"",
                self.attribute, self.comparison, self.expected
            ),
            None => write!(
                f,
                "{}: expected {} \"{}\", attribute missing",
                self.attribute, self.comparison, self.expected
            ),
        }
    }
}

/// Result of applying one assertion to a resource or collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssertionOutcome {
    /// Number of resource objects inspected
    pub checked: usize,
    pub mismatches: Vec<Mismatch>,
}

impl AssertionOutcome {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.mismatches.is_empty()
    }
}

impl AssertionSpec {
    /// Apply the comparison to every resource object.
    #[must_use]
    pub fn evaluate(&self, data: &ResourceData<'_>) -> AssertionOutcome {
        let objects = data.objects();
        let indexed = matches!(data, ResourceData::Collection(_));
        let mismatches = objects
            .iter()
            .enumerate()
            .filter_map(|(idx, resource)| {
                let actual = attribute(resource, &self.attribute).map(value_as_string);
                let holds = actual
                    .as_deref()
                    .is_some_and(|a| self.comparison.holds(a, &self.expected));
                (!holds).then(|| Mismatch {
                    index: indexed.then_some(idx),
                    attribute: self.attribute.clone(),
                    comparison: self.comparison,
                    expected: self.expected.clone(),
                    actual,
                })
            })
            .collect();
        AssertionOutcome {
            checked: objects.len(),
            mismatches,
        }
    }
}

/// String form of an attribute value; strings are taken verbatim.
#[must_use]
pub fn value_as_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
