//! Scenario results: one per (scenario, test value) pair

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{Severity, Violation};
use crate::assertion::Mismatch;

/// Lifecycle of a single scenario case.
///
/// `Init → Dispatching → Validating → Asserting`. A case stops at the first
/// failing phase; the terminal (reported) state is the `ScenarioResult`
/// itself, whose `phase` is the last one entered. Passed cases always end
/// in `Asserting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Init,
    Dispatching,
    Validating,
    Asserting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed,
}

/// Why a scenario failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureDetail {
    /// The request never produced a response
    Transport { message: String },
    /// Status code differs from the declared expectation
    StatusMismatch { expected: u16, actual: u16 },
    /// Body does not conform to the resource schema
    SchemaViolations { resource: String, violations: Vec<Violation> },
    /// One or more field comparisons did not hold
    AssertionMismatch { mismatches: Vec<Mismatch> },
}

impl FailureDetail {
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::Transport { .. } => Severity::Critical,
            Self::StatusMismatch { .. }
            | Self::SchemaViolations { .. }
            | Self::AssertionMismatch { .. } => Severity::Error,
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport error",
            Self::StatusMismatch { .. } => "status mismatch",
            Self::SchemaViolations { .. } => "schema violation",
            Self::AssertionMismatch { .. } => "assertion failure",
        }
    }

    /// Human-readable lines: what was expected, what was observed.
    #[must_use]
    pub fn describe(&self) -> Vec<String> {
        match self {
            Self::Transport { message } => vec![message.clone()],
            Self::StatusMismatch { expected, actual } => {
                vec![format!("expected status {expected}, got {actual}")]
            }
            Self::SchemaViolations {
                resource,
                violations,
            } => violations
                .iter()
                .map(|v| format!("{resource} {v}"))
                .collect(),
            Self::AssertionMismatch { mismatches } => {
                mismatches.iter().map(ToString::to_string).collect()
            }
        }
    }
}

/// The request as sent, for reports and reproductions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RequestSnapshot {
    pub method: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, String>,
}

/// The response as received (body truncated).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResponseSnapshot {
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Terminal record of one scenario case. The runner never drops a case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ScenarioResult {
    /// Scenario name from the run configuration
    pub scenario: String,
    pub endpoint: String,
    /// Test value driving the request
    pub value: String,
    pub expected_status: u16,
    /// Last phase entered; the failing one when the case failed
    pub phase: Phase,
    pub outcome: Outcome,
    pub request: RequestSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureDetail>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ScenarioResult {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Passed
    }

    /// Highest severity carried by this result.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match &self.failure {
            Some(failure) => failure.severity(),
            None if !self.warnings.is_empty() => Severity::Warning,
            None => Severity::Info,
        }
    }

    /// `scenario[value]`, used in logs and reports
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}[{}]", self.scenario, self.value)
    }
}

/// Maximum body bytes kept in a response snapshot.
pub const MAX_BODY_BYTES: usize = 4096;

/// Truncate a body to `MAX_BODY_BYTES` on a char boundary.
#[must_use]
pub fn truncate_body(body: &str) -> Option<String> {
    if body.is_empty() {
        return None;
    }
    if body.len() <= MAX_BODY_BYTES {
        return Some(body.to_string());
    }
    let mut end = MAX_BODY_BYTES;
    while end > 0 && !body.is_char_boundary(end) {
        end -= 1;
    }
    Some(format!("{}…({} bytes total)", &body[..end], body.len()))
}
