//! Run report: the machine-readable record of a suite run
//!
//! Written by the CLI as JSON; `generate_schema` exports its JSON Schema so
//! CI tooling can consume reports without depending on this crate.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::verdict::{ScenarioResult, Severity};

/// Everything a run produced, in execution order.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RunReport {
    /// Contract dialect: `swagger2` or `openapi3`
    pub dialect: String,
    /// Contract document path
    pub contract: String,
    pub base_url: String,
    /// Scenario cases executed
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
    /// Passed cases carrying a warning
    pub warnings: u64,
    pub results: Vec<ScenarioResult>,
}

impl RunReport {
    #[must_use]
    pub fn new(
        dialect: impl Into<String>,
        contract: impl Into<String>,
        base_url: impl Into<String>,
        results: Vec<ScenarioResult>,
    ) -> Self {
        let total = results.len() as u64;
        let passed = results.iter().filter(|r| r.passed()).count() as u64;
        let warnings = results
            .iter()
            .filter(|r| r.severity() == Severity::Warning)
            .count() as u64;
        Self {
            dialect: dialect.into(),
            contract: contract.into(),
            base_url: base_url.into(),
            total,
            passed,
            failed: total - passed,
            warnings,
            results,
        }
    }

    /// Failed results only.
    pub fn failures(&self) -> impl Iterator<Item = &ScenarioResult> {
        self.results.iter().filter(|r| !r.passed())
    }
}

/// Generate JSON Schema for the report format.
#[must_use]
pub fn generate_schema() -> String {
    let schema = schemars::schema_for!(RunReport);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
