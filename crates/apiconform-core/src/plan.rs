//! Dry-run plan types and config validation
//!
//! Describes what a run *would* do without sending any requests.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::{ParamStyle, RunConfig};
use crate::registry::TestCaseRegistry;

/// Complete dry-run plan: scenarios, request counts, and validations.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RunPlan {
    pub scenarios: Vec<ScenarioPlan>,
    /// Requests a real run would send
    pub total_requests: u64,
    pub validations: Vec<Validation>,
}

/// Execution plan for one scenario.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScenarioPlan {
    pub name: String,
    pub endpoint: String,
    pub resource: String,
    pub expected_status: u16,
    /// `query` or `path`
    pub style: String,
    /// Number of test values (0 when the group is missing)
    pub cases: u32,
    /// `attribute comparison` per assertion
    pub assertions: Vec<String>,
}

/// A validation check result.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Validation {
    pub check: String,
    pub status: ValidationStatus,
    pub message: String,
}

impl Validation {
    #[must_use]
    pub fn ok(check: &str, message: impl Into<String>) -> Self {
        Self::with_status(check, ValidationStatus::Ok, message)
    }

    #[must_use]
    pub fn warning(check: &str, message: impl Into<String>) -> Self {
        Self::with_status(check, ValidationStatus::Warning, message)
    }

    #[must_use]
    pub fn error(check: &str, message: impl Into<String>) -> Self {
        Self::with_status(check, ValidationStatus::Error, message)
    }

    fn with_status(check: &str, status: ValidationStatus, message: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            status,
            message: message.into(),
        }
    }
}

/// Status of a validation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Ok,
    Warning,
    Error,
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Patterns that suggest a placeholder value rather than a real credential.
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-token",
    "your_token",
    "your-api-key",
    "YOUR_API_KEY",
    "CHANGEME",
    "changeme",
    "placeholder",
    "replace-me",
    "REPLACE_ME",
];

/// Build the contract-independent part of a plan.
#[must_use]
pub fn plan_scenarios(config: &RunConfig, registry: &TestCaseRegistry) -> RunPlan {
    let mut validations = validate_config(config);
    let mut scenarios = Vec::new();
    let mut total_requests: u64 = 0;

    for scenario in &config.scenarios {
        if let Err(e) = scenario.validate() {
            validations.push(Validation::error("scenario", e.to_string()));
        }
        let cases = match registry.values_for(scenario) {
            Ok([]) => {
                validations.push(Validation::error(
                    "test_cases",
                    format!("scenario '{}': test case group is empty", scenario.name),
                ));
                0
            }
            Ok(values) => u32::try_from(values.len()).unwrap_or(u32::MAX),
            Err(e) => {
                validations.push(Validation::error(
                    "test_cases",
                    format!("scenario '{}': {e}", scenario.name),
                ));
                0
            }
        };
        if scenario.group.is_some() && !scenario.values.is_empty() {
            validations.push(Validation::warning(
                "test_cases",
                format!(
                    "scenario '{}': inline values ignored in favour of group",
                    scenario.name
                ),
            ));
        }
        total_requests += u64::from(cases);
        scenarios.push(ScenarioPlan {
            name: scenario.name.clone(),
            endpoint: scenario.endpoint.clone(),
            resource: scenario.resource.clone(),
            expected_status: scenario.expected_status,
            style: match scenario.style {
                ParamStyle::Query => "query".into(),
                ParamStyle::Path => "path".into(),
            },
            cases,
            assertions: scenario
                .assertions
                .iter()
                .map(|a| format!("{} {}", a.attribute, a.comparison))
                .collect(),
        });
    }

    if config.scenarios.is_empty() {
        validations.push(Validation::error("scenarios", "no scenarios declared"));
    }

    RunPlan {
        scenarios,
        total_requests,
        validations,
    }
}

/// Validate connection-level config.
#[must_use]
pub fn validate_config(config: &RunConfig) -> Vec<Validation> {
    let mut checks = Vec::new();

    if config.base_url.starts_with("http://") || config.base_url.starts_with("https://") {
        checks.push(Validation::ok(
            "base_url",
            format!("base_url: {}", config.base_url),
        ));
    } else {
        checks.push(Validation::error(
            "base_url",
            format!(
                "base_url: {} (missing http:// or https:// prefix)",
                config.base_url
            ),
        ));
    }

    if config.accept_invalid_certs {
        checks.push(Validation::warning(
            "tls",
            "accept_invalid_certs is on: certificates are not verified",
        ));
    }

    let credentials = config
        .headers
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .chain(
            config
                .auth
                .iter()
                .filter_map(|a| a.password.as_deref().map(|p| ("auth.password", p))),
        );
    for (key, value) in credentials {
        if value.contains('<') && value.contains('>') {
            checks.push(Validation::warning(
                "credentials",
                format!("{key}: contains '<...>' placeholder"),
            ));
        } else if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| value.contains(**p)) {
            checks.push(Validation::warning(
                "credentials",
                format!("{key}: contains '{pattern}', may be a placeholder"),
            ));
        }
    }

    checks
}

impl RunPlan {
    /// Format as human-readable terminal output.
    #[must_use]
    pub fn to_terminal(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!(
            "Dry run: {} scenarios, {} requests planned\n",
            self.scenarios.len(),
            self.total_requests,
        ));

        for s in &self.scenarios {
            lines.push(format!(
                "{} ({} cases): GET {} [{}] -> {} {}",
                s.name, s.cases, s.endpoint, s.style, s.expected_status, s.resource
            ));
            if !s.assertions.is_empty() {
                lines.push(format!("  Assertions: {}", s.assertions.join(", ")));
            }
        }

        lines.push(String::new());
        lines.push("Validation:".into());
        for v in &self.validations {
            lines.push(format!("  [{}] {}", v.status, v.message));
        }

        lines.join("\n")
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.validations
            .iter()
            .any(|v| v.status == ValidationStatus::Error)
    }

    #[must_use]
    pub fn has_warnings(&self) -> bool {
        self.validations
            .iter()
            .any(|v| v.status == ValidationStatus::Warning)
    }
}
