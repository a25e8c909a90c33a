//! Run configuration for contract testing

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::assertion::Comparison;

/// Run configuration: target, session parameters, test values and scenarios.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Contract document path (the CLI flag takes precedence)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<PathBuf>,

    /// Base URL of the API under test
    pub base_url: String,

    /// HTTP headers sent with every request (API keys, etc.)
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// HTTP basic auth credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<BasicAuth>,

    /// Accept self-signed certificates (local targets)
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// Request timeout in seconds (transport default when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Named test case groups: group name → ordered values
    #[serde(default)]
    pub test_cases: BTreeMap<String, Vec<String>>,

    /// Scenarios, executed in declaration order
    #[serde(default)]
    pub scenarios: Vec<ScenarioDef>,
}

/// HTTP basic auth credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicAuth {
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
}

/// How the test value reaches the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamStyle {
    /// `GET endpoint?param=value`
    Query,
    /// `GET endpoint/{value}`
    Path,
}

/// One declared assertion. The expected value is always the test value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionDef {
    /// Attribute of each returned resource
    pub attribute: String,
    /// Comparison strategy
    pub comparison: Comparison,
}

/// A declared scenario: one endpoint checked against every value of a group.
///
/// ```toml
/// [[scenarios]]
/// name = "valid_account_index_query"
/// endpoint = "account-indexes"
/// resource = "AccountIndexResource"
/// expected_status = 200
/// style = "query"
/// param = "accountIndexCode"
/// group = "valid_account_index_query"
/// nullable_fields = ["terminationDate"]
/// assertions = [{ attribute = "accountIndexCode", comparison = "starts_with_ci" }]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioDef {
    pub name: String,

    /// Endpoint path template, relative to `base_url`
    pub endpoint: String,

    /// Resource schema name in the contract document
    pub resource: String,

    /// Expected HTTP status code
    pub expected_status: u16,

    #[serde(default = "default_style")]
    pub style: ParamStyle,

    /// Query parameter carrying the test value (query style only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,

    /// Test case group supplying the values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    /// Inline values, used only when `group` is absent
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,

    /// Static query parameters added to every request
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, String>,

    /// Fields allowed to be absent or null
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub nullable_fields: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<AssertionDef>,

    /// Warn when a collection response comes back empty
    #[serde(default)]
    pub expect_matches: bool,
}

const fn default_style() -> ParamStyle {
    ParamStyle::Query
}

impl ScenarioDef {
    /// Check the definition is self-consistent.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "scenario for '{}' has an empty name",
                self.endpoint
            )));
        }
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "scenario '{}': endpoint is empty",
                self.name
            )));
        }
        if self.style == ParamStyle::Query && self.param.is_none() {
            return Err(ConfigError::Invalid(format!(
                "scenario '{}': query style requires `param`",
                self.name
            )));
        }
        if self.group.is_none() && self.values.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "scenario '{}': needs a `group` or inline `values`",
                self.name
            )));
        }
        if !(100..=599).contains(&self.expected_status) {
            return Err(ConfigError::Invalid(format!(
                "scenario '{}': expected_status {} is not an HTTP status",
                self.name, self.expected_status
            )));
        }
        Ok(())
    }
}

impl RunConfig {
    /// Load config from file (JSON when the extension is `.json`, TOML otherwise)
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;
        parse_by_extension(path, &content)
    }

    /// Check required fields and every scenario definition.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` on the first inconsistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url is empty".into()));
        }
        let mut names = BTreeSet::new();
        for scenario in &self.scenarios {
            scenario.validate()?;
            if !names.insert(scenario.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate scenario name '{}'",
                    scenario.name
                )));
            }
        }
        Ok(())
    }

    /// Copy of the config with credentials replaced, safe to persist.
    #[must_use]
    pub fn masked(&self) -> Self {
        let mut masked = self.clone();
        if let Some(auth) = masked.auth.as_mut() {
            if auth.password.is_some() {
                auth.password = Some(MASK.to_string());
            }
        }
        for (key, value) in &mut masked.headers {
            if is_sensitive_header(key) {
                *value = MASK.to_string();
            }
        }
        masked
    }

    /// Starter config reproducing the finance API checks
    pub fn example() -> &'static str {
        r#"# apiconform configuration

# Contract document (overridden by --contract)
contract = "openapi.yaml"

# API under test
base_url = "https://localhost:8080/api/v1/finance"

# Self-signed certificate on a local target
accept_invalid_certs = true

# timeout_secs = 30

# [auth]
# username = "client-id"
# password = "client-secret"

# [headers]
# X-API-Key = "your-api-key"

[test_cases]
valid_account_index_query = ["ENG", "eng26"]
invalid_account_index_query = ["", "ENG!"]
valid_account_index_path = ["ENG261"]
invalid_account_index_path = ["NOPE999"]
valid_activity_code_query = ["AB", "ab1"]
invalid_activity_code_query = [""]
valid_activity_code_path = ["AB1234"]
non_existing_activity_code_path = ["does-not-exist"]

[[scenarios]]
name = "valid_account_index_query"
endpoint = "account-indexes"
resource = "AccountIndexResource"
expected_status = 200
style = "query"
param = "accountIndexCode"
group = "valid_account_index_query"
expect_matches = true
nullable_fields = ["terminationDate", "accountCode", "accountTitle", "activityCode", "activityTitle", "locationCode", "locationTitle"]
assertions = [{ attribute = "accountIndexCode", comparison = "starts_with_ci" }]

[[scenarios]]
name = "invalid_account_index_query"
endpoint = "account-indexes"
resource = "ErrorObject"
expected_status = 400
style = "query"
param = "accountIndexCode"
group = "invalid_account_index_query"

[[scenarios]]
name = "valid_account_index_path"
endpoint = "account-indexes/{accountIndexCode}"
resource = "AccountIndexResource"
expected_status = 200
style = "path"
group = "valid_account_index_path"
nullable_fields = ["terminationDate", "accountCode", "accountTitle", "activityCode", "activityTitle", "locationCode", "locationTitle"]
assertions = [{ attribute = "accountIndexCode", comparison = "equals" }]

[[scenarios]]
name = "invalid_account_index_path"
endpoint = "account-indexes/{accountIndexCode}"
resource = "ErrorObject"
expected_status = 404
style = "path"
group = "invalid_account_index_path"

[[scenarios]]
name = "valid_activity_code_query"
endpoint = "activity-codes"
resource = "ActivityCodeResource"
expected_status = 200
style = "query"
param = "activityCode"
group = "valid_activity_code_query"
nullable_fields = ["terminationDate"]
assertions = [{ attribute = "activityCode", comparison = "starts_with_ci" }]

[[scenarios]]
name = "invalid_activity_code_query"
endpoint = "activity-codes"
resource = "ErrorObject"
expected_status = 400
style = "query"
param = "activityCode"
group = "invalid_activity_code_query"

[[scenarios]]
name = "valid_activity_code_path"
endpoint = "activity-codes/{activityCode}"
resource = "ActivityCodeResource"
expected_status = 200
style = "path"
group = "valid_activity_code_path"
nullable_fields = ["terminationDate"]
assertions = [{ attribute = "activityCode", comparison = "equals" }]

[[scenarios]]
name = "non_existing_activity_code_path"
endpoint = "activity-codes/{activityCode}"
resource = "ErrorObject"
expected_status = 404
style = "path"
group = "non_existing_activity_code_path"
"#
    }
}

/// Parse TOML or JSON, chosen by the file extension.
pub(crate) fn parse_by_extension<T: serde::de::DeserializeOwned>(
    path: &Path,
    content: &str,
) -> Result<T, ConfigError> {
    if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    } else {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

/// Headers whose values never leave the process unmasked.
const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "x-api-key",
    "x-auth-token",
    "cookie",
    "proxy-authorization",
];

const MASK: &str = "***";

/// Returns true if the header name is a known credential header (case-insensitive).
pub fn is_sensitive_header(name: &str) -> bool {
    SENSITIVE_HEADERS
        .iter()
        .any(|&h| name.eq_ignore_ascii_case(h))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {0}: {1}")]
    Io(PathBuf, String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Missing test case group '{0}'")]
    MissingGroup(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
