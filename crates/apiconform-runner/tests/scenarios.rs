//! End-to-end scenario runs against an in-process finance API.

mod common;

use std::path::PathBuf;

use apiconform_core::config::{ConfigError, RunConfig};
use apiconform_core::plan::ValidationStatus;
use apiconform_core::verdict::{FailureDetail, Outcome, Phase, Severity, VerdictPolicy};
use apiconform_runner::contract::ContractError;
use apiconform_runner::{RunnerError, Suite};

use common::{Behaviour, FINANCE_OPENAPI, dead_base_url, spawn_api, write};

const TEST_CASES: &str = r#"
[test_cases]
valid_account_index_query = ["ENG", "eng26"]
invalid_account_index_query = ["invalid_account_index_query", ""]
valid_account_index_path = ["ENG261"]
invalid_account_index_path = ["NOPE999"]
valid_activity_code_query = ["AB", "ab1"]
valid_activity_code_path = ["AB1234"]
non_existing_activity_code_path = ["does-not-exist"]
missing_termination_date = ["ENG300"]
no_matches = ["ZZZ"]
retired_codes = []
"#;

const ACCOUNT_NULLABLE: &str = r#"nullable_fields = ["terminationDate"]"#;

fn scenario(
    name: &str,
    endpoint: &str,
    resource: &str,
    status: u16,
    style: &str,
    group: &str,
    extra: &str,
) -> String {
    format!(
        r#"
[[scenarios]]
name = "{name}"
endpoint = "{endpoint}"
resource = "{resource}"
expected_status = {status}
style = "{style}"
group = "{group}"
{extra}
"#
    )
}

fn config(base_url: &str, scenarios: &[String]) -> RunConfig {
    let text = format!(
        "base_url = \"{base_url}\"\n{TEST_CASES}\n{}",
        scenarios.concat()
    );
    toml::from_str(&text).unwrap()
}

fn contract() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "openapi.yaml", FINANCE_OPENAPI);
    (dir, path)
}

fn finance_scenarios() -> Vec<String> {
    vec![
        scenario(
            "valid_account_index_query",
            "account-indexes",
            "AccountIndexResource",
            200,
            "query",
            "valid_account_index_query",
            &format!(
                "param = \"accountIndexCode\"\nexpect_matches = true\n{ACCOUNT_NULLABLE}\nassertions = [{{ attribute = \"accountIndexCode\", comparison = \"starts_with_ci\" }}]"
            ),
        ),
        scenario(
            "invalid_account_index_query",
            "account-indexes",
            "ErrorObject",
            400,
            "query",
            "invalid_account_index_query",
            "param = \"accountIndexCode\"",
        ),
        scenario(
            "valid_account_index_path",
            "account-indexes/{accountIndexCode}",
            "AccountIndexResource",
            200,
            "path",
            "valid_account_index_path",
            "assertions = [{ attribute = \"accountIndexCode\", comparison = \"equals\" }]",
        ),
        scenario(
            "invalid_account_index_path",
            "account-indexes/{accountIndexCode}",
            "ErrorObject",
            404,
            "path",
            "invalid_account_index_path",
            "",
        ),
        scenario(
            "valid_activity_code_query",
            "activity-codes",
            "ActivityCodeResource",
            200,
            "query",
            "valid_activity_code_query",
            "param = \"activityCode\"\nassertions = [{ attribute = \"activityCode\", comparison = \"starts_with_ci\" }]",
        ),
        scenario(
            "valid_activity_code_path",
            "activity-codes/{activityCode}",
            "ActivityCodeResource",
            200,
            "path",
            "valid_activity_code_path",
            "assertions = [{ attribute = \"activityCode\", comparison = \"equals\" }]",
        ),
        scenario(
            "non_existing_activity_code_path",
            "activity-codes/{activityCode}",
            "ErrorObject",
            404,
            "path",
            "non_existing_activity_code_path",
            "",
        ),
    ]
}

#[test]
fn conforming_api_passes_every_scenario() {
    let api = spawn_api(Behaviour::Conforming);
    let (_dir, contract) = contract();
    let config = config(&api.base_url, &finance_scenarios());

    let suite = Suite::setup(&config, &contract).unwrap();
    let results = suite.runner().run(&config.scenarios).unwrap();

    assert_eq!(results.len(), 10);
    for result in &results {
        assert!(result.passed(), "{} failed: {:?}", result.label(), result.failure);
        assert_eq!(result.phase, Phase::Asserting);
        assert!(result.warnings.is_empty());
    }
    assert_eq!(api.hits(), 10);
    assert_eq!(VerdictPolicy::default().verdict(&results).exit_code, 0);
}

#[test]
fn results_follow_declaration_order() {
    let api = spawn_api(Behaviour::Conforming);
    let (_dir, contract) = contract();
    let config = config(&api.base_url, &finance_scenarios());

    let suite = Suite::setup(&config, &contract).unwrap();
    let results = suite.runner().run(&config.scenarios).unwrap();
    let labels: Vec<String> = results.iter().take(4).map(|r| r.label()).collect();
    assert_eq!(
        labels,
        vec![
            "valid_account_index_query[ENG]",
            "valid_account_index_query[eng26]",
            "invalid_account_index_query[invalid_account_index_query]",
            "invalid_account_index_query[]",
        ]
    );
}

#[test]
fn query_prefix_matches_every_returned_record() {
    let api = spawn_api(Behaviour::Conforming);
    let (_dir, contract) = contract();
    let config = config(&api.base_url, &finance_scenarios()[..1]);

    let suite = Suite::setup(&config, &contract).unwrap();
    let results = suite.runner().run(&config.scenarios).unwrap();
    let first = &results[0];
    assert!(first.passed());
    assert!(first.request.url.ends_with("/api/account-indexes?accountIndexCode=ENG"));
    let body = first.response.as_ref().unwrap().body.as_deref().unwrap();
    assert!(body.contains("ENG261") && body.contains("eng26A"));
    assert!(!body.contains("BUS100"));
}

#[test]
fn filter_regression_is_assertion_failure() {
    let api = spawn_api(Behaviour::Regressed);
    let (_dir, contract) = contract();
    let config = config(&api.base_url, &finance_scenarios()[..1]);

    let suite = Suite::setup(&config, &contract).unwrap();
    let results = suite.runner().run(&config.scenarios).unwrap();
    let result = &results[0];
    assert_eq!(result.outcome, Outcome::Failed);
    assert_eq!(result.phase, Phase::Asserting);
    let Some(FailureDetail::AssertionMismatch { mismatches }) = &result.failure else {
        panic!("expected assertion mismatch, got {:?}", result.failure);
    };
    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0].index, Some(3));
    assert_eq!(mismatches[0].actual.as_deref(), Some("BUS100"));
    assert_eq!(VerdictPolicy::default().verdict(&results).exit_code, 1);
}

#[test]
fn omitted_nullable_field_still_validates() {
    let api = spawn_api(Behaviour::Conforming);
    let (_dir, contract) = contract();
    let lenient = scenario(
        "termination_optional",
        "account-indexes/{accountIndexCode}",
        "AccountIndexResource",
        200,
        "path",
        "missing_termination_date",
        ACCOUNT_NULLABLE,
    );
    let strict = scenario(
        "termination_required",
        "account-indexes/{accountIndexCode}",
        "AccountIndexResource",
        200,
        "path",
        "missing_termination_date",
        "",
    );
    let config = config(&api.base_url, &[lenient, strict]);

    let suite = Suite::setup(&config, &contract).unwrap();
    let results = suite.runner().run(&config.scenarios).unwrap();
    assert!(results[0].passed());

    assert_eq!(results[1].phase, Phase::Validating);
    let Some(FailureDetail::SchemaViolations { resource, violations }) = &results[1].failure else {
        panic!("expected schema violations, got {:?}", results[1].failure);
    };
    assert_eq!(resource, "AccountIndexResource");
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].path, "/data/attributes");
}

#[test]
fn unexpected_status_skips_validation() {
    let api = spawn_api(Behaviour::Conforming);
    let (_dir, contract) = contract();
    let s = scenario(
        "expects_found",
        "account-indexes/{accountIndexCode}",
        "AccountIndexResource",
        200,
        "path",
        "invalid_account_index_path",
        "",
    );
    let config = config(&api.base_url, &[s]);

    let suite = Suite::setup(&config, &contract).unwrap();
    let results = suite.runner().run(&config.scenarios).unwrap();
    let result = &results[0];
    assert_eq!(result.phase, Phase::Dispatching);
    assert_eq!(
        result.failure,
        Some(FailureDetail::StatusMismatch {
            expected: 200,
            actual: 404
        })
    );
    assert_eq!(result.response.as_ref().unwrap().status_code, 404);
}

#[test]
fn empty_result_warns_when_matches_expected() {
    let api = spawn_api(Behaviour::Conforming);
    let (_dir, contract) = contract();
    let s = scenario(
        "no_matches",
        "account-indexes",
        "AccountIndexResource",
        200,
        "query",
        "no_matches",
        "param = \"accountIndexCode\"\nexpect_matches = true\nassertions = [{ attribute = \"accountIndexCode\", comparison = \"starts_with_ci\" }]",
    );
    let config = config(&api.base_url, &[s]);

    let suite = Suite::setup(&config, &contract).unwrap();
    let results = suite.runner().run(&config.scenarios).unwrap();
    let result = &results[0];
    assert!(result.passed());
    assert_eq!(result.severity(), Severity::Warning);
    assert_eq!(result.warnings, vec!["no records returned for 'ZZZ'"]);

    assert_eq!(VerdictPolicy::default().verdict(&results).exit_code, 1);
    assert_eq!(VerdictPolicy::lenient().verdict(&results).exit_code, 0);
}

#[test]
fn unreachable_target_fails_each_case_without_aborting() {
    let (_dir, contract) = contract();
    let config = config(&dead_base_url(), &finance_scenarios()[2..4]);

    let suite = Suite::setup(&config, &contract).unwrap();
    let results = suite.runner().run(&config.scenarios).unwrap();
    assert_eq!(results.len(), 2);
    for result in &results {
        assert_eq!(result.phase, Phase::Dispatching);
        assert!(matches!(result.failure, Some(FailureDetail::Transport { .. })));
        assert_eq!(result.severity(), Severity::Critical);
        assert!(result.response.is_none());
    }
    assert_eq!(VerdictPolicy::default().verdict(&results).exit_code, 2);
}

#[test]
fn missing_group_aborts_before_any_request() {
    let api = spawn_api(Behaviour::Conforming);
    let (_dir, contract) = contract();
    let mut scenarios = finance_scenarios();
    scenarios.push(scenario(
        "orphan",
        "activity-codes",
        "ActivityCodeResource",
        200,
        "query",
        "no_such_group",
        "param = \"activityCode\"",
    ));
    let config = config(&api.base_url, &scenarios);

    let suite = Suite::setup(&config, &contract).unwrap();
    let err = suite.runner().run(&config.scenarios).unwrap_err();
    assert!(matches!(
        err,
        RunnerError::Config(ConfigError::MissingGroup(ref g)) if g == "no_such_group"
    ));
    assert_eq!(api.hits(), 0);
}

#[test]
fn empty_group_aborts_before_any_request() {
    let api = spawn_api(Behaviour::Conforming);
    let (_dir, contract) = contract();
    let mut scenarios = finance_scenarios();
    scenarios.push(scenario(
        "retired",
        "activity-codes",
        "ActivityCodeResource",
        200,
        "query",
        "retired_codes",
        "param = \"activityCode\"",
    ));
    let config = config(&api.base_url, &scenarios);

    let suite = Suite::setup(&config, &contract).unwrap();
    let err = suite.runner().run(&config.scenarios).unwrap_err();
    assert!(matches!(
        err,
        RunnerError::Config(ConfigError::Invalid(ref m)) if m.contains("'retired'") && m.contains("empty")
    ));
    assert_eq!(api.hits(), 0);
}

#[test]
fn unknown_resource_aborts_before_any_request() {
    let api = spawn_api(Behaviour::Conforming);
    let (_dir, contract) = contract();
    let mut scenarios = finance_scenarios();
    scenarios.push(scenario(
        "funds",
        "fund-codes",
        "FundResource",
        200,
        "path",
        "valid_activity_code_path",
        "",
    ));
    let config = config(&api.base_url, &scenarios);

    let suite = Suite::setup(&config, &contract).unwrap();
    let err = suite.runner().run(&config.scenarios).unwrap_err();
    assert!(matches!(
        err,
        RunnerError::Contract(ContractError::UnknownResource(_))
    ));
    assert_eq!(api.hits(), 0);
}

#[test]
fn invalid_contract_aborts_setup() {
    let api = spawn_api(Behaviour::Conforming);
    let dir = tempfile::tempdir().unwrap();
    let contract = write(dir.path(), "events.yaml", "asyncapi: 2.6.0\n");
    let config = config(&api.base_url, &finance_scenarios());

    let err = Suite::setup(&config, &contract).unwrap_err();
    assert!(matches!(
        err,
        RunnerError::Contract(ContractError::UnsupportedSpecVersion(_))
    ));
}

#[test]
fn repeated_dispatch_is_idempotent() {
    let api = spawn_api(Behaviour::Conforming);
    let (_dir, contract) = contract();
    let config = config(&api.base_url, &finance_scenarios()[..1]);

    let suite = Suite::setup(&config, &contract).unwrap();
    let runner = suite.runner();
    let cases = runner.prepare(&config.scenarios).unwrap();
    let first = runner.run_case(&cases[0]);
    let second = runner.run_case(&cases[0]);

    assert!(first.passed());
    assert_eq!(first.outcome, second.outcome);
    assert_eq!(first.failure, second.failure);
    assert_eq!(first.request, second.request);
    let (a, b) = (first.response.unwrap(), second.response.unwrap());
    assert_eq!(a.status_code, b.status_code);
    assert_eq!(a.body, b.body);
}

#[test]
fn plan_checks_scenarios_against_contract() {
    let (_dir, contract_path) = contract();
    let mut scenarios = finance_scenarios();
    scenarios.push(scenario(
        "teapot",
        "account-indexes",
        "ErrorObject",
        418,
        "query",
        "invalid_account_index_query",
        "param = \"accountIndexCode\"",
    ));
    scenarios.push(scenario(
        "funds",
        "fund-codes",
        "FundResource",
        200,
        "path",
        "valid_activity_code_path",
        "",
    ));
    let config = config("http://localhost:8080/api", &scenarios);

    let contract = apiconform_runner::resolve(&contract_path).unwrap();
    let registry = apiconform_core::TestCaseRegistry::from_config(&config);
    let plan = apiconform_runner::plan(&config, &registry, &contract);

    assert_eq!(plan.scenarios.len(), 9);
    assert_eq!(plan.total_requests, 13);
    assert!(plan.has_errors());

    let messages = |status: ValidationStatus| -> Vec<String> {
        plan.validations
            .iter()
            .filter(|v| v.status == status)
            .map(|v| v.message.clone())
            .collect()
    };
    assert_eq!(
        messages(ValidationStatus::Error),
        vec!["scenario 'funds': Unknown resource 'FundResource'"]
    );
    let warnings = messages(ValidationStatus::Warning);
    assert!(warnings.iter().any(|m| m.contains("status 418 is not declared")));
    assert!(warnings.iter().any(|m| m.contains("GET fund-codes is not declared")));
}
