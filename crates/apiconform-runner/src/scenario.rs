//! Scenario execution
//!
//! Setup (config validation, contract resolution, registry, session) happens
//! once in `Suite::setup`, and any failure there aborts the run. Each
//! (scenario, test value) pair then runs through
//! `Init → Dispatching → Validating → Asserting`, sequentially in declaration
//! order, stopping at the first failing phase. Per-case failures never stop
//! sibling cases.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use apiconform_core::assertion::AssertionSpec;
use apiconform_core::config::{ConfigError, ParamStyle, RunConfig, ScenarioDef};
use apiconform_core::envelope::{RequestSpec, ResourceData, ResponseEnvelope};
use apiconform_core::plan::{RunPlan, Validation, plan_scenarios};
use apiconform_core::registry::TestCaseRegistry;
use apiconform_core::verdict::{
    FailureDetail, Outcome, Phase, RequestSnapshot, ResponseSnapshot, ScenarioResult,
    truncate_body,
};

use crate::contract::{self, ContractDocument, ContractError};
use crate::dispatch::{Session, TransportError, dispatch};
use crate::validate::EnvelopeValidator;

/// Everything a run shares: resolved contract, test values, HTTP session.
///
/// Built once, read-only afterwards; dropping it releases the connection pool.
#[derive(Debug)]
pub struct Suite {
    pub contract: ContractDocument,
    pub registry: TestCaseRegistry,
    pub session: Session,
}

impl Suite {
    /// Validate the config, resolve the contract, build registry and session.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError` on any setup failure.
    pub fn setup(config: &RunConfig, contract_path: &Path) -> Result<Self, RunnerError> {
        config.validate()?;
        let contract = contract::resolve(contract_path)?;
        let registry = TestCaseRegistry::from_config(config);
        let session = Session::new(config)?;
        Ok(Self {
            contract,
            registry,
            session,
        })
    }

    #[must_use]
    pub fn runner(&self) -> ScenarioRunner<'_> {
        ScenarioRunner::new(&self.contract, &self.registry, &self.session)
    }
}

/// One (scenario, test value) pair, checked and ready to run.
#[derive(Debug, Clone)]
pub struct PreparedCase<'a> {
    pub scenario: &'a ScenarioDef,
    pub value: String,
    pub request: RequestSpec,
    pub assertions: Vec<AssertionSpec>,
    /// Compiled once per scenario, shared by its cases
    validator: Arc<EnvelopeValidator>,
}

/// Drives scenario cases through dispatch, validation and assertion.
#[derive(Debug, Clone, Copy)]
pub struct ScenarioRunner<'a> {
    contract: &'a ContractDocument,
    registry: &'a TestCaseRegistry,
    session: &'a Session,
}

impl<'a> ScenarioRunner<'a> {
    #[must_use]
    pub fn new(
        contract: &'a ContractDocument,
        registry: &'a TestCaseRegistry,
        session: &'a Session,
    ) -> Self {
        Self {
            contract,
            registry,
            session,
        }
    }

    /// Expand scenarios into cases, failing on any broken definition.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError` for an invalid scenario, a missing or empty test
    /// case group, or a resource the contract does not declare (or whose
    /// schema does not compile).
    pub fn prepare<'s>(&self, scenarios: &'s [ScenarioDef]) -> Result<Vec<PreparedCase<'s>>, RunnerError> {
        let mut cases = Vec::new();
        for scenario in scenarios {
            scenario.validate()?;
            let resource = self.contract.resource(&scenario.resource)?;
            let values = self.registry.values_for(scenario)?;
            if values.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "scenario '{}': test case group is empty",
                    scenario.name
                ))
                .into());
            }
            let validator = Arc::new(resource.compile(&scenario.nullable_fields)?);
            for value in values {
                cases.push(PreparedCase {
                    scenario,
                    value: value.clone(),
                    request: build_request(scenario, value),
                    assertions: scenario
                        .assertions
                        .iter()
                        .map(|a| AssertionSpec {
                            attribute: a.attribute.clone(),
                            comparison: a.comparison,
                            expected: value.clone(),
                        })
                        .collect(),
                    validator: Arc::clone(&validator),
                });
            }
        }
        Ok(cases)
    }

    /// Prepare and run every scenario; one result per case.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError` only for setup problems found by `prepare`;
    /// per-case failures are recorded in the results.
    pub fn run(&self, scenarios: &[ScenarioDef]) -> Result<Vec<ScenarioResult>, RunnerError> {
        let cases = self.prepare(scenarios)?;
        info!(cases = cases.len(), scenarios = scenarios.len(), "running scenarios");
        Ok(cases.iter().map(|case| self.run_case(case)).collect())
    }

    /// Run one case through its phases; the result records the last one entered.
    #[must_use]
    pub fn run_case(&self, case: &PreparedCase<'_>) -> ScenarioResult {
        let mut run = CaseRun::new(case);

        run.phase = Phase::Dispatching;
        run.request.url = self
            .session
            .url_for(&case.request)
            .map_or_else(|_| case.request.endpoint.clone(), |u| u.to_string());
        let envelope = match dispatch(self.session, &case.request) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(case = %run.label(), error = %e, "transport failure");
                return run.fail(FailureDetail::Transport {
                    message: e.to_string(),
                });
            }
        };
        run.capture(&envelope);

        if envelope.status != case.scenario.expected_status {
            return run.fail(FailureDetail::StatusMismatch {
                expected: case.scenario.expected_status,
                actual: envelope.status,
            });
        }

        run.phase = Phase::Validating;
        let violations = case.validator.validate(envelope.body.as_ref());
        if !violations.is_empty() {
            return run.fail(FailureDetail::SchemaViolations {
                resource: case.scenario.resource.clone(),
                violations,
            });
        }

        run.phase = Phase::Asserting;
        if let Some(data) = envelope
            .body
            .as_ref()
            .and_then(|b| ResourceData::from_body(b).ok())
        {
            if case.scenario.expect_matches && data.is_empty_collection() {
                let warning = format!("no records returned for '{}'", case.value);
                warn!(case = %run.label(), "{warning}");
                run.warnings.push(warning);
            }
            let mismatches: Vec<_> = case
                .assertions
                .iter()
                .flat_map(|a| a.evaluate(&data).mismatches)
                .collect();
            if !mismatches.is_empty() {
                return run.fail(FailureDetail::AssertionMismatch { mismatches });
            }
        }

        run.pass()
    }

    /// Dry-run plan: config checks plus checks against the contract.
    #[must_use]
    pub fn plan(&self, config: &RunConfig) -> RunPlan {
        plan(config, self.registry, self.contract)
    }
}

/// Dry-run plan without a session: nothing is sent.
#[must_use]
pub fn plan(config: &RunConfig, registry: &TestCaseRegistry, contract: &ContractDocument) -> RunPlan {
    let mut plan = plan_scenarios(config, registry);
    plan.validations.push(Validation::ok(
        "contract",
        format!(
            "contract: {} ({}, {} resources)",
            contract.path().display(),
            contract.dialect(),
            contract.resource_names().count()
        ),
    ));

    for scenario in &config.scenarios {
        if let Err(e) = contract.resource(&scenario.resource) {
            plan.validations.push(Validation::error(
                "resource",
                format!("scenario '{}': {e}", scenario.name),
            ));
        }
        match contract.operation(&scenario.endpoint) {
            None => plan.validations.push(Validation::warning(
                "endpoint",
                format!(
                    "scenario '{}': GET {} is not declared in the contract",
                    scenario.name, scenario.endpoint
                ),
            )),
            Some(op) if !op.statuses.contains(&scenario.expected_status) => {
                plan.validations.push(Validation::warning(
                    "status",
                    format!(
                        "scenario '{}': status {} is not declared for GET {}",
                        scenario.name, scenario.expected_status, op.path
                    ),
                ));
            }
            Some(_) => {}
        }
    }
    plan
}

fn build_request(scenario: &ScenarioDef, value: &str) -> RequestSpec {
    match scenario.style {
        ParamStyle::Path => RequestSpec {
            query: scenario.query.clone(),
            ..RequestSpec::path(&scenario.endpoint, value)
        },
        ParamStyle::Query => {
            let mut query = scenario.query.clone();
            if let Some(param) = &scenario.param {
                query.insert(param.clone(), value.to_string());
            }
            RequestSpec::query(&scenario.endpoint, query)
        }
    }
}

/// Mutable state of one case while it moves through its phases.
struct CaseRun<'c> {
    case: &'c PreparedCase<'c>,
    phase: Phase,
    request: RequestSnapshot,
    response: Option<ResponseSnapshot>,
    warnings: Vec<String>,
}

impl<'c> CaseRun<'c> {
    fn new(case: &'c PreparedCase<'c>) -> Self {
        Self {
            case,
            phase: Phase::Init,
            request: RequestSnapshot {
                method: "GET".into(),
                url: case.request.endpoint.clone(),
                query: case.request.query.clone(),
            },
            response: None,
            warnings: Vec::new(),
        }
    }

    fn label(&self) -> String {
        format!("{}[{}]", self.case.scenario.name, self.case.value)
    }

    fn capture(&mut self, envelope: &ResponseEnvelope) {
        self.response = Some(ResponseSnapshot {
            status_code: envelope.status,
            content_type: envelope.content_type.clone(),
            elapsed_ms: envelope.elapsed_ms,
            body: truncate_body(&envelope.raw_body),
        });
    }

    fn fail(self, failure: FailureDetail) -> ScenarioResult {
        info!(case = %self.label(), phase = ?self.phase, "FAIL: {}", failure.label());
        self.finish(Outcome::Failed, Some(failure))
    }

    fn pass(self) -> ScenarioResult {
        info!(case = %self.label(), "PASS");
        self.finish(Outcome::Passed, None)
    }

    fn finish(self, outcome: Outcome, failure: Option<FailureDetail>) -> ScenarioResult {
        ScenarioResult {
            scenario: self.case.scenario.name.clone(),
            endpoint: self.case.scenario.endpoint.clone(),
            value: self.case.value.clone(),
            expected_status: self.case.scenario.expected_status,
            phase: self.phase,
            outcome,
            request: self.request,
            response: self.response,
            failure,
            warnings: self.warnings,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error(transparent)]
    Contract(#[from] ContractError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
