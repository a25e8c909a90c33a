//! apiconform-core: Core types for API contract testing
//!
//! This crate holds the run configuration, the test case registry, request
//! and response envelopes, assertion logic, and the verdict types that decide
//! whether a run passed.

pub mod assertion;
pub mod config;
pub mod envelope;
pub mod plan;
pub mod registry;
pub mod report;
pub mod reproduce;
pub mod verdict;

pub use assertion::{AssertionOutcome, AssertionSpec, Comparison, Mismatch};
pub use config::{AssertionDef, BasicAuth, ConfigError, ParamStyle, RunConfig, ScenarioDef};
pub use envelope::{EnvelopeError, RequestSpec, ResourceData, ResponseEnvelope};
pub use plan::{RunPlan, ScenarioPlan, Validation, ValidationStatus};
pub use registry::{TestCaseGroup, TestCaseRegistry};
pub use report::{RunReport, generate_schema};
pub use reproduce::to_http_file;
pub use verdict::{
    FailureDetail, Outcome, Phase, RequestSnapshot, ResponseSnapshot, ScenarioResult, Severity,
    Verdict, VerdictPolicy, VerdictStatus, Violation, ViolationKind,
};
