//! Verdict module - scenario results, severity, and policy

mod policy;
mod result;
mod severity;
mod violation;

pub use policy::{Verdict, VerdictPolicy, VerdictStatus};
pub use result::{
    FailureDetail, MAX_BODY_BYTES, Outcome, Phase, RequestSnapshot, ResponseSnapshot,
    ScenarioResult, truncate_body,
};
pub use severity::Severity;
pub use violation::{Violation, ViolationKind};
