//! apiconform-runner: contract resolution, validation and scenario execution

pub mod contract;
pub mod dispatch;
pub mod scenario;
pub mod validate;

pub use contract::{ContractDocument, ContractError, Dialect, ResourceSchema, resolve};
pub use dispatch::{Session, TransportError, dispatch};
pub use scenario::{PreparedCase, RunnerError, ScenarioRunner, Suite, plan};
