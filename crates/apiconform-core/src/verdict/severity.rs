//! Severity levels for scenario outcomes
//!
//! Severity decides the exit code of a run.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Outcome severity, ordered from harmless to run-breaking
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational (exit 0)
    Info,
    /// Suspicious but not a contract break, e.g. an empty result set (exit 0, or 1 if strict)
    Warning,
    /// Contract break: status, schema or assertion (exit 1)
    Error,
    /// The target could not be reached (exit 2)
    Critical,
}

impl Severity {
    /// Exit code for this severity; strict mode turns warnings into failures.
    #[must_use]
    pub const fn exit_code(self, strict: bool) -> i32 {
        match self {
            Self::Info => 0,
            Self::Warning if strict => 1,
            Self::Warning => 0,
            Self::Error => 1,
            Self::Critical => 2,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
