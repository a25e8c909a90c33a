//! Verdict policy - turns scenario results into a pass/fail decision

use super::{ScenarioResult, Severity};

/// Policy for judging a run
#[derive(Debug, Clone)]
pub struct VerdictPolicy {
    /// Strict mode: warnings fail the run
    pub strict: bool,
    /// Scenario names whose failures are reported but never fail the run
    pub allow_failures: Vec<String>,
}

impl Default for VerdictPolicy {
    fn default() -> Self {
        Self {
            strict: true,
            allow_failures: vec![],
        }
    }
}

impl VerdictPolicy {
    /// Create a lenient policy (warnings don't fail)
    #[must_use]
    pub fn lenient() -> Self {
        Self {
            strict: false,
            ..Default::default()
        }
    }

    fn counts(&self, result: &ScenarioResult) -> bool {
        !self.allow_failures.iter().any(|s| *s == result.scenario)
    }

    /// Highest exit code among the counted results, 0 when all passed.
    #[must_use]
    pub fn exit_code(&self, results: &[ScenarioResult]) -> i32 {
        results
            .iter()
            .filter(|r| self.counts(r))
            .map(|r| r.severity().exit_code(self.strict))
            .max()
            .unwrap_or(0)
    }

    /// Decide the verdict for a whole run.
    ///
    /// An empty run fails: no scenario means nothing was checked.
    #[must_use]
    pub fn verdict(&self, results: &[ScenarioResult]) -> Verdict {
        if results.is_empty() {
            return Verdict {
                status: VerdictStatus::Fail,
                exit_code: 3,
                reason: "No scenarios were run".to_string(),
            };
        }

        let exit_code = self.exit_code(results);
        let status = if exit_code == 0 {
            VerdictStatus::Pass
        } else {
            VerdictStatus::Fail
        };

        let failed = results.iter().filter(|r| !r.passed()).count();
        let warned = results
            .iter()
            .filter(|r| r.severity() == Severity::Warning)
            .count();
        let transport = results
            .iter()
            .filter(|r| r.severity() == Severity::Critical)
            .count();

        let reason = if failed == 0 && warned == 0 {
            format!("All {} scenarios passed", results.len())
        } else {
            let mut parts = Vec::new();
            if failed > 0 {
                parts.push(format!("{failed} of {} scenarios failed", results.len()));
            }
            if transport > 0 {
                parts.push(format!("{transport} unreachable"));
            }
            if warned > 0 {
                parts.push(format!("{warned} warnings"));
            }
            parts.join(", ")
        };

        Verdict {
            status,
            exit_code,
            reason,
        }
    }
}

/// Final verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub status: VerdictStatus,
    pub exit_code: i32,
    pub reason: String,
}

/// Pass or fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictStatus {
    Pass,
    Fail,
}

impl std::fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
        }
    }
}
