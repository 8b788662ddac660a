use std::str::FromStr;
use serde::Deserialize;

/// Canonical task identifier type used throughout the crate.
pub type TaskId = String;

/// What the run does once a task has failed for good.
///
/// - `BestEffort`: only the failed task's transitive dependents are skipped;
///   unrelated branches keep running (default behaviour).
/// - `FailFast`: no new task is started, in-flight work drains, and every task
///   that has not started is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    #[default]
    BestEffort,
    FailFast,
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "best-effort" => Ok(RunMode::BestEffort),
            "fail-fast" => Ok(RunMode::FailFast),
            other => Err(format!(
                "invalid run mode: {other} (expected \"best-effort\" or \"fail-fast\")"
            )),
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::BestEffort => f.write_str("best-effort"),
            RunMode::FailFast => f.write_str("fail-fast"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_spellings() {
        assert_eq!("fail-fast".parse::<RunMode>(), Ok(RunMode::FailFast));
        assert_eq!(" Fail_Fast ".parse::<RunMode>(), Ok(RunMode::FailFast));
        assert_eq!("best-effort".parse::<RunMode>(), Ok(RunMode::BestEffort));
        assert!("sometimes".parse::<RunMode>().is_err());
    }

    #[test]
    fn default_is_best_effort() {
        assert_eq!(RunMode::default(), RunMode::BestEffort);
    }
}
