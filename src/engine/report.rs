// src/engine/report.rs

//! Final, per-task outcome of a run.

use std::fmt;
use std::time::Duration;

use crate::errors::{RunAbortedError, TaskError};
use crate::exec::TaskOutput;
use crate::types::TaskId;

/// Why a task was never started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The named upstream task failed (after exhausting its retries).
    DependencyFailed(TaskId),
    /// The task was still pending when the run ended. Only reachable with a
    /// graph that skipped [`validate`](crate::dag::validate).
    Unreachable,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::DependencyFailed(id) => write!(f, "dependency '{id}' failed"),
            SkipReason::Unreachable => f.write_str("dependencies never satisfied"),
        }
    }
}

/// Terminal outcome of one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded(TaskOutput),
    Failed(TaskError),
    Skipped(SkipReason),
    Cancelled,
}

impl Outcome {
    pub fn is_succeeded(&self) -> bool {
        matches!(self, Outcome::Succeeded(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    /// Short label used in logs and CLI output.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Succeeded(_) => "succeeded",
            Outcome::Failed(_) => "failed",
            Outcome::Skipped(_) => "skipped",
            Outcome::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub id: TaskId,
    pub outcome: Outcome,
    /// Number of times the unit of work was invoked.
    pub attempts: u32,
}

/// Tally of outcomes by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: usize,
}

/// Result of [`run`](crate::exec::run). Always produced, whatever the tasks
/// did; callers inspect outcomes instead of handling an error.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// One entry per task, in declaration order.
    pub tasks: Vec<TaskReport>,
    /// Wall-clock duration of the run.
    pub duration: Duration,
    /// Whether fail-fast stopped the run early.
    pub aborted: bool,
}

impl RunReport {
    pub fn get(&self, id: &str) -> Option<&TaskReport> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn outcome(&self, id: &str) -> Option<&Outcome> {
        self.get(id).map(|t| &t.outcome)
    }

    pub fn attempts(&self, id: &str) -> Option<u32> {
        self.get(id).map(|t| t.attempts)
    }

    pub fn succeeded(&self) -> Vec<&str> {
        self.ids_where(Outcome::is_succeeded)
    }

    pub fn failed(&self) -> Vec<&str> {
        self.ids_where(Outcome::is_failed)
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.ids_where(Outcome::is_skipped)
    }

    pub fn cancelled(&self) -> Vec<&str> {
        self.ids_where(Outcome::is_cancelled)
    }

    /// `true` iff every task succeeded.
    pub fn is_success(&self) -> bool {
        !self.aborted && self.tasks.iter().all(|t| t.outcome.is_succeeded())
    }

    pub fn counts(&self) -> OutcomeCounts {
        let mut counts = OutcomeCounts::default();
        for t in &self.tasks {
            match t.outcome {
                Outcome::Succeeded(_) => counts.succeeded += 1,
                Outcome::Failed(_) => counts.failed += 1,
                Outcome::Skipped(_) => counts.skipped += 1,
                Outcome::Cancelled => counts.cancelled += 1,
            }
        }
        counts
    }

    /// The early-termination error of a fail-fast run, if it was aborted.
    pub fn abort_error(&self) -> Option<RunAbortedError> {
        if !self.aborted {
            return None;
        }
        Some(RunAbortedError {
            failed: self.failed().into_iter().map(str::to_string).collect(),
            cancelled: self.counts().cancelled,
        })
    }

    fn ids_where(&self, pred: impl Fn(&Outcome) -> bool) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|t| pred(&t.outcome))
            .map(|t| t.id.as_str())
            .collect()
    }
}
