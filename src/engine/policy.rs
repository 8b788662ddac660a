// src/engine/policy.rs

//! Failure policy consulted inline by the scheduler.

use crate::engine::context::TaskStatus;
use crate::types::RunMode;

/// What the run should do after a task reached a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PolicyDecision {
    /// Set the run-level abort flag: stop promoting tasks and cancel
    /// everything that has not started.
    pub abort_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FailurePolicy {
    mode: RunMode,
}

impl FailurePolicy {
    pub fn new(mode: RunMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Whether a failed attempt is re-enqueued instead of finalized.
    ///
    /// After an abort nothing is promoted to `Ready` again, retries included.
    pub fn should_retry(&self, retries_left: u32, aborted: bool) -> bool {
        retries_left > 0 && !aborted
    }

    pub fn on_terminal(&self, status: TaskStatus) -> PolicyDecision {
        let abort_run = match self.mode {
            RunMode::FailFast => status == TaskStatus::Failed,
            RunMode::BestEffort => false,
        };
        PolicyDecision { abort_run }
    }
}
