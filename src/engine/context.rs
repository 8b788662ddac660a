// src/engine/context.rs

//! Per-run mutable state.

use std::collections::VecDeque;

use crate::dag::GraphModel;
use crate::engine::aggregator::ResultAggregator;

/// Status of a task within one run.
///
/// Advances `Pending -> Ready -> Running -> terminal`. The only backwards
/// step is `Running -> Ready` when a failed attempt is retried. Terminal
/// states never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Waiting on at least one dependency.
    Pending,
    /// All dependencies succeeded; queued for a worker.
    Ready,
    /// An attempt is in flight.
    Running,
    Succeeded,
    Failed,
    /// Not started because an upstream task failed.
    Skipped,
    /// Not started because a fail-fast run was aborted.
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Skipped | TaskStatus::Cancelled
        )
    }

    /// Not yet handed to a worker.
    pub fn is_not_started(self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::Ready)
    }
}

/// State owned by exactly one run.
///
/// Indices refer to the graph's declaration order. The graph itself stays
/// untouched, so several `RunContext`s over the same graph can coexist.
#[derive(Debug)]
pub struct RunContext {
    /// Identifier used in log fields.
    pub(crate) run_id: u64,
    pub(crate) status: Vec<TaskStatus>,
    /// Dependencies of each task that have not succeeded yet.
    pub(crate) unsatisfied: Vec<usize>,
    pub(crate) retries_left: Vec<u32>,
    pub(crate) attempts: Vec<u32>,
    /// FIFO of `Ready` tasks.
    pub(crate) ready: VecDeque<usize>,
    /// Number of tasks currently `Running`.
    pub(crate) running: usize,
    /// Run-level abort flag (fail-fast).
    pub(crate) aborted: bool,
    pub(crate) results: ResultAggregator,
}

impl RunContext {
    pub(crate) fn new(graph: &GraphModel, run_id: u64) -> Self {
        let n = graph.len();
        Self {
            run_id,
            status: vec![TaskStatus::Pending; n],
            unsatisfied: (0..n).map(|i| graph.deps_at(i).len()).collect(),
            retries_left: (0..n).map(|i| graph.task_at(i).retries).collect(),
            attempts: vec![0; n],
            ready: VecDeque::new(),
            running: 0,
            aborted: false,
            results: ResultAggregator::new(n),
        }
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn running(&self) -> usize {
        self.running
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    /// Number of tasks currently in `status`.
    pub fn count(&self, status: TaskStatus) -> usize {
        self.status.iter().filter(|&&s| s == status).count()
    }
}
