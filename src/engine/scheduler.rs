// src/engine/scheduler.rs

//! Pure scheduling state machine.
//!
//! The scheduler never awaits anything and owns no Tokio types: it takes a
//! [`RunContext`] by `&mut` for every transition, so each call is one
//! exclusive critical section. The async [`Executor`](crate::exec::Executor)
//! is a thin IO shell that feeds attempt results into [`Scheduler::complete`]
//! and starts whatever [`Scheduler::next_ready`] hands out.
//!
//! Being synchronous, the whole protocol can be exercised step by step in
//! tests without a runtime.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::dag::GraphModel;
use crate::engine::context::{RunContext, TaskStatus};
use crate::engine::policy::FailurePolicy;
use crate::engine::report::{Outcome, RunReport, SkipReason};
use crate::exec::{Work, WorkResult};
use crate::types::TaskId;

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

/// A task handed to a worker for one attempt.
#[derive(Clone)]
pub struct Dispatch<'g> {
    pub index: usize,
    pub id: &'g str,
    /// 1-based attempt number.
    pub attempt: u32,
    pub work: Arc<dyn Work>,
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for Dispatch<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatch")
            .field("index", &self.index)
            .field("id", &self.id)
            .field("attempt", &self.attempt)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Structured result of a single [`Scheduler::complete`] call.
///
/// Useful for tests that step the run manually and assert on what changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionStep {
    /// Tasks that became `Ready` as a result of this completion.
    pub newly_ready: Vec<TaskId>,
    /// The completed task failed but was re-enqueued under its retry budget.
    pub retried: bool,
    /// Tasks newly marked `Skipped` by the failure cascade.
    pub newly_skipped: Vec<TaskId>,
    /// Tasks newly marked `Cancelled` because this completion aborted the run.
    pub newly_cancelled: Vec<TaskId>,
    /// This completion set the run-level abort flag.
    pub aborted_run: bool,
    /// Nothing is ready and nothing is running any more.
    pub run_finished: bool,
}

/// Drives one or more runs over a shared, read-only graph.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler<'g> {
    graph: &'g GraphModel,
    policy: FailurePolicy,
}

impl<'g> Scheduler<'g> {
    pub fn new(graph: &'g GraphModel, policy: FailurePolicy) -> Self {
        Self { graph, policy }
    }

    pub fn graph(&self) -> &'g GraphModel {
        self.graph
    }

    /// Create the context of a fresh run and seed the ready queue with every
    /// task that has no dependencies, in declaration order.
    pub fn start_run(&self) -> RunContext {
        let run_id = NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed);
        let mut ctx = RunContext::new(self.graph, run_id);

        for i in 0..self.graph.len() {
            if ctx.unsatisfied[i] == 0 {
                self.promote(&mut ctx, i);
            }
        }

        info!(
            run_id,
            tasks = self.graph.len(),
            ready = ctx.ready.len(),
            mode = %self.policy.mode(),
            "starting run"
        );
        ctx
    }

    /// Read-only view of a task's status in this run.
    pub fn status_of(&self, ctx: &RunContext, id: &str) -> Option<TaskStatus> {
        let &i = self.graph.index.get(id)?;
        ctx.status.get(i).copied()
    }

    /// Take the next `Ready` task and mark it `Running`.
    ///
    /// Returns `None` when the queue is empty or the run was aborted.
    pub fn next_ready(&self, ctx: &mut RunContext) -> Option<Dispatch<'g>> {
        if ctx.aborted {
            return None;
        }

        while let Some(i) = ctx.ready.pop_front() {
            if ctx.status[i] != TaskStatus::Ready {
                debug!(run_id = ctx.run_id, task = %self.graph.id_at(i), "dropping stale ready entry");
                continue;
            }

            ctx.status[i] = TaskStatus::Running;
            ctx.running += 1;
            ctx.attempts[i] += 1;

            let task = self.graph.task_at(i);
            debug!(
                run_id = ctx.run_id,
                task = %task.id,
                attempt = ctx.attempts[i],
                "dependencies satisfied; marking Running"
            );

            return Some(Dispatch {
                index: i,
                id: task.id.as_str(),
                attempt: ctx.attempts[i],
                work: Arc::clone(&task.work),
                timeout: task.timeout,
            });
        }

        None
    }

    /// Apply the result of one attempt of the task at `index`.
    ///
    /// Success promotes dependents whose last dependency this was. Failure
    /// either re-enqueues the task (retry budget left) or finalizes it and
    /// skips every not-yet-started transitive dependent before returning, so
    /// no worker can observe a dependent in between.
    pub fn complete(&self, ctx: &mut RunContext, index: usize, result: WorkResult) -> CompletionStep {
        let mut step = CompletionStep::default();

        if ctx.status.get(index) != Some(&TaskStatus::Running) {
            warn!(
                run_id = ctx.run_id,
                index,
                status = ?ctx.status.get(index),
                "completion for task that is not running; ignoring"
            );
            step.run_finished = self.is_finished(ctx);
            return step;
        }

        ctx.running -= 1;
        let id = self.graph.id_at(index);
        let attempts = ctx.attempts[index];

        match result {
            Ok(output) => {
                ctx.status[index] = TaskStatus::Succeeded;
                ctx.results.record(index, Outcome::Succeeded(output), attempts);
                info!(run_id = ctx.run_id, task = %id, attempts, "task succeeded");

                for &d in self.graph.dependents_at(index) {
                    if ctx.status[d] != TaskStatus::Pending {
                        continue;
                    }
                    ctx.unsatisfied[d] -= 1;
                    if ctx.unsatisfied[d] == 0 {
                        self.promote(ctx, d);
                        step.newly_ready.push(self.graph.id_at(d).to_string());
                    }
                }
            }
            Err(err) if self.policy.should_retry(ctx.retries_left[index], ctx.aborted) => {
                ctx.retries_left[index] -= 1;
                warn!(
                    run_id = ctx.run_id,
                    task = %id,
                    attempt = attempts,
                    retries_left = ctx.retries_left[index],
                    error = %err,
                    "task attempt failed; retrying"
                );
                self.promote(ctx, index);
                step.retried = true;
            }
            Err(err) => {
                warn!(
                    run_id = ctx.run_id,
                    task = %id,
                    attempts,
                    error = %err,
                    fault = err.is_fault(),
                    "task failed; skipping dependents in this run"
                );
                ctx.status[index] = TaskStatus::Failed;
                ctx.results.record(index, Outcome::Failed(err), attempts);

                step.newly_skipped = self.cascade_skip(ctx, index);

                if self.policy.on_terminal(TaskStatus::Failed).abort_run && !ctx.aborted {
                    ctx.aborted = true;
                    step.aborted_run = true;
                    step.newly_cancelled = self.cancel_not_started(ctx);
                    warn!(
                        run_id = ctx.run_id,
                        task = %id,
                        cancelled = step.newly_cancelled.len(),
                        still_running = ctx.running,
                        "fail-fast: aborting run"
                    );
                }
            }
        }

        step.run_finished = self.is_finished(ctx);
        step
    }

    /// The run is over when nothing is queued and nothing is in flight.
    pub fn is_finished(&self, ctx: &RunContext) -> bool {
        ctx.running == 0 && ctx.ready.is_empty()
    }

    /// Consume the context and produce the report.
    ///
    /// Any task still `Pending` here means its dependencies could never be
    /// satisfied, which cannot happen for a validated graph; it is reported
    /// as skipped so that every entry is terminal.
    pub fn finish(&self, mut ctx: RunContext, duration: Duration) -> RunReport {
        for i in 0..self.graph.len() {
            if !ctx.status[i].is_terminal() {
                error!(
                    run_id = ctx.run_id,
                    task = %self.graph.id_at(i),
                    status = ?ctx.status[i],
                    "task not terminal at end of run"
                );
                ctx.status[i] = TaskStatus::Skipped;
                ctx.results
                    .record(i, Outcome::Skipped(SkipReason::Unreachable), ctx.attempts[i]);
            }
        }

        info!(
            run_id = ctx.run_id,
            succeeded = ctx.count(TaskStatus::Succeeded),
            failed = ctx.count(TaskStatus::Failed),
            skipped = ctx.count(TaskStatus::Skipped),
            cancelled = ctx.count(TaskStatus::Cancelled),
            aborted = ctx.aborted,
            elapsed_ms = duration.as_millis() as u64,
            "run finished"
        );

        ctx.results.finish(self.graph, duration, ctx.aborted)
    }

    /// Mark `index` as `Ready` and append it to the queue.
    fn promote(&self, ctx: &mut RunContext, index: usize) {
        ctx.status[index] = TaskStatus::Ready;
        ctx.ready.push_back(index);
    }

    /// Skip every transitive dependent of `failed` that has not started.
    fn cascade_skip(&self, ctx: &mut RunContext, failed: usize) -> Vec<TaskId> {
        let root = self.graph.id_at(failed);
        let mut stack: Vec<usize> = self.graph.dependents_at(failed).to_vec();
        let mut skipped = Vec::new();
        let mut dequeued = false;

        while let Some(d) = stack.pop() {
            if !ctx.status[d].is_not_started() {
                continue;
            }
            dequeued |= ctx.status[d] == TaskStatus::Ready;
            ctx.status[d] = TaskStatus::Skipped;
            ctx.results.record(
                d,
                Outcome::Skipped(SkipReason::DependencyFailed(root.to_string())),
                ctx.attempts[d],
            );
            debug!(
                run_id = ctx.run_id,
                task = %self.graph.id_at(d),
                upstream = %root,
                "marking dependent Skipped due to upstream failure"
            );
            skipped.push(self.graph.id_at(d).to_string());
            stack.extend(self.graph.dependents_at(d).iter().copied());
        }

        if dequeued {
            ctx.ready.retain(|&i| ctx.status[i] == TaskStatus::Ready);
        }

        skipped
    }

    /// Cancel every `Pending` or `Ready` task and empty the queue.
    fn cancel_not_started(&self, ctx: &mut RunContext) -> Vec<TaskId> {
        let mut cancelled = Vec::new();

        for i in 0..self.graph.len() {
            if ctx.status[i].is_not_started() {
                ctx.status[i] = TaskStatus::Cancelled;
                ctx.results.record(i, Outcome::Cancelled, ctx.attempts[i]);
                cancelled.push(self.graph.id_at(i).to_string());
            }
        }
        ctx.ready.clear();

        cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::{build, TaskDeclaration};
    use crate::errors::TaskError;
    use crate::exec::work_fn;
    use crate::types::RunMode;

    fn decl(id: &str, deps: &[&str]) -> TaskDeclaration {
        TaskDeclaration::new(id, work_fn(|| async { Ok(String::new()) }))
            .depends_on_all(deps.iter().copied())
    }

    fn diamond() -> GraphModel {
        build(vec![
            decl("A", &[]),
            decl("B", &["A"]),
            decl("C", &["A"]),
            decl("D", &["B", "C"]),
        ])
        .unwrap()
    }

    fn ok() -> WorkResult {
        Ok("ok".to_string())
    }

    fn fail() -> WorkResult {
        Err(TaskError::execution("boom"))
    }

    fn take(s: &Scheduler<'_>, ctx: &mut RunContext) -> usize {
        s.next_ready(ctx).expect("a ready task").index
    }

    #[test]
    fn initial_ready_set_is_the_roots() {
        let graph = build(vec![decl("A", &[]), decl("B", &["A"]), decl("C", &[])]).unwrap();
        let s = Scheduler::new(&graph, FailurePolicy::default());
        let mut ctx = s.start_run();

        assert_eq!(s.status_of(&ctx, "A"), Some(TaskStatus::Ready));
        assert_eq!(s.status_of(&ctx, "B"), Some(TaskStatus::Pending));
        assert_eq!(s.next_ready(&mut ctx).unwrap().id, "A");
        assert_eq!(s.next_ready(&mut ctx).unwrap().id, "C");
        assert!(s.next_ready(&mut ctx).is_none());
    }

    #[test]
    fn dependent_waits_for_all_dependencies() {
        let graph = diamond();
        let s = Scheduler::new(&graph, FailurePolicy::default());
        let mut ctx = s.start_run();

        let a = take(&s, &mut ctx);
        let step = s.complete(&mut ctx, a, ok());
        assert_eq!(step.newly_ready, vec!["B", "C"]);

        let b = take(&s, &mut ctx);
        let c = take(&s, &mut ctx);
        let step = s.complete(&mut ctx, b, ok());
        assert!(step.newly_ready.is_empty());
        assert_eq!(s.status_of(&ctx, "D"), Some(TaskStatus::Pending));

        let step = s.complete(&mut ctx, c, ok());
        assert_eq!(step.newly_ready, vec!["D"]);

        let d = take(&s, &mut ctx);
        let step = s.complete(&mut ctx, d, ok());
        assert!(step.run_finished);

        let report = s.finish(ctx, Duration::ZERO);
        assert!(report.is_success());
    }

    #[test]
    fn failure_skips_dependents_but_not_siblings() {
        let graph = diamond();
        let s = Scheduler::new(&graph, FailurePolicy::default());
        let mut ctx = s.start_run();

        let a = take(&s, &mut ctx);
        s.complete(&mut ctx, a, ok());
        let b = take(&s, &mut ctx);
        let c = take(&s, &mut ctx);

        let step = s.complete(&mut ctx, b, fail());
        assert_eq!(step.newly_skipped, vec!["D"]);
        assert!(!step.aborted_run);
        assert!(!step.run_finished);

        let step = s.complete(&mut ctx, c, ok());
        assert!(step.newly_ready.is_empty());
        assert!(step.run_finished);

        let report = s.finish(ctx, Duration::ZERO);
        assert!(report.outcome("C").unwrap().is_succeeded());
        assert_eq!(
            report.outcome("D"),
            Some(&Outcome::Skipped(SkipReason::DependencyFailed("B".into())))
        );
    }

    #[test]
    fn cascade_is_transitive() {
        let graph = build(vec![decl("A", &[]), decl("B", &["A"]), decl("C", &["B"])]).unwrap();
        let s = Scheduler::new(&graph, FailurePolicy::default());
        let mut ctx = s.start_run();

        let a = take(&s, &mut ctx);
        let mut step = s.complete(&mut ctx, a, fail());
        step.newly_skipped.sort();
        assert_eq!(step.newly_skipped, vec!["B", "C"]);

        let report = s.finish(ctx, Duration::ZERO);
        assert_eq!(
            report.outcome("C"),
            Some(&Outcome::Skipped(SkipReason::DependencyFailed("A".into())))
        );
        assert_eq!(report.attempts("C"), Some(0));
    }

    #[test]
    fn retry_requeues_until_budget_is_spent() {
        let graph = build(vec![decl("A", &[]).retries(2)]).unwrap();
        let s = Scheduler::new(&graph, FailurePolicy::default());
        let mut ctx = s.start_run();

        for expected_attempt in 1..=2 {
            let d = s.next_ready(&mut ctx).unwrap();
            assert_eq!(d.attempt, expected_attempt);
            let step = s.complete(&mut ctx, d.index, fail());
            assert!(step.retried);
            assert_eq!(s.status_of(&ctx, "A"), Some(TaskStatus::Ready));
        }

        let d = s.next_ready(&mut ctx).unwrap();
        assert_eq!(d.attempt, 3);
        let step = s.complete(&mut ctx, d.index, fail());
        assert!(!step.retried);
        assert!(step.run_finished);

        let report = s.finish(ctx, Duration::ZERO);
        assert_eq!(report.attempts("A"), Some(3));
        assert!(report.outcome("A").unwrap().is_failed());
    }

    #[test]
    fn fail_fast_cancels_not_started_and_lets_running_drain() {
        let graph = build(vec![decl("x", &[]), decl("y", &[]), decl("z", &[])]).unwrap();
        let s = Scheduler::new(&graph, FailurePolicy::new(RunMode::FailFast));
        let mut ctx = s.start_run();

        // Two workers: x and y start, z stays queued.
        let x = take(&s, &mut ctx);
        let y = take(&s, &mut ctx);

        let step = s.complete(&mut ctx, x, fail());
        assert!(step.aborted_run);
        assert_eq!(step.newly_cancelled, vec!["z"]);
        assert!(!step.run_finished);
        assert!(s.next_ready(&mut ctx).is_none());

        let step = s.complete(&mut ctx, y, ok());
        assert!(step.run_finished);

        let report = s.finish(ctx, Duration::ZERO);
        assert!(report.aborted);
        assert!(report.outcome("y").unwrap().is_succeeded());
        assert_eq!(report.outcome("z"), Some(&Outcome::Cancelled));
        assert_eq!(report.abort_error().unwrap().failed, vec!["x".to_string()]);
    }

    #[test]
    fn no_retry_after_abort() {
        let graph = build(vec![decl("x", &[]), decl("y", &[]).retries(5)]).unwrap();
        let s = Scheduler::new(&graph, FailurePolicy::new(RunMode::FailFast));
        let mut ctx = s.start_run();

        let x = take(&s, &mut ctx);
        let y = take(&s, &mut ctx);
        s.complete(&mut ctx, x, fail());

        let step = s.complete(&mut ctx, y, fail());
        assert!(!step.retried);
        assert!(step.run_finished);

        let report = s.finish(ctx, Duration::ZERO);
        assert_eq!(report.attempts("y"), Some(1));
        assert_eq!(report.failed(), vec!["x", "y"]);
    }

    #[test]
    fn stray_completion_is_ignored() {
        let graph = build(vec![decl("A", &[]), decl("B", &["A"])]).unwrap();
        let s = Scheduler::new(&graph, FailurePolicy::default());
        let mut ctx = s.start_run();

        let step = s.complete(&mut ctx, 1, ok());
        assert_eq!(step, CompletionStep::default());
        assert_eq!(s.status_of(&ctx, "B"), Some(TaskStatus::Pending));
    }

    #[test]
    fn cyclic_graph_leaves_unreachable_tasks() {
        // Bypasses the validation gate on purpose.
        let graph = build(vec![decl("A", &["B"]), decl("B", &["A"]), decl("C", &[])]).unwrap();
        let s = Scheduler::new(&graph, FailurePolicy::default());
        let mut ctx = s.start_run();

        let c = take(&s, &mut ctx);
        let step = s.complete(&mut ctx, c, ok());
        assert!(step.run_finished);

        let report = s.finish(ctx, Duration::ZERO);
        assert_eq!(report.outcome("A"), Some(&Outcome::Skipped(SkipReason::Unreachable)));
    }
}
