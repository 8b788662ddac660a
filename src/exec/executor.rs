// src/exec/executor.rs

//! Bounded-parallelism executor.
//!
//! The executor is the async IO shell around the pure
//! [`Scheduler`](crate::engine::Scheduler): it owns the run's
//! [`RunContext`](crate::engine::RunContext), keeps at most `concurrency`
//! worker slots busy, and feeds every finished attempt back into the
//! scheduler. All status transitions happen on this single coordinator loop,
//! so the ready queue, the dependency counters and the status map are never
//! touched concurrently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::{AbortHandle, Id, JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::dag::GraphModel;
use crate::engine::{FailurePolicy, RunReport, Scheduler};
use crate::errors::TaskError;
use crate::exec::work::{panic_message, Work, WorkResult};
use crate::types::RunMode;

/// Options of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Maximum number of tasks running at the same time (>= 1).
    pub concurrency: usize,
    pub mode: RunMode,
}

impl RunOptions {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency,
            mode: RunMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Runs validated graphs to completion.
#[derive(Debug, Clone)]
pub struct Executor {
    options: RunOptions,
}

impl Executor {
    pub fn new(mut options: RunOptions) -> Self {
        if options.concurrency == 0 {
            warn!("concurrency of 0 requested; using 1");
            options.concurrency = 1;
        }
        Self { options }
    }

    pub fn options(&self) -> RunOptions {
        self.options
    }

    /// Execute every task of `graph` and report per-task outcomes.
    ///
    /// The graph must have passed [`validate`](crate::dag::validate). Task
    /// failures never surface as an error here; they are part of the report.
    pub async fn run(&self, graph: &GraphModel) -> RunReport {
        let started = Instant::now();
        let scheduler = Scheduler::new(graph, FailurePolicy::new(self.options.mode));
        let mut ctx = scheduler.start_run();
        let run_id = ctx.run_id();

        // One entry per occupied worker slot, keyed back to its task index.
        let mut workers: JoinSet<WorkResult> = JoinSet::new();
        let mut slots: HashMap<Id, usize> = HashMap::new();

        loop {
            while workers.len() < self.options.concurrency {
                let Some(dispatch) = scheduler.next_ready(&mut ctx) else {
                    break;
                };

                info!(
                    run_id,
                    task = %dispatch.id,
                    attempt = dispatch.attempt,
                    "starting task attempt"
                );

                let id = dispatch.id.to_string();
                let work = dispatch.work;
                let timeout = dispatch.timeout;
                let handle = workers.spawn(run_attempt(id, work, timeout));
                slots.insert(handle.id(), dispatch.index);
            }

            let Some(joined) = workers.join_next_with_id().await else {
                break;
            };

            let Some((index, result)) = settle(joined, &mut slots) else {
                error!(run_id, "worker slot finished for an unknown task; ignoring");
                continue;
            };

            let step = scheduler.complete(&mut ctx, index, result);
            debug!(
                run_id,
                ?step,
                running = ctx.running(),
                ready = ctx.ready_len(),
                aborted = ctx.is_aborted(),
                "attempt completed"
            );
        }

        scheduler.finish(ctx, started.elapsed())
    }
}

/// Convenience wrapper: `Executor::new(options).run(graph)`.
pub async fn run(graph: &GraphModel, options: RunOptions) -> RunReport {
    Executor::new(options).run(graph).await
}

/// Map a joined worker slot back to its task.
///
/// A slot that failed to join (panicked outside the attempt, or was
/// cancelled) still completes its task, as a fault.
fn settle(
    joined: Result<(Id, WorkResult), JoinError>,
    slots: &mut HashMap<Id, usize>,
) -> Option<(usize, WorkResult)> {
    match joined {
        Ok((id, result)) => slots.remove(&id).map(|index| (index, result)),
        Err(err) => {
            let index = slots.remove(&err.id())?;
            error!(index, error = %err, "worker slot terminated unexpectedly");
            let msg = if err.is_panic() {
                panic_message(err.into_panic())
            } else {
                err.to_string()
            };
            Some((index, Err(TaskError::Fault(msg))))
        }
    }
}

/// Aborts the attempt's task when the owning slot goes away.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run one attempt of a unit of work on its own Tokio task.
///
/// A panic inside the work becomes [`TaskError::Fault`]; running past the
/// deadline aborts the attempt and yields [`TaskError::Timeout`]. Dropping
/// this future (for instance because the whole run was dropped) aborts the
/// attempt too.
async fn run_attempt(id: String, work: Arc<dyn Work>, timeout: Option<Duration>) -> WorkResult {
    let mut handle = tokio::spawn(async move { work.run().await });
    let _abort = AbortOnDrop(handle.abort_handle());

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
            Ok(joined) => joined,
            Err(_elapsed) => {
                warn!(task = %id, timeout = ?limit, "task attempt exceeded its deadline; aborted");
                return Err(TaskError::Timeout(limit));
            }
        },
        None => handle.await,
    };

    match joined {
        Ok(result) => result,
        Err(err) if err.is_panic() => {
            let msg = panic_message(err.into_panic());
            error!(task = %id, panic = %msg, "task attempt panicked");
            Err(TaskError::Fault(msg))
        }
        Err(err) => Err(TaskError::Fault(err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::{build, TaskDeclaration};
    use crate::engine::Outcome;
    use crate::exec::work_fn;

    #[tokio::test]
    async fn zero_concurrency_is_clamped() {
        let exec = Executor::new(RunOptions::new(0));
        assert_eq!(exec.options().concurrency, 1);
    }

    #[tokio::test]
    async fn empty_graph_finishes_immediately() {
        let graph = build(Vec::new()).unwrap();
        let report = run(&graph, RunOptions::default()).await;
        assert!(report.tasks.is_empty());
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn output_is_carried_into_report() {
        let graph = build(vec![TaskDeclaration::new(
            "hello",
            work_fn(|| async { Ok("world".to_string()) }),
        )])
        .unwrap();

        let report = run(&graph, RunOptions::default()).await;
        assert_eq!(report.outcome("hello"), Some(&Outcome::Succeeded("world".into())));
        assert_eq!(report.attempts("hello"), Some(1));
    }

    #[tokio::test]
    async fn slot_lost_to_a_panic_still_completes_its_task() {
        let mut workers: JoinSet<WorkResult> = JoinSet::new();
        let mut slots = HashMap::new();
        let handle = workers.spawn(async {
            let lost = true;
            if lost {
                panic!("slot lost");
            }
            Ok(String::new())
        });
        slots.insert(handle.id(), 7);

        let joined = workers.join_next_with_id().await.unwrap();
        let (index, result) = settle(joined, &mut slots).unwrap();

        assert_eq!(index, 7);
        assert_eq!(result, Err(TaskError::Fault("slot lost".into())));
        assert!(slots.is_empty());
    }

    #[tokio::test]
    async fn unknown_slot_is_ignored() {
        let mut workers: JoinSet<WorkResult> = JoinSet::new();
        workers.spawn(async { Ok(String::new()) });

        let joined = workers.join_next_with_id().await.unwrap();
        assert!(settle(joined, &mut HashMap::new()).is_none());
    }

    #[tokio::test]
    async fn dropping_a_run_aborts_in_flight_attempts() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        let graph = build(vec![TaskDeclaration::new(
            "long",
            work_fn(move || {
                let flag = Arc::clone(&flag);
                async move {
                    tokio::time::sleep(Duration::from_millis(150)).await;
                    flag.store(true, Ordering::SeqCst);
                    Ok(String::new())
                }
            }),
        )])
        .unwrap();

        let dropped = tokio::time::timeout(
            Duration::from_millis(20),
            run(&graph, RunOptions::default()),
        )
        .await;
        assert!(dropped.is_err());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn timeout_is_reported_as_failure() {
        let graph = build(vec![
            TaskDeclaration::new(
                "slow",
                work_fn(|| async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(String::new())
                }),
            )
            .timeout(Duration::from_millis(20)),
        ])
        .unwrap();

        let report = run(&graph, RunOptions::default()).await;
        assert_eq!(
            report.outcome("slow"),
            Some(&Outcome::Failed(TaskError::Timeout(Duration::from_millis(20))))
        );
    }
}
