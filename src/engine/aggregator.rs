// src/engine/aggregator.rs

//! Collects terminal outcomes as they happen and assembles the report.

use std::time::Duration;

use tracing::warn;

use crate::dag::GraphModel;
use crate::engine::report::{Outcome, RunReport, SkipReason, TaskReport};

/// Purely additive sink for terminal-status events.
#[derive(Debug, Clone)]
pub struct ResultAggregator {
    outcomes: Vec<Option<(Outcome, u32)>>,
}

impl ResultAggregator {
    pub fn new(task_count: usize) -> Self {
        Self {
            outcomes: vec![None; task_count],
        }
    }

    /// Record the terminal outcome of the task at `index`.
    ///
    /// The first record wins; a second one indicates a scheduler bug and is
    /// dropped.
    pub fn record(&mut self, index: usize, outcome: Outcome, attempts: u32) {
        let Some(slot) = self.outcomes.get_mut(index) else {
            warn!(index, "terminal outcome for unknown task index");
            return;
        };

        if let Some((existing, _)) = slot {
            warn!(
                index,
                existing = existing.label(),
                new = outcome.label(),
                "ignoring second terminal outcome for task"
            );
            return;
        }

        *slot = Some((outcome, attempts));
    }

    /// Produce the report, one entry per task in declaration order.
    pub fn finish(self, graph: &GraphModel, duration: Duration, aborted: bool) -> RunReport {
        let tasks = self
            .outcomes
            .into_iter()
            .enumerate()
            .map(|(i, entry)| {
                let (outcome, attempts) =
                    entry.unwrap_or((Outcome::Skipped(SkipReason::Unreachable), 0));
                TaskReport {
                    id: graph.id_at(i).to_string(),
                    outcome,
                    attempts,
                }
            })
            .collect();

        RunReport {
            tasks,
            duration,
            aborted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::{build, TaskDeclaration};
    use crate::exec::work_fn;

    #[test]
    fn first_record_wins_and_order_follows_declarations() {
        let graph = build(vec![
            TaskDeclaration::new("x", work_fn(|| async { Ok(String::new()) })),
            TaskDeclaration::new("y", work_fn(|| async { Ok(String::new()) })),
        ])
        .unwrap();

        let mut agg = ResultAggregator::new(graph.len());
        agg.record(1, Outcome::Cancelled, 0);
        agg.record(0, Outcome::Succeeded("ok".into()), 1);
        agg.record(0, Outcome::Cancelled, 0);

        let report = agg.finish(&graph, Duration::ZERO, false);
        assert_eq!(report.tasks[0].id, "x");
        assert_eq!(report.tasks[0].outcome, Outcome::Succeeded("ok".into()));
        assert_eq!(report.tasks[0].attempts, 1);
        assert_eq!(report.tasks[1].outcome, Outcome::Cancelled);
    }
}
