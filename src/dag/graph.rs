// src/dag/graph.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::exec::Work;
use crate::types::TaskId;

/// A declared task as stored in the graph.
///
/// Immutable once built; per-run status lives in
/// [`RunContext`](crate::engine::RunContext).
#[derive(Clone)]
pub struct Task {
    pub id: TaskId,
    /// Direct dependencies, in declaration order.
    pub depends_on: Vec<TaskId>,
    pub work: Arc<dyn Work>,
    /// How many extra attempts a failed task gets.
    pub retries: u32,
    /// Deadline for a single attempt.
    pub timeout: Option<Duration>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("depends_on", &self.depends_on)
            .field("retries", &self.retries)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Internal node structure: stores immediate deps and dependents as indices.
#[derive(Debug, Clone, Default)]
pub(crate) struct Adjacency {
    /// Tasks that must succeed before this one can run.
    pub(crate) deps: Vec<usize>,
    /// Tasks that depend on this one.
    pub(crate) dependents: Vec<usize>,
}

/// In-memory task graph.
///
/// Tasks keep their declaration order; index `i` everywhere in the engine
/// refers to the `i`-th declared task. Built by
/// [`build`](crate::dag::build), which guarantees unique ids and no dangling
/// edges. Acyclicity is established separately by
/// [`validate`](crate::dag::validate).
///
/// The graph is read-only and can be shared by any number of concurrent runs.
#[derive(Debug, Clone)]
pub struct GraphModel {
    pub(crate) tasks: Vec<Task>,
    pub(crate) index: HashMap<TaskId, usize>,
    pub(crate) adjacency: Vec<Adjacency>,
}

impl GraphModel {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Return all task ids in declaration order.
    pub fn task_ids(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|t| t.id.as_str())
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.index.get(id).map(|&i| &self.tasks[i])
    }

    /// Immediate dependencies of a task.
    pub fn dependencies_of(&self, id: &str) -> Vec<&str> {
        self.index
            .get(id)
            .map(|&i| self.names(&self.adjacency[i].deps))
            .unwrap_or_default()
    }

    /// Immediate dependents of a task (tasks that list this one as a dependency).
    pub fn dependents_of(&self, id: &str) -> Vec<&str> {
        self.index
            .get(id)
            .map(|&i| self.names(&self.adjacency[i].dependents))
            .unwrap_or_default()
    }

    /// Tasks with no dependencies.
    pub fn roots(&self) -> impl Iterator<Item = &str> {
        self.tasks
            .iter()
            .zip(&self.adjacency)
            .filter(|(_, adj)| adj.deps.is_empty())
            .map(|(t, _)| t.id.as_str())
    }

    pub(crate) fn task_at(&self, index: usize) -> &Task {
        &self.tasks[index]
    }

    pub(crate) fn id_at(&self, index: usize) -> &str {
        &self.tasks[index].id
    }

    pub(crate) fn deps_at(&self, index: usize) -> &[usize] {
        &self.adjacency[index].deps
    }

    pub(crate) fn dependents_at(&self, index: usize) -> &[usize] {
        &self.adjacency[index].dependents
    }

    fn names(&self, indices: &[usize]) -> Vec<&str> {
        indices.iter().map(|&i| self.id_at(i)).collect()
    }
}
