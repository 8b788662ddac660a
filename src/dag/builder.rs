// src/dag/builder.rs

//! Construction of a [`GraphModel`] from a flat declaration list.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::dag::graph::{Adjacency, GraphModel, Task};
use crate::errors::BuildError;
use crate::exec::Work;
use crate::types::TaskId;

/// One entry of the declarative task list.
#[derive(Clone)]
pub struct TaskDeclaration {
    pub id: TaskId,
    pub depends_on: Vec<TaskId>,
    pub work: Arc<dyn Work>,
    pub retries: u32,
    pub timeout: Option<Duration>,
}

impl TaskDeclaration {
    pub fn new(id: impl Into<TaskId>, work: Arc<dyn Work>) -> Self {
        Self {
            id: id.into(),
            depends_on: Vec::new(),
            work,
            retries: 0,
            timeout: None,
        }
    }

    pub fn depends_on(mut self, dep: impl Into<TaskId>) -> Self {
        self.depends_on.push(dep.into());
        self
    }

    pub fn depends_on_all<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskId>,
    {
        self.depends_on.extend(deps.into_iter().map(Into::into));
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl fmt::Debug for TaskDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDeclaration")
            .field("id", &self.id)
            .field("depends_on", &self.depends_on)
            .field("retries", &self.retries)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Build a graph from declarations, checking referential integrity.
///
/// - Duplicate ids are rejected with [`BuildError::DuplicateTask`].
/// - Dependencies on undeclared ids are rejected with
///   [`BuildError::UnknownDependency`].
///
/// Cycles are *not* checked here; run [`validate`](crate::dag::validate) on
/// the result before executing it.
pub fn build<I>(declarations: I) -> Result<GraphModel, BuildError>
where
    I: IntoIterator<Item = TaskDeclaration>,
{
    let declarations: Vec<TaskDeclaration> = declarations.into_iter().collect();

    // First pass: register ids in declaration order.
    let mut index: HashMap<TaskId, usize> = HashMap::with_capacity(declarations.len());
    for (i, decl) in declarations.iter().enumerate() {
        if index.insert(decl.id.clone(), i).is_some() {
            return Err(BuildError::DuplicateTask(decl.id.clone()));
        }
    }

    // Second pass: resolve edges into forward and reverse adjacency.
    let mut adjacency = vec![Adjacency::default(); declarations.len()];
    let mut tasks = Vec::with_capacity(declarations.len());

    for (i, decl) in declarations.into_iter().enumerate() {
        let mut depends_on: Vec<TaskId> = Vec::with_capacity(decl.depends_on.len());

        for dep in decl.depends_on {
            let Some(&dep_idx) = index.get(&dep) else {
                return Err(BuildError::UnknownDependency {
                    task: decl.id,
                    dependency: dep,
                });
            };
            if adjacency[i].deps.contains(&dep_idx) {
                debug!(task = %decl.id, dep = %dep, "ignoring repeated dependency");
                continue;
            }
            adjacency[i].deps.push(dep_idx);
            adjacency[dep_idx].dependents.push(i);
            depends_on.push(dep);
        }

        tasks.push(Task {
            id: decl.id,
            depends_on,
            work: decl.work,
            retries: decl.retries,
            timeout: decl.timeout,
        });
    }

    debug!(tasks = tasks.len(), "task graph built");

    Ok(GraphModel {
        tasks,
        index,
        adjacency,
    })
}

impl GraphModel {
    /// [`build`] followed by [`validate`](crate::dag::validate).
    pub fn build_validated<I>(declarations: I) -> crate::errors::Result<GraphModel>
    where
        I: IntoIterator<Item = TaskDeclaration>,
    {
        let graph = build(declarations)?;
        crate::dag::validate(&graph)?;
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::work_fn;

    fn decl(id: &str) -> TaskDeclaration {
        TaskDeclaration::new(id, work_fn(|| async { Ok(String::new()) }))
    }

    #[test]
    fn builds_forward_and_reverse_edges() {
        let graph = build(vec![
            decl("A"),
            decl("B").depends_on("A"),
            decl("C").depends_on("A"),
            decl("D").depends_on_all(["B", "C"]),
        ])
        .unwrap();

        assert_eq!(graph.len(), 4);
        assert_eq!(graph.dependents_of("A"), vec!["B", "C"]);
        assert_eq!(graph.dependencies_of("D"), vec!["B", "C"]);
        assert_eq!(graph.roots().collect::<Vec<_>>(), vec!["A"]);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = build(vec![decl("A"), decl("B"), decl("A")]).unwrap_err();
        assert_eq!(err, BuildError::DuplicateTask("A".into()));
    }

    #[test]
    fn rejects_unknown_dependency() {
        let err = build(vec![decl("A").depends_on("ghost")]).unwrap_err();
        assert_eq!(
            err,
            BuildError::UnknownDependency {
                task: "A".into(),
                dependency: "ghost".into()
            }
        );
    }

    #[test]
    fn forward_references_are_allowed() {
        let graph = build(vec![decl("B").depends_on("A"), decl("A")]).unwrap();
        assert_eq!(graph.dependencies_of("B"), vec!["A"]);
    }

    #[test]
    fn repeated_dependency_is_collapsed() {
        let graph = build(vec![decl("A"), decl("B").depends_on("A").depends_on("A")]).unwrap();
        assert_eq!(graph.dependencies_of("B"), vec!["A"]);
        assert_eq!(graph.dependents_of("A"), vec!["B"]);
        assert_eq!(graph.task("B").unwrap().depends_on, vec!["A".to_string()]);
    }
}
