#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use taskdag::dag::{build, validate, GraphModel, TaskDeclaration};
use taskdag::exec::{work_fn, Work};

use crate::fake_work::{FakeWork, Recorder, Script};

/// Work that succeeds immediately with an empty output.
pub fn noop() -> Arc<dyn Work> {
    work_fn(|| async { Ok(String::new()) })
}

/// Declaration with no-op work.
pub fn decl(id: &str, deps: &[&str]) -> TaskDeclaration {
    TaskDeclaration::new(id, noop()).depends_on_all(deps.iter().copied())
}

/// Build a graph and run the cycle check; panics on either error.
pub fn graph(decls: Vec<TaskDeclaration>) -> GraphModel {
    let g = build(decls).expect("Failed to build graph from declarations");
    validate(&g).expect("Graph unexpectedly cyclic");
    g
}

/// Builder for graphs whose tasks are [`FakeWork`]s sharing one [`Recorder`].
///
/// Keeps a handle on every fake so tests can assert attempt counts.
pub struct FakeGraphBuilder {
    recorder: Recorder,
    decls: Vec<TaskDeclaration>,
    works: Vec<(String, Arc<FakeWork>)>,
}

impl FakeGraphBuilder {
    pub fn new() -> Self {
        Self {
            recorder: Recorder::new(),
            decls: Vec::new(),
            works: Vec::new(),
        }
    }

    pub fn task(self, id: &str, deps: &[&str]) -> Self {
        self.task_with(id, deps, |t| t)
    }

    pub fn failing(self, id: &str, deps: &[&str]) -> Self {
        self.task_with(id, deps, |t| t.script(Script::AlwaysFail))
    }

    pub fn slow(self, id: &str, deps: &[&str], delay: Duration) -> Self {
        self.task_with(id, deps, |t| t.delay(delay))
    }

    /// Add a task whose fake is customised by `f`.
    pub fn task_with(
        self,
        id: &str,
        deps: &[&str],
        f: impl FnOnce(FakeWork) -> FakeWork,
    ) -> Self {
        self.declare(id, deps, f, |d| d)
    }

    /// Add a task customising both the fake and the declaration
    /// (retries, timeout).
    pub fn declare(
        mut self,
        id: &str,
        deps: &[&str],
        f: impl FnOnce(FakeWork) -> FakeWork,
        g: impl FnOnce(TaskDeclaration) -> TaskDeclaration,
    ) -> Self {
        let work = f(FakeWork::new(id, &self.recorder)).shared();
        let decl = TaskDeclaration::new(id, work.clone() as Arc<dyn Work>)
            .depends_on_all(deps.iter().copied());
        self.decls.push(g(decl));
        self.works.push((id.to_string(), work));
        self
    }

    /// Finish building; returns the validated graph plus the fixture handles.
    pub fn build(self) -> (GraphModel, Fixture) {
        let g = graph(self.decls);
        (
            g,
            Fixture {
                recorder: self.recorder,
                works: self.works,
            },
        )
    }
}

impl Default for FakeGraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Handles on the fakes behind a graph built by [`FakeGraphBuilder`].
pub struct Fixture {
    pub recorder: Recorder,
    works: Vec<(String, Arc<FakeWork>)>,
}

impl Fixture {
    /// Number of times `id`'s work was invoked.
    pub fn attempts(&self, id: &str) -> u32 {
        self.works
            .iter()
            .find(|(name, _)| name == id)
            .map(|(_, w)| w.attempts())
            .unwrap_or_else(|| panic!("no fake work named '{id}'"))
    }
}

/// Builder for TOML task files.
pub struct TaskFileBuilder {
    run: Vec<String>,
    tasks: Vec<String>,
}

impl TaskFileBuilder {
    pub fn new() -> Self {
        Self {
            run: Vec::new(),
            tasks: Vec::new(),
        }
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.run.push(format!("concurrency = {n}"));
        self
    }

    pub fn mode(mut self, mode: &str) -> Self {
        self.run.push(format!("mode = \"{mode}\""));
        self
    }

    pub fn task(mut self, id: &str, cmd: &str, deps: &[&str]) -> Self {
        let deps = deps
            .iter()
            .map(|d| format!("\"{d}\""))
            .collect::<Vec<_>>()
            .join(", ");
        self.tasks.push(format!(
            "[[task]]\nid = \"{id}\"\ncmd = \"{cmd}\"\ndepends_on = [{deps}]\n"
        ));
        self
    }

    /// Append a raw `[[task]]` table verbatim.
    pub fn raw_task(mut self, toml: &str) -> Self {
        self.tasks.push(toml.to_string());
        self
    }

    pub fn build(self) -> String {
        let mut out = String::new();
        if !self.run.is_empty() {
            out.push_str("[run]\n");
            for line in &self.run {
                out.push_str(line);
                out.push('\n');
            }
            out.push('\n');
        }
        for t in &self.tasks {
            out.push_str(t);
            out.push('\n');
        }
        out
    }
}

impl Default for TaskFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
