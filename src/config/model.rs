// src/config/model.rs

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::dag::{GraphModel, TaskDeclaration};
use crate::errors::Result;
use crate::exec::{RunOptions, ShellWork};
use crate::types::RunMode;

/// Top-level task file as read from TOML, before validation.
///
/// ```toml
/// [run]
/// concurrency = 4
/// mode = "fail-fast"
///
/// [[task]]
/// id = "fetch"
/// cmd = "./fetch.sh"
///
/// [[task]]
/// id = "build"
/// cmd = "make"
/// depends_on = ["fetch"]
/// retries = 2
/// timeout = "30s"
/// ```
///
/// Tasks are an array of tables so that declaration order (and any duplicate
/// id) survives deserialization. Unknown keys are rejected: a misspelled
/// `depends_on` would otherwise drop an edge without notice.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    /// Run behaviour from `[run]`.
    #[serde(default)]
    pub run: RunSection,

    /// All `[[task]]` entries in file order.
    #[serde(default)]
    pub task: Vec<TaskConfig>,
}

/// `[run]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSection {
    /// Maximum number of tasks running at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// `"best-effort"` (default) or `"fail-fast"`.
    #[serde(default)]
    pub mode: RunMode,
}

fn default_concurrency() -> usize {
    1
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            mode: RunMode::default(),
        }
    }
}

/// One `[[task]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    /// Unique task identifier.
    pub id: String,

    /// The command to execute.
    pub cmd: String,

    /// Tasks that must succeed before this one runs.
    #[serde(default, alias = "dependsOn", alias = "after")]
    pub depends_on: Vec<String>,

    /// Extra attempts after a failure.
    #[serde(default)]
    pub retries: u32,

    /// Per-attempt deadline such as `"500ms"`, `"30s"`, `"2m"`.
    #[serde(default)]
    pub timeout: Option<String>,
}

/// A task entry with its timeout parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub id: String,
    pub cmd: String,
    pub depends_on: Vec<String>,
    pub retries: u32,
    pub timeout: Option<Duration>,
}

/// Validated task file. Obtain one via `ConfigFile::try_from(raw)` or
/// [`load_and_validate`](crate::config::load_and_validate).
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub run: RunSection,
    pub tasks: Vec<TaskSpec>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(run: RunSection, tasks: Vec<TaskSpec>) -> Self {
        Self { run, tasks }
    }

    /// Declarations whose work runs each task's `cmd` in a shell.
    pub fn declarations(&self) -> Vec<TaskDeclaration> {
        self.tasks
            .iter()
            .map(|spec| {
                let mut decl = TaskDeclaration::new(
                    spec.id.clone(),
                    Arc::new(ShellWork::new(spec.id.clone(), spec.cmd.clone())),
                )
                .depends_on_all(spec.depends_on.iter().cloned())
                .retries(spec.retries);
                if let Some(timeout) = spec.timeout {
                    decl = decl.timeout(timeout);
                }
                decl
            })
            .collect()
    }

    /// Build and validate the task graph described by this file.
    pub fn to_graph(&self) -> Result<GraphModel> {
        GraphModel::build_validated(self.declarations())
    }

    /// Run options from `[run]`.
    pub fn run_options(&self) -> RunOptions {
        RunOptions::new(self.run.concurrency).with_mode(self.run.mode)
    }
}
