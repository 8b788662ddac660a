// src/errors.rs

//! Crate-wide error types.
//!
//! Structural errors ([`BuildError`], [`CycleError`]) are detected before any
//! task runs. [`TaskError`] is contained per task and ends up inside the
//! [`RunReport`](crate::engine::RunReport); it never escapes `run`.

use std::time::Duration;

use thiserror::Error;

use crate::types::TaskId;

/// Rejected declaration list.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("duplicate task id '{0}'")]
    DuplicateTask(TaskId),

    #[error("task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency { task: TaskId, dependency: TaskId },
}

/// The dependency relation contains a cycle.
///
/// `path` starts and ends with the same task, e.g. `["A", "B", "A"]` means
/// A depends on B and B depends on A.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cycle detected in task graph: {}", .path.join(" -> "))]
pub struct CycleError {
    pub path: Vec<TaskId>,
}

/// Failure of a single task attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The unit of work reported failure.
    #[error("task execution failed: {0}")]
    Execution(String),

    /// The attempt ran past its deadline and was aborted.
    #[error("task timed out after {0:?}")]
    Timeout(Duration),

    /// The unit of work panicked or its attempt could not be joined.
    #[error("task faulted: {0}")]
    Fault(String),
}

impl TaskError {
    /// Convenience for work implementations.
    pub fn execution(msg: impl Into<String>) -> Self {
        TaskError::Execution(msg.into())
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, TaskError::Fault(_))
    }
}

/// Surfaced by [`RunReport::abort_error`](crate::engine::RunReport::abort_error)
/// when a fail-fast run stopped early.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("run aborted after failure of {}; {cancelled} task(s) cancelled", .failed.join(", "))]
pub struct RunAbortedError {
    pub failed: Vec<TaskId>,
    pub cancelled: usize,
}

/// Error type for the config / CLI surface.
#[derive(Error, Debug)]
pub enum TaskdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Cycle(#[from] CycleError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TaskdagError>;
