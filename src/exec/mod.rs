// src/exec/mod.rs

//! Execution layer.
//!
//! - [`work`] defines the [`Work`] capability a task runs, plus closure
//!   adapters.
//! - [`executor`] owns the worker slots and drives the scheduler.
//! - [`shell`] implements [`Work`] for shell commands declared in a task file.

pub mod executor;
pub mod shell;
pub mod work;

pub use executor::{run, Executor, RunOptions};
pub use shell::ShellWork;
pub use work::{blocking_fn, work_fn, BlockingWork, FnWork, TaskOutput, Work, WorkFuture, WorkResult};
