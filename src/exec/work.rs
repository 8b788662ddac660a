// src/exec/work.rs

//! The unit-of-work capability.
//!
//! A task does not know *what* it runs; it holds an `Arc<dyn Work>` which,
//! given no arguments, eventually yields a [`TaskOutput`] or a [`TaskError`].
//! The executor makes no assumption about how the work schedules itself
//! internally.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::errors::TaskError;

/// Value produced by a successful unit of work.
pub type TaskOutput = String;

/// Result of one attempt of a unit of work.
pub type WorkResult = std::result::Result<TaskOutput, TaskError>;

/// Boxed future returned by [`Work::run`].
pub type WorkFuture<'a> = Pin<Box<dyn Future<Output = WorkResult> + Send + 'a>>;

/// Trait abstracting a task's executable.
///
/// Implementations must be shareable across threads: one graph can be run
/// by several concurrent runs, and each attempt runs on the Tokio runtime.
/// `run` is called once per attempt.
pub trait Work: Send + Sync {
    fn run(&self) -> WorkFuture<'_>;
}

/// Adapter turning an async closure into [`Work`].
pub struct FnWork<F> {
    f: F,
}

impl<F, Fut> Work for FnWork<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = WorkResult> + Send + 'static,
{
    fn run(&self) -> WorkFuture<'_> {
        Box::pin((self.f)())
    }
}

/// Adapter for synchronous closures; each attempt runs on Tokio's blocking
/// pool so it cannot stall the coordinator.
///
/// A blocking attempt that times out is abandoned, not interrupted.
pub struct BlockingWork<F> {
    f: Arc<F>,
}

impl<F> Work for BlockingWork<F>
where
    F: Fn() -> WorkResult + Send + Sync + 'static,
{
    fn run(&self) -> WorkFuture<'_> {
        let f = Arc::clone(&self.f);
        Box::pin(async move {
            match tokio::task::spawn_blocking(move || f()).await {
                Ok(result) => result,
                Err(err) if err.is_panic() => Err(TaskError::Fault(panic_message(err.into_panic()))),
                Err(err) => Err(TaskError::Fault(err.to_string())),
            }
        })
    }
}

/// Wrap an async closure as shareable work.
pub fn work_fn<F, Fut>(f: F) -> Arc<dyn Work>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = WorkResult> + Send + 'static,
{
    Arc::new(FnWork { f })
}

/// Wrap a synchronous closure as shareable work.
pub fn blocking_fn<F>(f: F) -> Arc<dyn Work>
where
    F: Fn() -> WorkResult + Send + Sync + 'static,
{
    Arc::new(BlockingWork { f: Arc::new(f) })
}

/// Best-effort extraction of a panic payload's message.
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
