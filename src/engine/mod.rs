// src/engine/mod.rs

//! Run-time scheduling engine.
//!
//! This module ties together:
//! - the per-run state ([`context::RunContext`])
//! - the pure scheduling state machine ([`scheduler::Scheduler`])
//! - the failure policy consulted on every terminal status
//! - the result aggregator that builds the final [`RunReport`]
//!
//! Nothing in here awaits; the async worker pool lives in
//! [`crate::exec::executor`].

pub mod aggregator;
pub mod context;
pub mod policy;
pub mod report;
pub mod scheduler;

pub use aggregator::ResultAggregator;
pub use context::{RunContext, TaskStatus};
pub use policy::{FailurePolicy, PolicyDecision};
pub use report::{Outcome, OutcomeCounts, RunReport, SkipReason, TaskReport};
pub use scheduler::{CompletionStep, Dispatch, Scheduler};
pub use crate::types::RunMode;
