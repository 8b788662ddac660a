// src/dag/mod.rs

//! Task graph representation and static checks.
//!
//! - [`graph`] holds the immutable [`GraphModel`].
//! - [`builder`] turns a flat declaration list into a graph.
//! - [`cycle`] is the acyclicity gate run before any execution.
//! - [`plan`] derives waves / critical path for dry runs.

pub mod builder;
pub mod cycle;
pub mod graph;
pub mod plan;

pub use builder::{build, TaskDeclaration};
pub use cycle::validate;
pub use graph::{GraphModel, Task};
pub use plan::{to_dot, Plan};
