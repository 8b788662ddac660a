// src/config/mod.rs

//! Task-file loading and validation for the CLI.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a task file from disk (`loader.rs`).
//! - Validate run options and per-task fields (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{ConfigFile, RawConfigFile, RunSection, TaskConfig, TaskSpec};
pub use validate::parse_duration;
