// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

use anyhow::Result;
use tracing::{debug, info};

pub use crate::dag::{build, to_dot, validate, GraphModel, Plan, Task, TaskDeclaration};
pub use crate::engine::{Outcome, RunReport, SkipReason, TaskReport};
pub use crate::errors::{BuildError, CycleError, RunAbortedError, TaskError, TaskdagError};
pub use crate::exec::{blocking_fn, run, work_fn, Executor, RunOptions, Work, WorkResult};
pub use crate::types::{RunMode, TaskId};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;

/// High-level entry point used by `main.rs`.
///
/// Loads and checks the task file, then either prints the plan / DOT graph
/// or runs every task and prints the report. Returns `Ok(true)` iff every
/// task succeeded.
pub async fn run_cli(args: CliArgs) -> Result<bool> {
    let config_path = args.config.as_path();
    let cfg = load_and_validate(config_path)?;
    let graph = cfg.to_graph()?;

    if args.dot {
        print!("{}", to_dot(&graph));
        return Ok(true);
    }

    let mut options = cfg.run_options();
    if let Some(n) = args.concurrency {
        options.concurrency = n;
    }
    if let Some(mode) = args.mode {
        options.mode = RunMode::from(mode);
    }

    if args.dry_run {
        print_dry_run(&graph, options)?;
        return Ok(true);
    }

    info!(
        config = %config_path.display(),
        tasks = graph.len(),
        concurrency = options.concurrency,
        mode = %options.mode,
        "starting run"
    );

    let report = Executor::new(options).run(&graph).await;
    print_report(&report);
    Ok(report.is_success())
}

/// Dry-run output: options, waves and the critical path.
fn print_dry_run(graph: &GraphModel, options: RunOptions) -> Result<()> {
    let plan = Plan::compute(graph)?;

    println!("taskdag dry-run");
    println!("  run.concurrency = {}", options.concurrency);
    println!("  run.mode = {}", options.mode);
    println!();

    println!("tasks ({}):", graph.len());
    for id in graph.task_ids() {
        println!("  - {id}");
        let deps = graph.dependencies_of(id);
        if !deps.is_empty() {
            println!("      depends_on: {deps:?}");
        }
        if let Some(task) = graph.task(id) {
            if task.retries > 0 {
                println!("      retries: {}", task.retries);
            }
            if let Some(timeout) = task.timeout {
                println!("      timeout: {timeout:?}");
            }
        }
    }
    println!();

    println!("waves ({}):", plan.waves.len());
    for (k, wave) in plan.waves.iter().enumerate() {
        println!("  {k}: {}", wave.join(", "));
    }
    println!("critical path: {}", plan.critical_path.join(" -> "));
    println!("max parallelism: {}", plan.max_parallelism());

    debug!("dry-run complete (no execution)");
    Ok(())
}

fn print_report(report: &RunReport) {
    for t in &report.tasks {
        match &t.outcome {
            Outcome::Succeeded(_) => println!("  ok        {} ({} attempt(s))", t.id, t.attempts),
            Outcome::Failed(err) => {
                println!("  FAILED    {} ({} attempt(s)): {err}", t.id, t.attempts)
            }
            Outcome::Skipped(reason) => println!("  skipped   {}: {reason}", t.id),
            Outcome::Cancelled => println!("  cancelled {}", t.id),
        }
    }

    let counts = report.counts();
    println!(
        "{} succeeded, {} failed, {} skipped, {} cancelled in {:.2?}",
        counts.succeeded, counts.failed, counts.skipped, counts.cancelled, report.duration
    );
    if let Some(err) = report.abort_error() {
        println!("{err}");
    }
}
