// tests/shell_tasks.rs

#![cfg(unix)]

use std::error::Error;
use std::io::Write;

use tempfile::NamedTempFile;
use taskdag::cli::{CliArgs, ModeArg};
use taskdag::config::load_and_validate;
use taskdag::engine::{Outcome, SkipReason};
use taskdag::exec::Executor;
use taskdag::run_cli;
use taskdag_test_utils::builders::TaskFileBuilder;
use taskdag_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn write_config(contents: &str) -> Result<NamedTempFile, Box<dyn Error>> {
    let mut file = NamedTempFile::new()?;
    write!(file, "{contents}")?;
    Ok(file)
}

fn args(config: &NamedTempFile) -> CliArgs {
    CliArgs {
        config: config.path().to_path_buf(),
        concurrency: None,
        mode: None,
        log_level: None,
        dry_run: false,
        dot: false,
    }
}

#[tokio::test]
async fn shell_commands_run_and_failures_cascade() -> TestResult {
    init_tracing();
    let file = write_config(
        &TaskFileBuilder::new()
            .concurrency(2)
            .task("hello", "echo hello", &[])
            .task("broken", "echo nope >&2; exit 3", &["hello"])
            .task("after_broken", "echo unreachable", &["broken"])
            .task("sibling", "echo sibling", &["hello"])
            .build(),
    )?;

    let cfg = load_and_validate(file.path())?;
    let graph = cfg.to_graph()?;
    let report = with_timeout(Executor::new(cfg.run_options()).run(&graph)).await;

    assert_eq!(report.outcome("hello"), Some(&Outcome::Succeeded("hello".into())));
    match report.outcome("broken") {
        Some(Outcome::Failed(err)) => {
            let msg = err.to_string();
            assert!(msg.contains("exit code 3"), "{msg}");
            assert!(msg.contains("nope"), "{msg}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(
        report.outcome("after_broken"),
        Some(&Outcome::Skipped(SkipReason::DependencyFailed("broken".into())))
    );
    assert_eq!(report.outcome("sibling"), Some(&Outcome::Succeeded("sibling".into())));
    Ok(())
}

#[tokio::test]
async fn run_cli_reports_overall_success() -> TestResult {
    init_tracing();
    let ok = write_config(
        &TaskFileBuilder::new()
            .task("a", "true", &[])
            .task("b", "true", &["a"])
            .build(),
    )?;
    assert!(with_timeout(run_cli(args(&ok))).await?);

    let failing = write_config(
        &TaskFileBuilder::new()
            .task("a", "false", &[])
            .task("b", "true", &[])
            .build(),
    )?;
    let mut fail_fast = args(&failing);
    fail_fast.mode = Some(ModeArg::FailFast);
    assert!(!with_timeout(run_cli(fail_fast)).await?);
    Ok(())
}

#[tokio::test]
async fn dry_run_and_dot_do_not_execute() -> TestResult {
    init_tracing();
    let marker = tempfile::tempdir()?;
    let touched = marker.path().join("touched");
    let file = write_config(
        &TaskFileBuilder::new()
            .task("touch", &format!("touch {}", touched.display()), &[])
            .build(),
    )?;

    let mut dry = args(&file);
    dry.dry_run = true;
    assert!(with_timeout(run_cli(dry)).await?);

    let mut dot = args(&file);
    dot.dot = true;
    assert!(with_timeout(run_cli(dot)).await?);

    assert!(!touched.exists());
    Ok(())
}

#[tokio::test]
async fn cyclic_task_file_is_an_error() -> TestResult {
    init_tracing();
    let file = write_config(
        &TaskFileBuilder::new()
            .task("a", "true", &["b"])
            .task("b", "true", &["a"])
            .build(),
    )?;

    let err = with_timeout(run_cli(args(&file)))
        .await
        .err()
        .ok_or("expected an error")?;
    assert!(err.to_string().contains("cycle detected"));
    Ok(())
}
