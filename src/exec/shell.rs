// src/exec/shell.rs

//! Shell-command unit of work, used by the CLI's TOML task file.

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::TaskError;
use crate::exec::work::{Work, WorkFuture, WorkResult};
use crate::types::TaskId;

/// Runs `cmd` through the platform shell.
///
/// Success is a zero exit status; the value is the trimmed stdout. The child
/// is killed if the attempt is dropped (e.g. on timeout).
#[derive(Debug, Clone)]
pub struct ShellWork {
    task: TaskId,
    cmd: String,
}

impl ShellWork {
    pub fn new(task: impl Into<TaskId>, cmd: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            cmd: cmd.into(),
        }
    }

    async fn run_inner(&self) -> WorkResult {
        let output = self
            .run_process()
            .await
            .map_err(|err| TaskError::Execution(format!("{err:#}")))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines() {
            debug!(task = %self.task, "stderr: {}", line);
        }

        let code = output.status.code().unwrap_or(-1);
        info!(
            task = %self.task,
            exit_code = code,
            success = output.status.success(),
            "task process exited"
        );

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let detail = stderr.lines().last().unwrap_or("").trim();
            Err(TaskError::Execution(if detail.is_empty() {
                format!("exit code {code}")
            } else {
                format!("exit code {code}: {detail}")
            }))
        }
    }

    async fn run_process(&self) -> Result<std::process::Output> {
        info!(task = %self.task, cmd = %self.cmd, "starting task process");

        // Build a shell command appropriate for the platform.
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        };

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .with_context(|| format!("spawning process for task '{}'", self.task))?;

        child
            .wait_with_output()
            .await
            .with_context(|| format!("waiting for process of task '{}'", self.task))
    }
}

impl Work for ShellWork {
    fn run(&self) -> WorkFuture<'_> {
        Box::pin(self.run_inner())
    }
}
