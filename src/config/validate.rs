// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{ConfigFile, RawConfigFile, TaskConfig, TaskSpec};
use crate::errors::{Result, TaskdagError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = TaskdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_tasks(&raw)?;
        validate_run_section(&raw)?;
        let tasks = raw
            .task
            .into_iter()
            .map(task_spec)
            .collect::<Result<Vec<_>>>()?;
        Ok(ConfigFile::new_unchecked(raw.run, tasks))
    }
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(TaskdagError::ConfigError(
            "config must contain at least one [[task]] entry".to_string(),
        ));
    }
    Ok(())
}

fn validate_run_section(cfg: &RawConfigFile) -> Result<()> {
    // `mode` is strongly typed and validated during deserialization.
    if cfg.run.concurrency == 0 {
        return Err(TaskdagError::ConfigError(
            "[run].concurrency must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn task_spec(task: TaskConfig) -> Result<TaskSpec> {
    if task.id.trim().is_empty() {
        return Err(TaskdagError::ConfigError(
            "task id must not be empty".to_string(),
        ));
    }

    let timeout = match task.timeout.as_deref() {
        None => None,
        Some(s) => {
            let d = parse_duration(s).map_err(|e| {
                TaskdagError::ConfigError(format!("task '{}' has invalid timeout: {e}", task.id))
            })?;
            if d.is_zero() {
                return Err(TaskdagError::ConfigError(format!(
                    "task '{}' has a zero timeout",
                    task.id
                )));
            }
            Some(d)
        }
    };

    Ok(TaskSpec {
        id: task.id,
        cmd: task.cmd,
        depends_on: task.depends_on,
        retries: task.retries,
        timeout,
    })
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        other => {
            return Err(format!(
                "unsupported duration unit '{other}'; expected ms, s, m, or h"
            ));
        }
    };

    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration too large: '{s}'"))
}
