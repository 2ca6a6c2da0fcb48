use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::{ChangeKind, ChangeSet};
use crate::monitor::RegenReport;

const MAX_CMD_OUTPUT_BYTES: usize = 64 * 1024;
const LOG_PREFIX: &str = "regen-";

#[derive(Debug, Serialize)]
struct RegenLog {
    schema_version: &'static str,
    tool_version: String,
    command: &'static str,
    started_at: String,
    finished_at: String,
    status: String,
    mode: String,
    retried: bool,
    changes: ChangeCounts,
    attempt: CommandAttemptLog,
}

#[derive(Debug, Serialize)]
struct ChangeCounts {
    added: usize,
    modified: usize,
    removed: usize,
}

#[derive(Debug, Serialize)]
struct CommandAttemptLog {
    cmd: String,
    args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    marker_line: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    stdout: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// One finished regeneration attempt, as recorded in a run log.
#[derive(Debug)]
pub struct RegenAttempt<'a> {
    pub started_at: OffsetDateTime,
    pub finished_at: OffsetDateTime,
    pub mode: &'a str,
    pub retried: bool,
    pub changes: &'a ChangeSet,
    /// Program followed by its arguments.
    pub command_line: &'a [String],
    pub result: &'a Result<RegenReport>,
}

pub fn logs_dir(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/mdtally/logs")
}

pub fn write_regen_log(home_dir: &Path, attempt: &RegenAttempt<'_>) -> Result<PathBuf> {
    let dir = logs_dir(home_dir);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory: {}", dir.display()))?;

    let pid = std::process::id();
    let ts = attempt.finished_at.unix_timestamp_nanos();
    let path = dir.join(format!("{LOG_PREFIX}{pid}-{ts}.json"));

    let (cmd, args) = match attempt.command_line.split_first() {
        Some((cmd, args)) => (cmd.as_str(), args),
        None => ("", &[][..]),
    };

    let (status, record) = match attempt.result {
        Ok(report) => {
            let status = if report.succeeded() { "ok" } else { "error" };
            (status, command_attempt(cmd, args, Some(report), None))
        }
        Err(err) => {
            let status = if crate::platform::is_timeout(err) {
                "timeout"
            } else {
                "error"
            };
            (status, command_attempt(cmd, args, None, Some(format!("{err:#}"))))
        }
    };

    let log = RegenLog {
        schema_version: "1.0",
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        command: "watch",
        started_at: attempt
            .started_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string()),
        finished_at: attempt
            .finished_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string()),
        status: status.to_string(),
        mode: attempt.mode.to_string(),
        retried: attempt.retried,
        changes: ChangeCounts {
            added: attempt.changes.count(ChangeKind::Added),
            modified: attempt.changes.count(ChangeKind::Modified),
            removed: attempt.changes.count(ChangeKind::Removed),
        },
        attempt: record,
    };

    let buf = serde_json::to_vec_pretty(&log).context("failed to serialize run log")?;
    std::fs::write(&path, buf)
        .with_context(|| format!("failed to write run log: {}", path.display()))?;
    Ok(path)
}

/// Deletes all but the newest `keep` run logs. Returns how many were removed.
pub fn prune_logs(home_dir: &Path, keep: usize) -> Result<usize> {
    let dir = logs_dir(home_dir);
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read log directory: {}", dir.display()));
        }
    };

    let mut logs: Vec<(i128, PathBuf)> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            log_timestamp(&name).map(|ts| (ts, e.path()))
        })
        .collect();
    if logs.len() <= keep {
        return Ok(0);
    }

    // newest first
    logs.sort_by(|a, b| b.cmp(a));
    let mut removed = 0;
    for (_, path) in logs.into_iter().skip(keep) {
        std::fs::remove_file(&path)
            .with_context(|| format!("failed to remove old run log: {}", path.display()))?;
        removed += 1;
    }
    Ok(removed)
}

/// Parses `regen-<pid>-<nanos>.json` into its timestamp.
fn log_timestamp(file_name: &str) -> Option<i128> {
    let stem = file_name.strip_prefix(LOG_PREFIX)?.strip_suffix(".json")?;
    let (_pid, ts) = stem.split_once('-')?;
    ts.parse().ok()
}

fn command_attempt(
    cmd: &str,
    args: &[String],
    report: Option<&RegenReport>,
    error: Option<String>,
) -> CommandAttemptLog {
    let Some(report) = report else {
        return CommandAttemptLog {
            cmd: cmd.to_string(),
            args: args.to_vec(),
            exit_code: None,
            marker_line: None,
            stdout: String::new(),
            stderr: String::new(),
            error,
        };
    };

    CommandAttemptLog {
        cmd: cmd.to_string(),
        args: args.to_vec(),
        exit_code: Some(report.exit_code),
        marker_line: report.marker_line.clone(),
        stdout: truncate_string(&report.stdout, MAX_CMD_OUTPUT_BYTES),
        stderr: truncate_string(&report.stderr, MAX_CMD_OUTPUT_BYTES),
        error,
    }
}

fn truncate_string(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut idx = max_bytes;
    while idx > 0 && !s.is_char_boundary(idx) {
        idx = idx.saturating_sub(1);
    }
    let head = &s[..idx];
    format!("{head}\n...(truncated, total={} bytes)", s.len())
}
