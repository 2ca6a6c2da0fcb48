use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use wait_timeout::ChildExt;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, Default)]
pub struct CommandRunOptions {
    pub cwd: Option<PathBuf>,
}

/// Marker error for a child that had to be killed after its time budget.
#[derive(Debug)]
pub struct CommandTimedOut {
    pub cmd: String,
    pub timeout: Duration,
}

impl std::fmt::Display for CommandTimedOut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "timed out after {:?}: {}", self.timeout, self.cmd)
    }
}

impl std::error::Error for CommandTimedOut {}

/// Spawns `cmd`, captures stdout and stderr in full, and waits at most `timeout`.
///
/// On timeout the child is killed and reaped, and the error downcasts to
/// [`CommandTimedOut`].
pub fn run_command_with_options(
    cmd: &str,
    args: &[&str],
    timeout: Duration,
    options: &CommandRunOptions,
) -> Result<CommandOutput> {
    let mut command = Command::new(cmd);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    if let Some(cwd) = &options.cwd {
        command.current_dir(cwd);
    }

    let mut child = command
        .spawn()
        .with_context(|| format!("failed to spawn process: {cmd}"))?;

    // Drain the pipes on helper threads so a chatty child cannot block on a full pipe.
    let stdout_reader = child.stdout.take().map(|mut out| {
        std::thread::spawn(move || {
            let mut buf = String::new();
            let _ = out.read_to_string(&mut buf);
            buf
        })
    });
    let stderr_reader = child.stderr.take().map(|mut err| {
        std::thread::spawn(move || {
            let mut buf = String::new();
            let _ = err.read_to_string(&mut buf);
            buf
        })
    });

    let status = match child
        .wait_timeout(timeout)
        .with_context(|| format!("failed to wait for process: {cmd}"))?
    {
        Some(status) => status,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(CommandTimedOut {
                cmd: cmd.to_string(),
                timeout,
            }
            .into());
        }
    };

    let stdout = stdout_reader
        .and_then(|h| h.join().ok())
        .unwrap_or_default();
    let stderr = stderr_reader
        .and_then(|h| h.join().ok())
        .unwrap_or_default();

    Ok(CommandOutput {
        exit_code: status.code().unwrap_or(-1),
        stdout,
        stderr,
    })
}

pub fn is_timeout(err: &anyhow::Error) -> bool {
    err.downcast_ref::<CommandTimedOut>().is_some()
}

pub fn effective_home_dir() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("HOME is not set"))
}

/// Resolves `path` against `base` unless it is already absolute.
pub fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// The running executable, used as the report generator entry point.
pub fn current_exe() -> Result<PathBuf> {
    std::env::current_exe().context("failed to resolve the running executable")
}

/// Returns a flag that flips to `true` on SIGINT or SIGTERM.
pub fn install_interrupt_flag() -> Result<Arc<AtomicBool>> {
    use signal_hook::consts::signal::{SIGINT, SIGTERM};

    let flag = Arc::new(AtomicBool::new(false));
    for sig in [SIGINT, SIGTERM] {
        signal_hook::flag::register(sig, Arc::clone(&flag))
            .with_context(|| format!("failed to install handler for signal {sig}"))?;
    }
    Ok(flag)
}
