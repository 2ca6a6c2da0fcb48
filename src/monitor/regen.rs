use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use crate::platform::{CommandOutput, CommandRunOptions};
use crate::report::ReportOptions;

/// What a single report regeneration produced.
#[derive(Debug, Clone)]
pub struct RegenReport {
    pub exit_code: i32,
    /// The `total Markdown file count` line, when the generator printed one.
    pub marker_line: Option<String>,
    pub stdout: String,
    pub stderr: String,
}

impl RegenReport {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }

    fn from_output(output: CommandOutput) -> Self {
        let marker_line = crate::report::find_marker_line(&output.stdout)
            .or_else(|| crate::report::find_marker_line(&output.stderr))
            .map(str::to_string);
        Self {
            exit_code: output.exit_code,
            marker_line,
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

/// Something the monitor can ask to rebuild the report.
///
/// `Err` means the attempt could not run at all (spawn failure, timeout);
/// a generator that ran and failed reports it through `RegenReport::exit_code`.
pub trait Regenerator {
    fn regenerate(&mut self) -> Result<RegenReport>;

    /// Program followed by its arguments.
    fn command_line(&self) -> Vec<String>;

    fn describe(&self) -> String {
        self.command_line().join(" ")
    }
}

impl<R: Regenerator + ?Sized> Regenerator for Box<R> {
    fn regenerate(&mut self) -> Result<RegenReport> {
        (**self).regenerate()
    }

    fn command_line(&self) -> Vec<String> {
        (**self).command_line()
    }
}

/// Runs the report generator as a child process with a time budget.
#[derive(Debug, Clone)]
pub struct SubprocessRegenerator {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub timeout: Duration,
}

impl SubprocessRegenerator {
    /// `<program> report --root <root> --output-dir <output> --no-color [--config <path>]`
    pub fn for_report(
        program: PathBuf,
        opts: &ReportOptions,
        config_path: Option<&std::path::Path>,
        cwd: PathBuf,
        timeout: Duration,
    ) -> Self {
        let mut args = vec![
            "report".to_string(),
            "--root".to_string(),
            opts.root.display().to_string(),
            "--output-dir".to_string(),
            opts.output_dir.display().to_string(),
            "--no-color".to_string(),
        ];
        if let Some(path) = config_path {
            args.push("--config".to_string());
            args.push(path.display().to_string());
        }
        Self {
            program,
            args,
            cwd,
            timeout,
        }
    }
}

impl Regenerator for SubprocessRegenerator {
    fn regenerate(&mut self) -> Result<RegenReport> {
        let program = self.program.display().to_string();
        let args: Vec<&str> = self.args.iter().map(String::as_str).collect();
        let output = crate::platform::run_command_with_options(
            &program,
            &args,
            self.timeout,
            &CommandRunOptions {
                cwd: Some(self.cwd.clone()),
            },
        )?;
        Ok(RegenReport::from_output(output))
    }

    fn command_line(&self) -> Vec<String> {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

/// Calls the report generator directly in this process.
#[derive(Debug, Clone)]
pub struct InProcessRegenerator {
    pub opts: ReportOptions,
}

impl Regenerator for InProcessRegenerator {
    fn regenerate(&mut self) -> Result<RegenReport> {
        match crate::report::generate(&self.opts) {
            Ok(outcome) => {
                let stderr = outcome
                    .chart_error
                    .iter()
                    .chain(outcome.html_error.iter())
                    .cloned()
                    .collect::<Vec<_>>()
                    .join("\n");
                Ok(RegenReport {
                    exit_code: 0,
                    marker_line: Some(outcome.marker_line()),
                    stdout: outcome.summary_lines().join("\n"),
                    stderr,
                })
            }
            Err(err) => Ok(RegenReport {
                exit_code: crate::exit::exit_code(&err),
                marker_line: None,
                stdout: String::new(),
                stderr: format!("{err:#}"),
            }),
        }
    }

    fn command_line(&self) -> Vec<String> {
        vec![
            "report (in-process)".to_string(),
            "--root".to_string(),
            self.opts.root.display().to_string(),
            "--output-dir".to_string(),
            self.opts.output_dir.display().to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EffectiveConfig;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn make_temp_dir(tag: &str) -> PathBuf {
        static DIR_SEQ: AtomicU64 = AtomicU64::new(0);

        let seq = DIR_SEQ.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!(
            "mdtally-regen-{tag}-{}-{seq}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("create dir");
        dir
    }

    fn options(base: &std::path::Path) -> ReportOptions {
        ReportOptions::from_config(
            &EffectiveConfig::default(),
            base.join("repo"),
            base.join("output"),
        )
    }

    #[test]
    fn subprocess_command_line_passes_absolute_paths_and_config() {
        let opts = ReportOptions {
            root: PathBuf::from("/work/docs"),
            output_dir: PathBuf::from("/work/output"),
            ..options(std::path::Path::new("/unused"))
        };
        let regen = SubprocessRegenerator::for_report(
            PathBuf::from("/bin/mdtally"),
            &opts,
            Some(std::path::Path::new("/etc/mdtally.toml")),
            PathBuf::from("/work"),
            Duration::from_secs(30),
        );
        assert_eq!(
            regen.describe(),
            "/bin/mdtally report --root /work/docs --output-dir /work/output --no-color --config /etc/mdtally.toml"
        );
    }

    #[cfg(unix)]
    #[test]
    fn subprocess_report_extracts_marker_line() {
        let mut regen = SubprocessRegenerator {
            program: PathBuf::from("sh"),
            args: vec![
                "-c".to_string(),
                "echo 'chart saved to: x'; echo 'total Markdown file count: 7'".to_string(),
            ],
            cwd: std::env::temp_dir(),
            timeout: Duration::from_secs(10),
        };
        let report = regen.regenerate().expect("regenerate");
        assert!(report.succeeded());
        assert_eq!(
            report.marker_line.as_deref(),
            Some("total Markdown file count: 7")
        );
    }

    #[cfg(unix)]
    #[test]
    fn subprocess_timeout_is_an_error() {
        let mut regen = SubprocessRegenerator {
            program: PathBuf::from("sh"),
            args: vec!["-c".to_string(), "sleep 5".to_string()],
            cwd: std::env::temp_dir(),
            timeout: Duration::from_millis(200),
        };
        let err = regen.regenerate().expect_err("should time out");
        assert!(crate::platform::is_timeout(&err));
    }

    #[test]
    fn in_process_writes_artifacts_and_reports_marker() {
        let base = make_temp_dir("in-process");
        std::fs::create_dir_all(base.join("repo/docs")).expect("mkdirs");
        std::fs::write(base.join("repo/docs/a.md"), b"# a\n").expect("write");

        let opts = options(&base);
        let mut regen = InProcessRegenerator { opts: opts.clone() };
        let report = regen.regenerate().expect("regenerate");
        assert!(report.succeeded());
        assert_eq!(
            report.marker_line.as_deref(),
            Some("total Markdown file count: 1")
        );
        assert!(opts.html_path().is_file());

        let _ = std::fs::remove_dir_all(&base);
    }

    #[test]
    fn in_process_failure_maps_to_report_failed_exit_code() {
        let base = make_temp_dir("in-process-empty");
        std::fs::create_dir_all(base.join("repo")).expect("mkdirs");

        let mut regen = InProcessRegenerator {
            opts: options(&base),
        };
        let report = regen.regenerate().expect("regenerate");
        assert_eq!(report.exit_code, 10);
        assert!(report.marker_line.is_none());
        assert!(report.stderr.contains("no Markdown files"));

        let _ = std::fs::remove_dir_all(&base);
    }
}
