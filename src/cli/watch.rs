use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use time::OffsetDateTime;

use crate::config::{EffectiveConfig, RegenMode};
use crate::monitor::{
    CycleOutcome, InProcessRegenerator, Monitor, MonitorOptions, RegenReport, Regenerator,
    SubprocessRegenerator, WatchEvent, WatchOptions,
};
use crate::report::ReportOptions;
use crate::scan::MarkdownFilter;
use crate::ui::UiConfig;

pub(super) struct WatchSetup<'a> {
    pub cfg: &'a EffectiveConfig,
    pub ui: &'a UiConfig,
    pub home_dir: &'a Path,
    pub cwd: &'a Path,
    pub config_path: Option<&'a Path>,
    pub root: PathBuf,
    pub output_dir: PathBuf,
    pub in_process: bool,
}

/// Shows a spinner on stderr for the duration of each regeneration.
struct WithSpinner<R> {
    inner: R,
    ui: UiConfig,
}

impl<R: Regenerator> Regenerator for WithSpinner<R> {
    fn regenerate(&mut self) -> Result<RegenReport> {
        let pb = crate::ui::start_spinner(&self.ui, "regenerating report...");
        let result = self.inner.regenerate();
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        result
    }

    fn command_line(&self) -> Vec<String> {
        self.inner.command_line()
    }
}

pub(super) fn run_watch(setup: WatchSetup<'_>) -> Result<()> {
    let cfg = setup.cfg;
    let ui = setup.ui;

    if !setup.root.is_dir() {
        return Err(crate::exit::path_not_found(format!(
            "root directory does not exist: {}",
            setup.root.display()
        )));
    }

    let filter = MarkdownFilter::new(&cfg.scan.suffix, &cfg.scan.exclude)
        .map_err(crate::exit::invalid_args_err)?;

    let mode = if setup.in_process {
        RegenMode::InProcess
    } else {
        cfg.monitor.mode
    };
    let timeout = Duration::from_secs(cfg.monitor.timeout_secs);
    let report_opts = ReportOptions::from_config(cfg, setup.root.clone(), setup.output_dir);

    let regenerator: Box<dyn Regenerator> = match mode {
        RegenMode::Subprocess => {
            let exe = crate::platform::current_exe()
                .map_err(|e| crate::exit::path_not_found(format!("{e:#}")))?;
            if !exe.is_file() {
                return Err(crate::exit::path_not_found(format!(
                    "report generator not found: {}",
                    exe.display()
                )));
            }
            Box::new(SubprocessRegenerator::for_report(
                exe,
                &report_opts,
                setup.config_path,
                setup.cwd.to_path_buf(),
                timeout,
            ))
        }
        RegenMode::InProcess => Box::new(InProcessRegenerator { opts: report_opts }),
    };
    let command_line = regenerator.command_line();

    let stop = crate::platform::install_interrupt_flag()?;

    let initial = crate::scan::snapshot(&setup.root, &filter)
        .map_err(crate::exit::watch_aborted_err)?;
    crate::ui::print_scan_errors(&initial.errors, ui);
    crate::ui::print_banner(
        &setup.root,
        &regenerator.describe(),
        initial.snapshot.len(),
        ui,
    );

    let mut monitor = Monitor::new(
        WithSpinner {
            inner: regenerator,
            ui: ui.clone(),
        },
        MonitorOptions {
            cooldown: Duration::from_secs(cfg.monitor.cooldown_secs),
            retry_skipped: cfg.monitor.retry_skipped,
        },
        initial.snapshot,
    );
    let watch_opts = WatchOptions {
        root: setup.root,
        filter,
        poll_interval: Duration::from_secs(cfg.monitor.poll_interval_secs),
    };

    crate::monitor::run(&mut monitor, &watch_opts, &stop, |event| match event {
        WatchEvent::ScanErrors(errors) => crate::ui::print_scan_errors(errors, ui),
        WatchEvent::Cycle(outcome) => {
            crate::ui::print_cycle(outcome, timeout, ui);
            if cfg.log.run_logs {
                record_run_log(setup.home_dir, cfg, mode, &command_line, outcome);
            }
        }
    })
    .map_err(crate::exit::watch_aborted_err)?;

    crate::ui::print_stopping(ui);
    crate::ui::print_stopped(ui);
    Ok(())
}

fn record_run_log(
    home_dir: &Path,
    cfg: &EffectiveConfig,
    mode: RegenMode,
    command_line: &[String],
    outcome: &CycleOutcome,
) {
    let CycleOutcome::Triggered {
        changes,
        retried,
        started_at,
        elapsed,
        result,
    } = outcome
    else {
        return;
    };

    let attempt = crate::logs::RegenAttempt {
        started_at: OffsetDateTime::from(*started_at),
        finished_at: OffsetDateTime::from(*started_at + *elapsed),
        mode: mode.as_str(),
        retried: *retried,
        changes,
        command_line,
        result,
    };
    if let Err(err) = crate::logs::write_regen_log(home_dir, &attempt) {
        eprintln!("warning: {err:#}");
        return;
    }
    if let Err(err) = crate::logs::prune_logs(home_dir, cfg.log.keep) {
        eprintln!("warning: {err:#}");
    }
}
