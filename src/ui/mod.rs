use anyhow::Error;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;
use unicode_width::UnicodeWidthChar;

use crate::core::{ChangeKind, ChangeSet, DirectoryCounts};
use crate::monitor::{CycleOutcome, RegenReport};
use crate::report::ReportOutcome;
use crate::scan::ScanError;

const RULE_WIDTH: usize = 80;

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub color: bool,
    pub stdout_is_tty: bool,
    pub stderr_is_tty: bool,
    pub quiet: bool,
    pub verbose: bool,
}

pub fn eprintln_error(err: &Error) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "error:");
    let _ = writeln!(stderr, "  {err}");

    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_some() {
        let _ = writeln!(stderr, "caused by:");
        for cause in causes {
            let _ = writeln!(stderr, "  - {cause}");
        }
    }

    let _ = writeln!(stderr, "next:");
    let _ = writeln!(stderr, "  - rerun with `--verbose` for more detail");
    let _ = writeln!(
        stderr,
        "  - see `mdtally --help` for the available commands and options"
    );
}

pub fn separator() -> String {
    "=".repeat(RULE_WIDTH)
}

pub fn print_banner(root: &Path, generator: &str, initial_files: usize, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    let _ = writeln!(out, "{}", separator());
    let _ = writeln!(out, "Markdown monitor started");
    let _ = writeln!(out, "watching: {}", root.display());
    let _ = writeln!(out, "report generator: {generator}");
    let _ = writeln!(out, "press Ctrl+C to stop");
    let _ = writeln!(out, "{}", separator());
    let _ = writeln!(out, "initial state: {initial_files} Markdown files");
}

pub fn print_stopping(cfg: &UiConfig) {
    if !cfg.quiet {
        println!("\nstopping monitor...");
    }
}

pub fn print_stopped(cfg: &UiConfig) {
    if !cfg.quiet {
        println!("monitor stopped");
    }
}

pub fn format_change_line(kind: ChangeKind, path: &Path, color: bool) -> String {
    let label = kind.as_str();
    let label = if color {
        let code = match kind {
            ChangeKind::Added => "32",
            ChangeKind::Modified => "33",
            ChangeKind::Removed => "31",
        };
        format!("\x1b[{code}m{label}\x1b[0m")
    } else {
        label.to_string()
    };
    format!("{}: {}", pad_end_ansi(&label, "modified".len()), path.display())
}

pub fn print_changes(changes: &ChangeSet, cfg: &UiConfig) {
    if cfg.quiet || changes.is_empty() {
        return;
    }
    let mut out = io::stdout().lock();
    for change in changes.changes() {
        let _ = writeln!(
            out,
            "{}",
            format_change_line(change.kind, &change.path, cfg.color)
        );
    }
}

pub fn print_scan_errors(errors: &[ScanError], cfg: &UiConfig) {
    if errors.is_empty() {
        return;
    }
    let mut stderr = io::stderr().lock();
    if !cfg.verbose {
        let _ = writeln!(
            stderr,
            "warning: skipped {} entr{} during scan (use --verbose for details)",
            errors.len(),
            if errors.len() == 1 { "y" } else { "ies" }
        );
        return;
    }
    for e in errors {
        match &e.path {
            Some(path) => {
                let _ = writeln!(stderr, "scan error: {}: {}", path.display(), e.message);
            }
            None => {
                let _ = writeln!(stderr, "scan error: {}", e.message);
            }
        }
    }
}

/// Reports one monitor cycle: change lines, then the regeneration result.
pub fn print_cycle(outcome: &CycleOutcome, timeout: Duration, cfg: &UiConfig) {
    match outcome {
        CycleOutcome::Unchanged => {}
        CycleOutcome::Suppressed { changes } => {
            print_changes(changes, cfg);
            if cfg.verbose {
                println!("within cooldown; regeneration skipped");
            }
        }
        CycleOutcome::Triggered {
            changes,
            retried,
            elapsed,
            result,
            ..
        } => {
            print_changes(changes, cfg);
            if *retried && !cfg.quiet {
                println!("regenerating for changes skipped during cooldown");
            }
            match result {
                Ok(report) => print_regen_report(report, *elapsed, cfg),
                Err(err) if crate::platform::is_timeout(err) => {
                    eprintln!(
                        "report generation timed out after {}s",
                        timeout.as_secs()
                    );
                }
                Err(err) => {
                    eprintln!("report generation failed: {err:#}");
                }
            }
            if !cfg.quiet {
                println!("{}", separator());
            }
        }
    }
}

fn print_regen_report(report: &RegenReport, elapsed: Duration, cfg: &UiConfig) {
    if !report.succeeded() {
        eprintln!(
            "report generation failed (exit code {})",
            report.exit_code
        );
        let stderr = report.stderr.trim();
        if !stderr.is_empty() {
            eprintln!("{stderr}");
        }
        return;
    }

    match &report.marker_line {
        Some(line) => println!("{line}"),
        None if !cfg.quiet => println!("report regenerated"),
        None => {}
    }
    if cfg.verbose {
        println!("regeneration took {:.2}s", elapsed.as_secs_f64());
        let marker = report.marker_line.as_deref();
        for line in echoed_output(&report.stdout, marker) {
            println!("{line}");
        }
        for line in echoed_output(&report.stderr, marker) {
            eprintln!("{line}");
        }
    }
}

/// Generator output lines worth echoing: the marker line was already printed.
fn echoed_output<'a>(output: &'a str, marker: Option<&str>) -> Vec<&'a str> {
    output
        .trim()
        .lines()
        .filter(|line| marker != Some(line.trim()))
        .collect()
}

/// Chart/HTML status, then the marker line. The marker line goes to stderr
/// when stdout carries JSON.
pub fn print_report_summary(outcome: &ReportOutcome, cfg: &UiConfig, json: bool) {
    if cfg.verbose {
        let mut stderr = io::stderr().lock();
        for line in outcome.detail_lines() {
            let _ = writeln!(stderr, "{line}");
        }
    }
    if let Some(e) = &outcome.chart_error {
        eprintln!("chart failed: {e}");
    }
    if let Some(e) = &outcome.html_error {
        eprintln!("HTML report failed: {e}");
    }

    if json {
        eprintln!("{}", outcome.marker_line());
        return;
    }
    let mut out = io::stdout().lock();
    if !cfg.quiet {
        if outcome.chart_error.is_none() {
            let _ = writeln!(out, "chart saved to: {}", outcome.chart_path.display());
        }
        if outcome.html_error.is_none() {
            let _ = writeln!(
                out,
                "HTML report written to: {}",
                outcome.html_path.display()
            );
        }
    }
    let _ = writeln!(out, "{}", outcome.marker_line());
}

pub fn print_counts(counts: &DirectoryCounts, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    let _ = write!(out, "{}", format_counts_table(counts));
}

/// Directory/count table sorted like the report, with a trailing total row.
pub fn format_counts_table(counts: &DirectoryCounts) -> String {
    let rows = counts.sorted();
    let label_dir = "directory";
    let label_count = "files";
    let total = counts.total().to_string();

    let dir_w = rows
        .iter()
        .map(|r| visible_width_ansi(&r.directory))
        .max()
        .unwrap_or(0)
        .max(visible_width_ansi(label_dir))
        .max(visible_width_ansi(crate::report::html::TOTAL_LABEL));
    let count_w = rows
        .iter()
        .map(|r| r.count.to_string().len())
        .max()
        .unwrap_or(0)
        .max(label_count.len())
        .max(total.len());

    let mut s = String::new();
    s.push_str(&format!(
        "{}  {}\n",
        pad_end_display(label_dir, dir_w),
        pad_start_display(label_count, count_w)
    ));
    s.push_str(&format!("{}  {}\n", "-".repeat(dir_w), "-".repeat(count_w)));
    for row in &rows {
        s.push_str(&format!(
            "{}  {}\n",
            pad_end_display(&row.directory, dir_w),
            pad_start_display(&row.count.to_string(), count_w)
        ));
    }
    s.push_str(&format!("{}  {}\n", "-".repeat(dir_w), "-".repeat(count_w)));
    s.push_str(&format!(
        "{}  {}\n",
        pad_end_display(crate::report::html::TOTAL_LABEL, dir_w),
        pad_start_display(&total, count_w)
    ));
    s
}

/// Spinner on stderr while a regeneration runs, if stderr is a terminal.
pub fn start_spinner(cfg: &UiConfig, message: &str) -> Option<indicatif::ProgressBar> {
    if cfg.quiet || !cfg.stderr_is_tty {
        return None;
    }
    let pb = indicatif::ProgressBar::new_spinner();
    pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    Some(pb)
}

fn pad_end_ansi(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{s}{}", " ".repeat(width - w))
}

fn pad_end_display(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{s}{}", " ".repeat(width - w))
}

fn pad_start_display(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{}{}", " ".repeat(width - w), s)
}

fn visible_width_ansi(s: &str) -> usize {
    let mut width: usize = 0;
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            let _ = chars.next();
            for ch2 in chars.by_ref() {
                if ch2 == 'm' {
                    break;
                }
            }
            continue;
        }
        width = width.saturating_add(UnicodeWidthChar::width(ch).unwrap_or(0));
    }
    width
}
