use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::config::EffectiveConfig;
use crate::core::{DirectoryCount, DirectoryCounts};
use crate::scan::{MarkdownFilter, ScanError};

pub mod chart;
pub mod font;
pub mod html;

/// Prefix of the summary line the monitor looks for in generator output.
pub const TOTAL_MARKER: &str = "total Markdown file count";

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub root: PathBuf,
    pub output_dir: PathBuf,
    pub suffix: String,
    pub exclude: Vec<String>,
    pub chart_file: String,
    pub html_file: String,
    pub title: String,
}

impl ReportOptions {
    pub fn from_config(cfg: &EffectiveConfig, root: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            root,
            output_dir,
            suffix: cfg.scan.suffix.clone(),
            exclude: cfg.scan.exclude.clone(),
            chart_file: cfg.report.chart_file.clone(),
            html_file: cfg.report.html_file.clone(),
            title: cfg.report.title.clone(),
        }
    }

    pub fn chart_path(&self) -> PathBuf {
        self.output_dir.join(&self.chart_file)
    }

    pub fn html_path(&self) -> PathBuf {
        self.output_dir.join(&self.html_file)
    }
}

#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub root: PathBuf,
    pub counts: DirectoryCounts,
    pub scan_errors: Vec<ScanError>,
    pub chart_path: PathBuf,
    pub chart_error: Option<String>,
    pub html_path: PathBuf,
    pub html_error: Option<String>,
    /// Image reference as written into the HTML document.
    pub image_src: String,
}

impl ReportOutcome {
    pub fn total(&self) -> u64 {
        self.counts.total()
    }

    pub fn marker_line(&self) -> String {
        marker_line(self.total())
    }

    pub fn is_complete(&self) -> bool {
        self.chart_error.is_none() && self.html_error.is_none()
    }

    /// Per-artifact status lines followed by the marker line.
    pub fn summary_lines(&self) -> Vec<String> {
        let chart = match &self.chart_error {
            None => format!("chart saved to: {}", self.chart_path.display()),
            Some(e) => format!("chart failed: {e}"),
        };
        let html = match &self.html_error {
            None => format!("HTML report written to: {}", self.html_path.display()),
            Some(e) => format!("HTML report failed: {e}"),
        };
        vec![chart, html, self.marker_line()]
    }

    /// Generator internals echoed under `--verbose`.
    pub fn detail_lines(&self) -> Vec<String> {
        let mut lines = vec![format!("root: {}", self.root.display())];
        lines.push("counts:".to_string());
        for row in self.counts.sorted() {
            lines.push(format!("  {}: {}", row.directory, row.count));
        }
        lines.push(format!("chart path: {}", self.chart_path.display()));
        lines.push(format!("HTML path: {}", self.html_path.display()));
        lines.push(format!("image reference: {}", self.image_src));
        lines
    }

    pub fn document(&self) -> CountsDocument {
        CountsDocument {
            chart: Some(self.chart_path.display().to_string()),
            html: Some(self.html_path.display().to_string()),
            chart_error: self.chart_error.clone(),
            html_error: self.html_error.clone(),
            ..CountsDocument::new(&self.root, &self.counts)
        }
    }
}

/// JSON shape shared by `counts --json` and `report --json`.
#[derive(Debug, Clone, Serialize)]
pub struct CountsDocument {
    pub root: String,
    pub total: u64,
    pub directories: Vec<DirectoryCount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_error: Option<String>,
}

impl CountsDocument {
    pub fn new(root: &Path, counts: &DirectoryCounts) -> Self {
        Self {
            root: root.display().to_string(),
            total: counts.total(),
            directories: counts.sorted(),
            chart: None,
            html: None,
            chart_error: None,
            html_error: None,
        }
    }
}

pub fn marker_line(total: u64) -> String {
    format!("{TOTAL_MARKER}: {total}")
}

/// Finds the generator's summary line in captured output.
pub fn find_marker_line(output: &str) -> Option<&str> {
    output
        .lines()
        .map(str::trim)
        .find(|line| line.contains(TOTAL_MARKER))
}

/// Counts Markdown files under the root and writes the chart and HTML page.
///
/// Fails without writing anything if the root is missing or holds no
/// Markdown file. Once counting succeeded, a failure in one artifact is
/// recorded on the outcome and the other artifact is still attempted.
pub fn generate(opts: &ReportOptions) -> Result<ReportOutcome> {
    if !opts.root.is_dir() {
        return Err(crate::exit::report_failed(format!(
            "root directory does not exist: {}",
            opts.root.display()
        )));
    }

    let filter = MarkdownFilter::new(&opts.suffix, &opts.exclude)
        .map_err(crate::exit::invalid_args_err)?;
    let scan = crate::scan::count_directories(&opts.root, &filter)
        .with_context(|| format!("counting Markdown files under {}", opts.root.display()))
        .map_err(crate::exit::report_failed_err)?;

    if scan.counts.is_empty() {
        return Err(crate::exit::report_failed(format!(
            "no Markdown files ({}) found under {}",
            opts.suffix,
            opts.root.display()
        )));
    }

    std::fs::create_dir_all(&opts.output_dir)
        .with_context(|| {
            format!(
                "failed to create output directory: {}",
                opts.output_dir.display()
            )
        })
        .map_err(crate::exit::report_failed_err)?;

    let rows = scan.counts.sorted();

    let chart_path = opts.chart_path();
    let chart_error = chart::write_bar_chart(&rows, &chart::ChartLabels::default(), &chart_path)
        .err()
        .map(|e| format!("{e:#}"));

    let html_path = opts.html_path();
    let image_src = opts.chart_file.clone();
    let page = html::render_html(&opts.title, &rows, &image_src);
    let html_error = html::write_html(&page, &html_path)
        .err()
        .map(|e| format!("{e:#}"));

    Ok(ReportOutcome {
        root: scan.root,
        counts: scan.counts,
        scan_errors: scan.errors,
        chart_path,
        chart_error,
        html_path,
        html_error,
        image_src,
    })
}
