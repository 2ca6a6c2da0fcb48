use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub scan: ScanConfig,
    pub monitor: MonitorConfig,
    pub report: ReportConfig,
    pub ui: UiConfig,
    pub log: LogConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanConfig {
    pub root: PathBuf,
    pub suffix: String,
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorConfig {
    pub poll_interval_secs: u64,
    pub cooldown_secs: u64,
    pub timeout_secs: u64,
    pub mode: RegenMode,
    pub retry_skipped: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportConfig {
    pub output_dir: PathBuf,
    pub chart_file: String,
    pub html_file: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UiConfig {
    pub color: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogConfig {
    pub run_logs: bool,
    pub keep: usize,
}

/// How the monitor regenerates the report after a detected change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegenMode {
    Subprocess,
    InProcess,
}

impl RegenMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            RegenMode::Subprocess => "subprocess",
            RegenMode::InProcess => "in-process",
        }
    }
}

impl FromStr for RegenMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "subprocess" => Ok(RegenMode::Subprocess),
            "in-process" | "inprocess" | "in_process" => Ok(RegenMode::InProcess),
            other => Err(format!(
                "invalid monitor mode: {other} (expected subprocess|in-process)"
            )),
        }
    }
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            scan: ScanConfig {
                root: PathBuf::from("."),
                suffix: ".md".to_string(),
                exclude: vec![],
            },
            monitor: MonitorConfig {
                poll_interval_secs: 2,
                cooldown_secs: 2,
                timeout_secs: 30,
                mode: RegenMode::Subprocess,
                retry_skipped: false,
            },
            report: ReportConfig {
                output_dir: PathBuf::from("output"),
                chart_file: "markdown_bar_chart.png".to_string(),
                html_file: "markdown_statistics_report.html".to_string(),
                title: "Markdown File Statistics Report".to_string(),
            },
            ui: UiConfig { color: true },
            log: LogConfig {
                run_logs: true,
                keep: 50,
            },
            config_path: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    scan: Option<RawScanConfig>,
    monitor: Option<RawMonitorConfig>,
    report: Option<RawReportConfig>,
    ui: Option<RawUiConfig>,
    log: Option<RawLogConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawScanConfig {
    root: Option<PathBuf>,
    suffix: Option<String>,
    exclude: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMonitorConfig {
    poll_interval_secs: Option<u64>,
    cooldown_secs: Option<u64>,
    timeout_secs: Option<u64>,
    mode: Option<RegenMode>,
    retry_skipped: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawReportConfig {
    output_dir: Option<PathBuf>,
    chart_file: Option<String>,
    html_file: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawUiConfig {
    color: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLogConfig {
    run_logs: Option<bool>,
    keep: Option<usize>,
}

pub fn default_config_path(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/mdtally/config.toml")
}

pub fn load(config_path: Option<&Path>, home_dir: &Path) -> Result<EffectiveConfig> {
    let mut cfg = EffectiveConfig::default();

    let explicit = config_path.is_some();
    let path = config_path
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| default_config_path(home_dir));

    if path.exists() {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let raw: RawConfig = toml::from_str(&s)
            .with_context(|| format!("failed to parse config file (TOML): {}", path.display()))?;
        apply_raw_config(&mut cfg, raw);
        cfg.config_path = Some(path.display().to_string());
    } else if explicit {
        anyhow::bail!("config file not found: {}", path.display());
    }

    apply_env_overrides(&mut cfg)?;
    validate(&cfg)?;

    Ok(cfg)
}

fn apply_raw_config(cfg: &mut EffectiveConfig, raw: RawConfig) {
    if let Some(scan) = raw.scan {
        if let Some(root) = scan.root {
            cfg.scan.root = root;
        }
        if let Some(suffix) = scan.suffix {
            cfg.scan.suffix = suffix;
        }
        if let Some(exclude) = scan.exclude {
            cfg.scan.exclude = exclude;
        }
    }

    if let Some(monitor) = raw.monitor {
        if let Some(v) = monitor.poll_interval_secs {
            cfg.monitor.poll_interval_secs = v;
        }
        if let Some(v) = monitor.cooldown_secs {
            cfg.monitor.cooldown_secs = v;
        }
        if let Some(v) = monitor.timeout_secs {
            cfg.monitor.timeout_secs = v;
        }
        if let Some(v) = monitor.mode {
            cfg.monitor.mode = v;
        }
        if let Some(v) = monitor.retry_skipped {
            cfg.monitor.retry_skipped = v;
        }
    }

    if let Some(report) = raw.report {
        if let Some(v) = report.output_dir {
            cfg.report.output_dir = v;
        }
        if let Some(v) = report.chart_file {
            cfg.report.chart_file = v;
        }
        if let Some(v) = report.html_file {
            cfg.report.html_file = v;
        }
        if let Some(v) = report.title {
            cfg.report.title = v;
        }
    }

    if let Some(ui) = raw.ui {
        if let Some(color) = ui.color {
            cfg.ui.color = color;
        }
    }

    if let Some(log) = raw.log {
        if let Some(v) = log.run_logs {
            cfg.log.run_logs = v;
        }
        if let Some(v) = log.keep {
            cfg.log.keep = v;
        }
    }
}

fn apply_env_overrides(cfg: &mut EffectiveConfig) -> Result<()> {
    if let Ok(v) = std::env::var("MDTALLY_SCAN_ROOT") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.scan.root = PathBuf::from(v);
        }
    }
    if let Ok(v) = std::env::var("MDTALLY_SCAN_SUFFIX") {
        cfg.scan.suffix = v.trim().to_string();
    }
    if let Ok(v) = std::env::var("MDTALLY_SCAN_EXCLUDE") {
        cfg.scan.exclude = v
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect();
    }
    if let Ok(v) = std::env::var("MDTALLY_MONITOR_POLL_INTERVAL_SECS") {
        cfg.monitor.poll_interval_secs = parse_u64(&v)
            .with_context(|| "MDTALLY_MONITOR_POLL_INTERVAL_SECS")?;
    }
    if let Ok(v) = std::env::var("MDTALLY_MONITOR_COOLDOWN_SECS") {
        cfg.monitor.cooldown_secs =
            parse_u64(&v).with_context(|| "MDTALLY_MONITOR_COOLDOWN_SECS")?;
    }
    if let Ok(v) = std::env::var("MDTALLY_MONITOR_TIMEOUT_SECS") {
        cfg.monitor.timeout_secs =
            parse_u64(&v).with_context(|| "MDTALLY_MONITOR_TIMEOUT_SECS")?;
    }
    if let Ok(v) = std::env::var("MDTALLY_MONITOR_MODE") {
        cfg.monitor.mode = v
            .parse::<RegenMode>()
            .map_err(anyhow::Error::msg)
            .with_context(|| "MDTALLY_MONITOR_MODE")?;
    }
    if let Ok(v) = std::env::var("MDTALLY_MONITOR_RETRY_SKIPPED") {
        cfg.monitor.retry_skipped =
            parse_bool(&v).with_context(|| "MDTALLY_MONITOR_RETRY_SKIPPED")?;
    }
    if let Ok(v) = std::env::var("MDTALLY_REPORT_OUTPUT_DIR") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.report.output_dir = PathBuf::from(v);
        }
    }
    if let Ok(v) = std::env::var("MDTALLY_REPORT_TITLE") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.report.title = v.to_string();
        }
    }
    if let Ok(v) = std::env::var("MDTALLY_UI_COLOR") {
        cfg.ui.color = parse_bool(&v).with_context(|| "MDTALLY_UI_COLOR")?;
    }
    if let Ok(v) = std::env::var("MDTALLY_LOG_RUN_LOGS") {
        cfg.log.run_logs = parse_bool(&v).with_context(|| "MDTALLY_LOG_RUN_LOGS")?;
    }
    if let Ok(v) = std::env::var("MDTALLY_LOG_KEEP") {
        cfg.log.keep = v
            .trim()
            .parse::<usize>()
            .with_context(|| "MDTALLY_LOG_KEEP")?;
    }

    Ok(())
}

pub fn validate(cfg: &EffectiveConfig) -> Result<()> {
    if cfg.scan.suffix.is_empty() {
        anyhow::bail!("scan.suffix must not be empty");
    }
    crate::scan::validate_excludes(&cfg.scan.exclude)?;
    if cfg.monitor.poll_interval_secs == 0 {
        anyhow::bail!("monitor.poll_interval_secs must be at least 1");
    }
    if cfg.monitor.timeout_secs == 0 {
        anyhow::bail!("monitor.timeout_secs must be at least 1");
    }
    for (key, name) in [
        ("report.chart_file", &cfg.report.chart_file),
        ("report.html_file", &cfg.report.html_file),
    ] {
        if !is_plain_file_name(name) {
            anyhow::bail!("{key} must be a plain file name: {name}");
        }
    }
    Ok(())
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

fn parse_u64(s: &str) -> Result<u64> {
    s.trim()
        .parse::<u64>()
        .map_err(|e| anyhow::anyhow!("invalid number: {} ({e})", s.trim()))
}

fn parse_bool(s: &str) -> Result<bool> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow::anyhow!(
            "invalid boolean: {s} (expected true|false|1|0|yes|no|on|off)"
        )),
    }
}
