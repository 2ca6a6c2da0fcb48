use std::io;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use serde::Serialize;

use crate::config::EffectiveConfig;
use crate::report::{CountsDocument, ReportOptions};
use crate::scan::MarkdownFilter;
use crate::ui::UiConfig;

mod watch;

#[derive(Debug, Parser)]
#[command(
    name = "mdtally",
    version,
    about = "Watch a tree of Markdown files and keep a per-directory count report (PNG chart + HTML) up to date"
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub json: bool,
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,
    #[arg(long, global = true)]
    pub verbose: bool,
    #[arg(long, global = true)]
    pub quiet: bool,
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Poll the tree and regenerate the report after changes
    Watch(WatchArgs),
    /// Generate the chart and HTML report once
    Report(ReportArgs),
    /// Print per-directory Markdown counts without writing anything
    Counts(CountsArgs),
    Completion(CompletionArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    #[arg(long)]
    pub root: Option<PathBuf>,
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
    /// Call the generator directly instead of spawning `mdtally report`
    #[arg(long)]
    pub in_process: bool,
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    #[arg(long)]
    pub root: Option<PathBuf>,
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct CountsArgs {
    #[arg(long)]
    pub root: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct CompletionArgs {
    pub shell: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[arg(long)]
    pub show: bool,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let stdout_is_tty = io::stdout().is_terminal();
    let stderr_is_tty = io::stderr().is_terminal();

    let home_dir = crate::platform::effective_home_dir()?;
    let cwd = std::env::current_dir().context("failed to read the working directory")?;

    let env_config_path = std::env::var_os("MDTALLY_CONFIG")
        .filter(|p| !p.is_empty())
        .map(PathBuf::from);
    let config_path = cli
        .config
        .clone()
        .or(env_config_path)
        .map(|p| crate::platform::resolve_against(&cwd, &p));
    let cfg = crate::config::load(config_path.as_deref(), &home_dir)
        .map_err(crate::exit::invalid_args_err)?;

    let ui_cfg = UiConfig {
        color: stdout_is_tty && cfg.ui.color && !cli.no_color,
        stdout_is_tty,
        stderr_is_tty,
        quiet: cli.quiet,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Watch(args) => {
            let root = resolve_root(&cfg, args.root.as_deref(), &cwd);
            let output_dir = resolve_output_dir(&cfg, args.output_dir.as_deref(), &cwd);
            watch::run_watch(watch::WatchSetup {
                cfg: &cfg,
                ui: &ui_cfg,
                home_dir: &home_dir,
                cwd: &cwd,
                config_path: config_path.as_deref(),
                root,
                output_dir,
                in_process: args.in_process,
            })?;
        }
        Commands::Report(args) => {
            let root = resolve_root(&cfg, args.root.as_deref(), &cwd);
            let output_dir = resolve_output_dir(&cfg, args.output_dir.as_deref(), &cwd);
            let opts = ReportOptions::from_config(&cfg, root, output_dir);
            let outcome = crate::report::generate(&opts)?;
            crate::ui::print_scan_errors(&outcome.scan_errors, &ui_cfg);
            if cli.json {
                write_json(&outcome.document())?;
            }
            crate::ui::print_report_summary(&outcome, &ui_cfg, cli.json);
        }
        Commands::Counts(args) => {
            let root = resolve_root(&cfg, args.root.as_deref(), &cwd);
            if !root.is_dir() {
                return Err(crate::exit::path_not_found(format!(
                    "root directory does not exist: {}",
                    root.display()
                )));
            }
            let filter = MarkdownFilter::new(&cfg.scan.suffix, &cfg.scan.exclude)
                .map_err(crate::exit::invalid_args_err)?;
            let scan = crate::scan::count_directories(&root, &filter)?;
            crate::ui::print_scan_errors(&scan.errors, &ui_cfg);
            if cli.json {
                write_json(&CountsDocument::new(&scan.root, &scan.counts))?;
            } else {
                crate::ui::print_counts(&scan.counts, &ui_cfg);
            }
        }
        Commands::Completion(args) => {
            let shell = parse_shell(&args.shell)?;
            let mut cmd = Cli::command();
            let mut out = std::io::stdout().lock();
            clap_complete::generate(shell, &mut cmd, "mdtally", &mut out);
        }
        Commands::Config(args) => {
            if args.show {
                if cli.json {
                    write_json(&cfg)?;
                } else {
                    println!("{}", toml::to_string_pretty(&cfg)?);
                }
            } else if !ui_cfg.quiet {
                eprintln!("config: use `mdtally config --show`");
            }
        }
    }

    Ok(())
}

/// `--root` wins over `scan.root`; relative paths are taken from the working directory.
fn resolve_root(cfg: &EffectiveConfig, flag: Option<&Path>, cwd: &Path) -> PathBuf {
    let root = flag.unwrap_or(cfg.scan.root.as_path());
    normalize(&crate::platform::resolve_against(cwd, root))
}

fn resolve_output_dir(cfg: &EffectiveConfig, flag: Option<&Path>, cwd: &Path) -> PathBuf {
    let dir = flag.unwrap_or(cfg.report.output_dir.as_path());
    normalize(&crate::platform::resolve_against(cwd, dir))
}

/// Drops `.` components so `./docs` and `docs` print the same.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, std::path::Component::CurDir))
        .collect()
}

fn write_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    use std::io::Write;

    let buf = serde_json::to_vec_pretty(value)?;

    let mut stdout = std::io::stdout().lock();
    match stdout.write_all(&buf) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => return Ok(()),
        Err(err) => return Err(err.into()),
    }
    match stdout.write_all(b"\n") {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn parse_shell(s: &str) -> Result<clap_complete::Shell> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "bash" => Ok(clap_complete::Shell::Bash),
        "zsh" => Ok(clap_complete::Shell::Zsh),
        "fish" => Ok(clap_complete::Shell::Fish),
        other => Err(crate::exit::invalid_args(format!(
            "unsupported shell: {other} (expected bash|zsh|fish)"
        ))),
    }
}
