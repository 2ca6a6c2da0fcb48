use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicU64, Ordering};

fn mdtally_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_mdtally"));
    cmd.env("HOME", home);
    cmd.current_dir(home);
    for key in [
        "MDTALLY_CONFIG",
        "MDTALLY_SCAN_ROOT",
        "MDTALLY_SCAN_SUFFIX",
        "MDTALLY_SCAN_EXCLUDE",
        "MDTALLY_MONITOR_POLL_INTERVAL_SECS",
        "MDTALLY_MONITOR_COOLDOWN_SECS",
        "MDTALLY_MONITOR_TIMEOUT_SECS",
        "MDTALLY_MONITOR_MODE",
        "MDTALLY_MONITOR_RETRY_SKIPPED",
        "MDTALLY_REPORT_OUTPUT_DIR",
        "MDTALLY_REPORT_TITLE",
        "MDTALLY_UI_COLOR",
        "MDTALLY_LOG_RUN_LOGS",
        "MDTALLY_LOG_KEEP",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

fn run(home: &Path, args: &[&str]) -> Output {
    mdtally_cmd(home).args(args).output().expect("run mdtally")
}

fn make_temp_home() -> PathBuf {
    static HOME_SEQ: AtomicU64 = AtomicU64::new(0);

    let temp = std::env::temp_dir();
    let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
    let uniq = format!("mdtally-config-test-{}-{seq}", std::process::id());
    let home = temp.join(uniq);
    let _ = std::fs::remove_dir_all(&home);
    std::fs::create_dir_all(&home).expect("create home");
    home
}

fn write_file(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("mkdirs");
    }
    std::fs::write(path, bytes).expect("write");
}

#[test]
fn config_show_json_reports_defaults() {
    let home = make_temp_home();

    let out = run(&home, &["--json", "config", "--show"]);
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(
        v.pointer("/monitor/poll_interval_secs").and_then(|n| n.as_u64()),
        Some(2)
    );
    assert_eq!(
        v.pointer("/monitor/cooldown_secs").and_then(|n| n.as_u64()),
        Some(2)
    );
    assert_eq!(
        v.pointer("/monitor/timeout_secs").and_then(|n| n.as_u64()),
        Some(30)
    );
    assert_eq!(
        v.pointer("/monitor/mode").and_then(|s| s.as_str()),
        Some("subprocess")
    );
    assert_eq!(v.pointer("/scan/suffix").and_then(|s| s.as_str()), Some(".md"));
    assert_eq!(
        v.pointer("/report/chart_file").and_then(|s| s.as_str()),
        Some("markdown_bar_chart.png")
    );
    assert!(v.get("config_path").is_none());

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn config_show_emits_effective_config() {
    let home = make_temp_home();
    write_file(
        home.join(".config/mdtally/config.toml").as_path(),
        br#"
[monitor]
cooldown_secs = 5
mode = "in-process"
"#,
    );

    let out = run(&home, &["config", "--show"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("cooldown_secs = 5"), "stdout={stdout}");
    assert!(stdout.contains("mode = \"in-process\""), "stdout={stdout}");
    assert!(stdout.contains("config_path"), "stdout={stdout}");

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn config_flag_wins_over_default_file() {
    let home = make_temp_home();
    write_file(
        home.join(".config/mdtally/config.toml").as_path(),
        b"[monitor]\ncooldown_secs = 5\n",
    );
    write_file(
        home.join("project.toml").as_path(),
        b"[monitor]\ncooldown_secs = 9\n",
    );

    let out = run(&home, &["--json", "--config", "project.toml", "config", "--show"]);
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(
        v.pointer("/monitor/cooldown_secs").and_then(|n| n.as_u64()),
        Some(9)
    );

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn config_output_dir_is_relative_to_working_directory() {
    let home = make_temp_home();
    write_file(&home.join("repo/a.md"), b"# a\n");
    write_file(
        home.join(".config/mdtally/config.toml").as_path(),
        br#"
[scan]
root = "repo"

[report]
output_dir = "public/stats"
html_file = "index.html"
"#,
    );

    let out = run(&home, &["report"]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    assert!(home.join("public/stats/index.html").is_file());
    assert!(home.join("public/stats/markdown_bar_chart.png").is_file());

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn chart_file_with_path_separator_is_rejected() {
    let home = make_temp_home();
    write_file(
        home.join(".config/mdtally/config.toml").as_path(),
        b"[report]\nchart_file = \"../escape.png\"\n",
    );

    let out = run(&home, &["config", "--show"]);
    assert_eq!(out.status.code(), Some(2));

    let _ = std::fs::remove_dir_all(&home);
}
