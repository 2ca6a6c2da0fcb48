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
    let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
    let home = std::env::temp_dir().join(format!(
        "mdtally-report-test-{}-{seq}",
        std::process::id()
    ));
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

fn reference_layout(home: &Path) {
    write_file(&home.join("repo/docs/a.md"), b"# a\n");
    write_file(&home.join("repo/docs/sub/b.md"), b"# b\n");
    write_file(&home.join("repo/notes.md"), b"# notes\n");
    write_file(&home.join("repo/docs/readme.txt"), b"not markdown\n");
}

#[test]
fn report_scenario_writes_chart_html_and_marker() {
    let home = make_temp_home();
    reference_layout(&home);

    let out = run(&home, &["report", "--root", "repo"]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(
        stdout.lines().any(|l| l == "total Markdown file count: 3"),
        "stdout={stdout}"
    );

    let png = std::fs::read(home.join("output/markdown_bar_chart.png")).expect("read chart");
    assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

    let html = std::fs::read_to_string(home.join("output/markdown_statistics_report.html"))
        .expect("read html");
    assert!(html.contains("<td>docs/sub</td>"));
    assert!(html.contains("<td>(root)</td>"));
    assert!(html.contains("<td>total</td>\n                <td>3</td>"));
    assert!(html.contains("src=\"markdown_bar_chart.png\""));

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn report_json_keeps_stdout_parseable() {
    let home = make_temp_home();
    reference_layout(&home);

    let out = run(
        &home,
        &["--json", "report", "--root", "repo", "--output-dir", "site"],
    );
    assert!(out.status.success());

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(v.get("total").and_then(|n| n.as_u64()), Some(3));
    let dirs = v
        .get("directories")
        .and_then(|d| d.as_array())
        .expect("directories array");
    let labels: Vec<&str> = dirs
        .iter()
        .filter_map(|d| d.get("directory").and_then(|s| s.as_str()))
        .collect();
    assert_eq!(labels, vec!["(root)", "docs", "docs/sub"]);
    assert!(v.get("chart_error").is_none());
    assert!(
        v.get("html")
            .and_then(|s| s.as_str())
            .is_some_and(|s| s.ends_with("site/markdown_statistics_report.html"))
    );

    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("total Markdown file count: 3"), "stderr={stderr}");

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn report_without_markdown_fails_and_writes_nothing() {
    let home = make_temp_home();
    write_file(&home.join("repo/readme.txt"), b"plain\n");

    let out = run(&home, &["report", "--root", "repo"]);
    assert_eq!(out.status.code(), Some(10));
    assert!(!home.join("output").exists());

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn report_twice_is_idempotent() {
    let home = make_temp_home();
    reference_layout(&home);

    let first = run(&home, &["--json", "report", "--root", "repo"]);
    let first_html =
        std::fs::read(home.join("output/markdown_statistics_report.html")).expect("html");
    let second = run(&home, &["--json", "report", "--root", "repo"]);
    let second_html =
        std::fs::read(home.join("output/markdown_statistics_report.html")).expect("html");

    assert!(first.status.success() && second.status.success());
    assert_eq!(first.stdout, second.stdout);
    assert_eq!(first_html, second_html);

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn report_title_and_excludes_come_from_config() {
    let home = make_temp_home();
    reference_layout(&home);
    write_file(&home.join("repo/drafts/c.md"), b"# c\n");
    write_file(
        home.join(".config/mdtally/config.toml").as_path(),
        br#"
[scan]
exclude = ["**/drafts"]

[report]
title = "Docs & Notes"
"#,
    );

    let out = run(&home, &["report", "--root", "repo"]);
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("total Markdown file count: 3"));

    let html = std::fs::read_to_string(home.join("output/markdown_statistics_report.html"))
        .expect("read html");
    assert!(html.contains("<h1>Docs &amp; Notes</h1>"));
    assert!(!html.contains("drafts"));

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn counts_json_matches_independent_scan_and_writes_nothing() {
    let home = make_temp_home();
    reference_layout(&home);

    let out = run(&home, &["--json", "counts", "--root", "repo"]);
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");

    let listed: u64 = v
        .get("directories")
        .and_then(|d| d.as_array())
        .expect("directories array")
        .iter()
        .filter_map(|d| d.get("count").and_then(|n| n.as_u64()))
        .sum();
    let independent = walk_markdown(&home.join("repo"));
    assert_eq!(listed, independent);
    assert_eq!(v.get("total").and_then(|n| n.as_u64()), Some(independent));
    assert!(!home.join("output").exists());

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn counts_table_ends_with_total_row() {
    let home = make_temp_home();
    reference_layout(&home);

    let out = run(&home, &["counts", "--root", "repo"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    let last = stdout.lines().last().expect("table rows");
    assert!(last.starts_with("total"), "stdout={stdout}");
    assert!(last.trim_end().ends_with('3'), "stdout={stdout}");

    let _ = std::fs::remove_dir_all(&home);
}

fn walk_markdown(dir: &Path) -> u64 {
    let mut n = 0;
    for entry in std::fs::read_dir(dir).expect("read dir") {
        let entry = entry.expect("entry");
        let path = entry.path();
        if path.is_dir() {
            n += walk_markdown(&path);
        } else if path.extension().is_some_and(|e| e == "md") {
            n += 1;
        }
    }
    n
}
