//! Black-box runs of the `fqd` binary.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use assert_cmd::Command;
use std::path::Path;
use tempfile::TempDir;

/// `fqd` with its state directory pinned inside `state`
fn fqd(state: &TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_fqd"));
    cmd.env("FQ_STATE_DIR", state.path())
        .env_remove("FQ_CONFIG")
        .env("FQ_WORKERS", "2")
        .env("FQ_TICK_MS", "10")
        .timeout(std::time::Duration::from_secs(30));
    cmd
}

fn write_fast_config(dir: &Path) {
    std::fs::write(dir.join("fq.toml"), "crawl_delay = \"0s\"\npool_threads = 2\n").unwrap();
}

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn version_flags_print_version() {
    let state = TempDir::new().unwrap();
    for flag in ["--version", "-V", "-v"] {
        let output = fqd(&state).arg(flag).output().unwrap();
        assert!(output.status.success());
        assert!(
            stdout(&output).starts_with("fqd 0.1.0"),
            "unexpected version output for {flag}: {}",
            stdout(&output)
        );
    }
}

#[test]
fn help_shows_usage() {
    let state = TempDir::new().unwrap();
    let output = fqd(&state).arg("--help").output().unwrap();
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("USAGE:"), "expected USAGE section, got: {out}");
    assert!(out.contains("<seeds-file>"));
    assert!(out.contains("FQ_STATE_DIR"));
}

#[test]
fn unknown_flag_fails() {
    let state = TempDir::new().unwrap();
    let output = fqd(&state).arg("--bogus").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("unexpected argument '--bogus'"));
}

#[test]
fn missing_seeds_argument_fails() {
    let state = TempDir::new().unwrap();
    let output = fqd(&state).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing seeds file"));
}

#[test]
fn runs_seeds_to_completion() {
    let state = TempDir::new().unwrap();
    write_fast_config(state.path());
    let seeds = state.path().join("seeds.txt");
    std::fs::write(
        &seeds,
        "# crawl list\nhttp://a.com/1 1\nhttp://a.com/2 1\nhttp://b.com/1 0\n\nhttps://c.org/x\n",
    )
    .unwrap();

    let output = fqd(&state).arg(&seeds).output().unwrap();
    assert!(
        output.status.success(),
        "fqd failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let out = stdout(&output);
    assert!(out.contains("READY"), "got: {out}");
    assert!(out.contains("fetched 4 of 4"), "got: {out}");

    let log = std::fs::read_to_string(state.path().join("fqd.log")).unwrap();
    assert!(log.contains("--- fqd: starting (pid: "));

    let reports = std::fs::read_to_string(state.path().join("report").join("fqd.jsonl")).unwrap();
    assert!(reports.contains("\"feeder_completed\":true"), "got: {reports}");
}

#[test]
fn missing_seeds_file_reports_error() {
    let state = TempDir::new().unwrap();
    let output = fqd(&state)
        .arg(state.path().join("nope.txt"))
        .output()
        .unwrap();
    assert!(!output.status.success());

    let log = std::fs::read_to_string(state.path().join("fqd.log")).unwrap();
    assert!(log.contains("ERROR Failed to start daemon: Failed to open seeds"));
}

#[test]
fn invalid_config_fails_before_start() {
    let state = TempDir::new().unwrap();
    std::fs::write(state.path().join("fq.toml"), "pool_threads = 0\n").unwrap();
    let seeds = state.path().join("seeds.txt");
    std::fs::write(&seeds, "http://a.com/1\n").unwrap();

    let output = fqd(&state).arg(&seeds).output().unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("pool_threads must be at least 1"));
}
