use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant, SystemTime};
use tempfile::TempDir;

use runcached::cache::CachePaths;
use runcached::{CacheKey, CacheStore};

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn record(cache_dir: &Path, command: &[&str]) -> CachePaths {
    let store = CacheStore::new(cache_dir.to_path_buf(), false).unwrap();
    store.paths(&CacheKey::derive(&args(command)))
}

fn runcached(cache_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("runcached").unwrap();
    cmd.arg("--cache-dir").arg(cache_dir);
    cmd
}

/// Mark a refresh as just started so the call under test does not launch one
fn suppress_refresh(paths: &CachePaths) {
    fs::write(paths.start_marker(), "1\n").unwrap();
}

fn wait_for(path: &Path, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if path.exists() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    false
}

fn wait_for_content(path: &Path, expected: &str, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if fs::read_to_string(path).is_ok_and(|c| c.trim() == expected) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    false
}

fn backdate(path: &Path, secs: u64) {
    let then = filetime::FileTime::from_system_time(SystemTime::now() - Duration::from_secs(secs));
    filetime::set_file_mtime(path, then).unwrap();
}

#[test]
fn test_no_arguments_is_usage_error() {
    Command::cargo_bin("runcached")
        .unwrap()
        .assert()
        .code(98)
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_help_flag_exits_98() {
    let temp_dir = TempDir::new().unwrap();
    let cache_dir = temp_dir.path().join("cache");

    runcached(&cache_dir).arg("-h").assert().code(98);
    assert!(!cache_dir.exists());
}

#[test]
fn test_serves_cached_output_and_exit_code() {
    let temp_dir = TempDir::new().unwrap();
    let paths = record(temp_dir.path(), &["check_thing"]);
    fs::write(paths.stdout(), "OK - all good\n").unwrap();
    fs::write(paths.stderr(), "note\n").unwrap();
    fs::write(paths.exit_code(), "3").unwrap();

    for _ in 0..2 {
        runcached(temp_dir.path())
            .arg("check_thing")
            .assert()
            .code(3)
            .stdout("OK - all good\n")
            .stderr(predicate::str::contains("note"));
    }

    assert!(paths.caller_marker().exists());
}

#[test]
fn test_corrupt_exit_code_file() {
    let temp_dir = TempDir::new().unwrap();
    let paths = record(temp_dir.path(), &["check_thing"]);
    fs::write(paths.stdout(), "partial").unwrap();
    fs::write(paths.exit_code(), "not a number").unwrap();

    runcached(temp_dir.path())
        .arg("check_thing")
        .assert()
        .code(99)
        .stdout("");
}

#[test]
fn test_missing_exit_code_file() {
    let temp_dir = TempDir::new().unwrap();
    let paths = record(temp_dir.path(), &["check_thing"]);
    fs::write(paths.stdout(), "orphaned output").unwrap();
    suppress_refresh(&paths);

    runcached(temp_dir.path())
        .arg("check_thing")
        .assert()
        .code(102)
        .stdout("");
}

#[test]
fn test_expired_record_waits_for_refresh() {
    let temp_dir = TempDir::new().unwrap();
    let paths = record(temp_dir.path(), &["check_thing"]);
    fs::write(paths.stdout(), "old news\n").unwrap();
    fs::write(paths.exit_code(), "0").unwrap();
    let old = filetime::FileTime::from_system_time(
        std::time::SystemTime::now() - Duration::from_secs(3600),
    );
    filetime::set_file_mtime(paths.exit_code(), old).unwrap();
    suppress_refresh(&paths);

    runcached(temp_dir.path())
        .arg("check_thing")
        .assert()
        .code(100)
        .stdout("")
        .stderr(predicate::str::contains("WARNING"));
}

#[test]
fn test_max_age_override() {
    let temp_dir = TempDir::new().unwrap();
    let paths = record(temp_dir.path(), &["check_thing"]);
    fs::write(paths.stdout(), "fine\n").unwrap();
    fs::write(paths.exit_code(), "0").unwrap();
    let aged = filetime::FileTime::from_system_time(
        std::time::SystemTime::now() - Duration::from_secs(120),
    );
    filetime::set_file_mtime(paths.exit_code(), aged).unwrap();
    suppress_refresh(&paths);

    runcached(temp_dir.path())
        .arg("check_thing")
        .assert()
        .code(0)
        .stdout("fine\n");

    runcached(temp_dir.path())
        .args(["--max-age", "60", "check_thing"])
        .assert()
        .code(100);
}

#[test]
fn test_status_has_no_side_effects() {
    let temp_dir = TempDir::new().unwrap();
    let cache_dir = temp_dir.path().join("cache");

    for flag in ["-s", "--status", "--dryrun", "--dry-run"] {
        runcached(&cache_dir)
            .args([flag, "echo", "hi"])
            .assert()
            .success()
            .stdout(predicate::str::contains("no record yet"));
    }

    assert!(!cache_dir.exists());
}

#[test]
fn test_status_json() {
    let temp_dir = TempDir::new().unwrap();

    let output = runcached(temp_dir.path())
        .args(["-s", "--format", "json", "echo", "hi"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["command"], "echo hi");
    assert_eq!(report["refresh_due"], true);
    assert_eq!(report["decision"]["decision"], "no_record");
}

#[test]
fn test_execute_mode_then_serve() {
    let temp_dir = TempDir::new().unwrap();

    runcached(temp_dir.path())
        .args(["0", "echo", "hi"])
        .assert()
        .code(0)
        .stdout("");

    runcached(temp_dir.path())
        .args(["echo", "hi"])
        .assert()
        .code(0)
        .stdout("hi\n");
}

#[test]
fn test_execute_mode_caches_failure() {
    let temp_dir = TempDir::new().unwrap();

    runcached(temp_dir.path())
        .args(["0", "echo", "broken", ";", "exit", "2"])
        .assert()
        .code(2);

    runcached(temp_dir.path())
        .args(["echo", "broken", ";", "exit", "2"])
        .assert()
        .code(2)
        .stdout("broken\n");
}

#[test]
fn test_first_call_launches_background_refresh() {
    let temp_dir = TempDir::new().unwrap();
    let paths = record(temp_dir.path(), &["echo", "hi"]);

    runcached(temp_dir.path())
        .args(["echo", "hi"])
        .assert()
        .code(102);

    assert!(paths.start_marker().exists());
    assert!(
        wait_for(&paths.exit_code(), Duration::from_secs(10)),
        "background worker never published"
    );
    assert!(wait_for(&paths.worker_marker(), Duration::from_secs(5)));

    runcached(temp_dir.path())
        .args(["echo", "hi"])
        .assert()
        .code(0)
        .stdout("hi\n");
}

#[test]
fn test_reader_never_sees_unpublished_output() {
    let temp_dir = TempDir::new().unwrap();
    let command = ["printf", "new;", "sleep", "2"];
    let paths = record(temp_dir.path(), &command);
    fs::write(paths.stdout(), "old").unwrap();
    fs::write(paths.exit_code(), "0").unwrap();

    let mut worker = std::process::Command::new(assert_cmd::cargo::cargo_bin("runcached"))
        .arg("--cache-dir")
        .arg(temp_dir.path())
        .arg("0")
        .args(command)
        .spawn()
        .unwrap();

    std::thread::sleep(Duration::from_millis(500));
    runcached(temp_dir.path())
        .args(command)
        .assert()
        .code(0)
        .stdout("old");

    assert!(worker.wait().unwrap().success());
    runcached(temp_dir.path())
        .args(command)
        .assert()
        .code(0)
        .stdout("new");
}

#[test]
fn test_stale_record_served_while_refreshing() {
    let temp_dir = TempDir::new().unwrap();
    let paths = record(temp_dir.path(), &["echo", "new"]);
    fs::write(paths.stdout(), "old\n").unwrap();
    fs::write(paths.exit_code(), "5").unwrap();
    backdate(&paths.exit_code(), 120);

    runcached(temp_dir.path())
        .args(["echo", "new"])
        .assert()
        .code(5)
        .stdout("old\n");

    assert!(paths.start_marker().exists());
    assert!(
        wait_for_content(&paths.exit_code(), "0", Duration::from_secs(10)),
        "background worker never republished"
    );
    assert_eq!(fs::read_to_string(paths.stdout()).unwrap(), "new\n");

    runcached(temp_dir.path())
        .args(["echo", "new"])
        .assert()
        .code(0)
        .stdout("new\n");
}
