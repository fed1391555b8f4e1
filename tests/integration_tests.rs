//! Integration tests: CLI behavior through the built binary and full-pipeline
//! scenarios through the library.

mod common;

use std::fs;
use std::path::Path;

use serde_json::Value;
use tempfile::TempDir;

use qprune::core::config::{Config, MIB, QuotaThresholds};
use qprune::logger::{ActivityEvent, MemorySink};
use qprune::pruner::{RunOutcome, run_batch};

use common::put_file;

fn read_log(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_default()
}

fn json_stdout(result: &common::CmdResult) -> Value {
    serde_json::from_str(result.stdout.trim()).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({e}); log: {}",
            result.log_path.display()
        )
    })
}

// ──────────────────── CLI ────────────────────

#[test]
fn help_prints_usage() {
    let result = common::run_cli_case("help_prints_usage", &["--help"]);
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stdout.contains("Usage: qprune [OPTIONS] [ROOT]..."),
        "missing help banner; log: {}",
        result.log_path.display()
    );
    for flag in ["--minquota", "--maxquota", "--logfile", "--root"] {
        assert!(result.stdout.contains(flag), "help lacks {flag}");
    }
}

#[test]
fn version_prints_version() {
    let result = common::run_cli_case("version_prints_version", &["--version"]);
    assert!(result.status.success());
    assert!(result.stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn no_roots_prints_usage_and_exits_1() {
    let result = common::run_cli_case("no_roots_prints_usage_and_exits_1", &[]);
    assert_eq!(
        result.status.code(),
        Some(1),
        "log: {}",
        result.log_path.display()
    );
    assert!(result.stderr.contains("no root directory given"));
    assert!(result.stderr.contains("Usage:"));
}

#[test]
fn inverted_quota_band_is_a_user_error() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_str().unwrap();
    let result = common::run_cli_case(
        "inverted_quota_band_is_a_user_error",
        &[root, "--minquota", "5", "--maxquota", "2"],
    );
    assert_eq!(result.status.code(), Some(1));
    assert!(result.stderr.contains("QP-1001"), "{}", result.stderr);
}

#[test]
fn explicit_missing_config_is_a_user_error() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.toml");
    let result = common::run_cli_case(
        "explicit_missing_config_is_a_user_error",
        &[
            tmp.path().to_str().unwrap(),
            "--config",
            missing.to_str().unwrap(),
        ],
    );
    assert_eq!(result.status.code(), Some(1));
    assert!(result.stderr.contains("QP-1002"));
}

#[test]
fn cli_evicts_least_recently_accessed_files() {
    let tmp = TempDir::new().unwrap();
    let cache = tmp.path().join("cache");
    put_file(&cache, "a", MIB, 100);
    put_file(&cache, "b", MIB, 50);
    put_file(&cache, "c", MIB, 200);
    let log = tmp.path().join("qprune.log");

    let result = common::run_cli_case(
        "cli_evicts_least_recently_accessed_files",
        &[
            cache.to_str().unwrap(),
            "--minquota",
            "1",
            "--maxquota",
            "2",
            "--logfile",
            log.to_str().unwrap(),
        ],
    );

    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(!cache.join("a").exists());
    assert!(!cache.join("b").exists());
    assert!(cache.join("c").exists());

    let text = read_log(&log);
    let b_line = text.find("Deleted b (1048576 bytes)").expect("b logged");
    let a_line = text.find("Deleted a (1048576 bytes)").expect("a logged");
    assert!(b_line < a_line, "oldest file deleted first:\n{text}");
    assert!(text.contains("Deleted 2 files (total: 2048 kB)"), "{text}");
    assert!(result.stdout.contains("deleted 2 files"), "{}", result.stdout);
}

#[test]
fn below_threshold_run_touches_nothing() {
    let tmp = TempDir::new().unwrap();
    let cache = tmp.path().join("cache");
    put_file(&cache, "a", MIB, 1);
    fs::create_dir_all(cache.join("empty")).unwrap();
    let log = tmp.path().join("qprune.log");

    let result = common::run_cli_case(
        "below_threshold_run_touches_nothing",
        &[
            cache.to_str().unwrap(),
            "--minquota",
            "1",
            "--maxquota",
            "2",
            "--logfile",
            log.to_str().unwrap(),
            "--json",
        ],
    );

    assert!(result.status.success());
    let payload = json_stdout(&result);
    assert_eq!(payload["roots"][0]["status"], "below_threshold");
    assert_eq!(payload["files_deleted"], 0);
    assert!(cache.join("a").exists());
    assert!(cache.join("empty").exists());
    assert!(read_log(&log).contains("nothing to do"));
}

#[test]
fn jsonl_log_format_writes_one_object_per_line() {
    let tmp = TempDir::new().unwrap();
    let cache = tmp.path().join("cache");
    put_file(&cache, "x/old", 2 * MIB, 1);
    put_file(&cache, "new", MIB, 2);
    let log = tmp.path().join("qprune.jsonl");

    let result = common::run_cli_case(
        "jsonl_log_format_writes_one_object_per_line",
        &[
            cache.to_str().unwrap(),
            "--minquota",
            "1",
            "--maxquota",
            "2",
            "--logfile",
            log.to_str().unwrap(),
            "--log-format",
            "jsonl",
            "-q",
        ],
    );

    assert!(result.status.success());
    assert!(result.stdout.is_empty(), "quiet mode prints nothing");
    let events: Vec<Value> = read_log(&log)
        .lines()
        .map(|line| serde_json::from_str(line).expect("valid JSON line"))
        .collect();
    let kinds: Vec<&str> = events
        .iter()
        .map(|e| e["event"].as_str().unwrap_or_default())
        .collect();
    assert_eq!(
        kinds,
        vec![
            "run_started",
            "prune_started",
            "file_deleted",
            "dir_reclaimed",
            "run_completed"
        ]
    );
    assert!(events.iter().all(|e| e["ts"].is_string()));
    assert!(!cache.join("x").exists());
}

#[test]
fn failed_root_does_not_stop_others_and_exits_partial() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("missing");
    let cache = tmp.path().join("cache");
    put_file(&cache, "big", 3 * MIB, 1);
    let log = tmp.path().join("qprune.log");

    let result = common::run_cli_case(
        "failed_root_does_not_stop_others_and_exits_partial",
        &[
            missing.to_str().unwrap(),
            "--root",
            cache.to_str().unwrap(),
            "--minquota",
            "1",
            "--maxquota",
            "2",
            "--logfile",
            log.to_str().unwrap(),
            "--json",
        ],
    );

    assert_eq!(
        result.status.code(),
        Some(4),
        "log: {}",
        result.log_path.display()
    );
    let payload = json_stdout(&result);
    assert_eq!(payload["roots"][0]["status"], "failed");
    assert_eq!(payload["roots"][0]["error_code"], "QP-2001");
    assert_eq!(payload["roots"][1]["status"], "pruned");
    assert!(!cache.join("big").exists());
}

#[test]
fn every_root_failing_exits_runtime() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("missing");
    let log = tmp.path().join("qprune.log");
    let result = common::run_cli_case(
        "every_root_failing_exits_runtime",
        &[
            missing.to_str().unwrap(),
            "--logfile",
            log.to_str().unwrap(),
        ],
    );
    assert_eq!(result.status.code(), Some(2));
    assert!(read_log(&log).contains("Traversal failed"));
}

#[test]
fn config_file_supplies_roots_and_thresholds() {
    let tmp = TempDir::new().unwrap();
    let cache = tmp.path().join("cache");
    put_file(&cache, "old", 2 * MIB, 1);
    put_file(&cache, "new", 2 * MIB, 2);
    let log = tmp.path().join("qprune.log");
    let config = tmp.path().join("config.toml");
    fs::write(
        &config,
        format!(
            "roots = [{:?}]\n\n[quota]\nmin_quota_mb = 2\nmax_quota_mb = 3\n\n[logging]\nlog_file = {:?}\n",
            cache.to_str().unwrap(),
            log.to_str().unwrap()
        ),
    )
    .unwrap();

    let result = common::run_cli_case(
        "config_file_supplies_roots_and_thresholds",
        &["--config", config.to_str().unwrap()],
    );

    assert!(
        result.status.success(),
        "log: {}",
        result.log_path.display()
    );
    assert!(!cache.join("old").exists());
    assert!(cache.join("new").exists());
    assert!(read_log(&log).contains("Deleted old"));
}

#[test]
fn dry_run_reports_without_deleting() {
    let tmp = TempDir::new().unwrap();
    let cache = tmp.path().join("cache");
    put_file(&cache, "a", 2 * MIB, 1);
    put_file(&cache, "b", 2 * MIB, 2);
    let log = tmp.path().join("qprune.log");

    let result = common::run_cli_case(
        "dry_run_reports_without_deleting",
        &[
            cache.to_str().unwrap(),
            "--minquota",
            "2",
            "--maxquota",
            "3",
            "--logfile",
            log.to_str().unwrap(),
            "--dry-run",
            "--json",
        ],
    );

    assert!(result.status.success());
    let payload = json_stdout(&result);
    assert_eq!(payload["dry_run"], true);
    assert_eq!(payload["files_deleted"], 1);
    assert!(cache.join("a").exists());
    assert!(read_log(&log).contains("Would delete a"));
}

// ──────────────────── library pipeline ────────────────────

fn quota(min_mb: u64, max_mb: u64) -> Config {
    Config {
        quota: QuotaThresholds::new(min_mb, max_mb),
        ..Config::default()
    }
}

#[test]
fn deleting_last_files_reclaims_directory_chain() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("cache");
    put_file(&root, "p/q/r/old", 2 * MIB, 1);
    put_file(&root, "p/keep", MIB, 5);
    put_file(&root, "newest", MIB, 9);

    let mut sink = MemorySink::new();
    let report = run_batch(&quota(2, 3), &[root.clone()], &mut sink);

    assert!(report.all_succeeded());
    assert_eq!(report.files_deleted(), 1);
    assert!(!root.join("p").join("q").exists());
    assert!(root.join("p").join("keep").exists());
    let reclaimed = sink.matching(|e| matches!(e, ActivityEvent::DirReclaimed { .. }));
    assert_eq!(reclaimed.len(), 2);
}

#[test]
fn file_vanishing_before_deletion_is_tolerated() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("cache");
    put_file(&root, "a", MIB, 1);
    put_file(&root, "b", MIB, 2);
    put_file(&root, "c", MIB, 3);

    // Order first, then remove the oldest file out from under the evictor.
    use qprune::scanner::atime::{AccessTimeCache, AccessTimeOrderer};
    use qprune::scanner::eviction::{EvictionConfig, Evictor};
    use qprune::scanner::walker::DirectoryWalker;

    let inventory = DirectoryWalker::default().walk(&root).unwrap();
    let total = inventory.total_bytes;
    let ordered = AccessTimeOrderer::default()
        .order(inventory.files, &mut AccessTimeCache::new())
        .unwrap();
    fs::remove_file(root.join("a")).unwrap();

    let mut sink = MemorySink::new();
    let report = Evictor::new(&root, EvictionConfig::default()).evict(
        &ordered.candidates,
        total,
        MIB,
        &mut sink,
    );

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.files_deleted, 2);
    assert_eq!(report.bytes_freed, 2 * MIB);
    assert!(!root.join("b").exists());
    assert!(!root.join("c").exists());
}

#[test]
fn reclaim_root_policy_removes_emptied_root_only() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("cache");
    put_file(&root, "only", 3 * MIB, 1);

    let mut config = quota(0, 2);
    config.prune.reclaim_root = true;
    let report = run_batch(&config, &[root.clone()], &mut MemorySink::new());

    match &report.results[0].outcome {
        Ok(RunOutcome::Pruned { report, .. }) => assert_eq!(report.dirs_reclaimed, 1),
        other => panic!("expected prune, got {other:?}"),
    }
    assert!(!root.exists());
    assert!(tmp.path().exists());
}
