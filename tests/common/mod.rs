#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::{SystemTime, UNIX_EPOCH};

use filetime::{FileTime, set_file_atime};

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_qprune") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) { "qprune.exe" } else { "qprune" };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve qprune binary path for integration test"),
    }
}

const QPRUNE_VARS: [&str; 10] = [
    "QPRUNE_MIN_QUOTA_MB",
    "QPRUNE_MAX_QUOTA_MB",
    "QPRUNE_LOG_FILE",
    "QPRUNE_LOG_FORMAT",
    "QPRUNE_RECLAIM_ROOT",
    "QPRUNE_SWEEP_EMPTY_DIRS",
    "QPRUNE_FOLLOW_SYMLINKS",
    "QPRUNE_ATIME_ERROR_POLICY",
    "QPRUNE_DRY_RUN",
    "QPRUNE_OUTPUT_FORMAT",
];

/// Run the binary with an isolated `HOME` (no user config) and no `QPRUNE_*`
/// variables inherited from the caller.
pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    let root = std::env::temp_dir().join("qprune-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let stamp = format!("{}-{}", sanitize(case_name), now_millis());
    let log_path = root.join(format!("{stamp}.log"));
    let home = root.join(format!("{stamp}-home"));
    fs::create_dir_all(&home).expect("create isolated home");
    let bin_path = resolve_bin_path();

    let mut command = Command::new(&bin_path);
    command
        .args(args)
        .env("HOME", &home)
        .env("RUST_BACKTRACE", "1");
    for var in QPRUNE_VARS {
        command.env_remove(var);
    }
    let output = command.output().expect("execute qprune command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");
    let _ = fs::remove_dir_all(&home);

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

/// Create `root/rel` holding `bytes` zero bytes with its access time pinned.
pub fn put_file(root: &Path, rel: &str, bytes: u64, atime: i64) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs");
    }
    fs::write(&path, vec![0u8; usize::try_from(bytes).expect("fixture size")])
        .expect("write fixture file");
    set_file_atime(&path, FileTime::from_unix_time(atime, 0)).expect("pin atime");
    path
}
