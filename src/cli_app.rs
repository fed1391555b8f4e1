//! Command-line definition, config layering, and run summary output.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use clap::{CommandFactory, Parser};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use qprune::core::config::Config;
use qprune::core::errors::PruneError;
use qprune::logger::writer::{ActivityLogWriter, LogFormat};
use qprune::pruner::{BatchReport, RootResult, RunOutcome, run_batch};
use qprune::scanner::atime::AtimeErrorPolicy;

/// qprune keeps a cache directory between a low- and high-water mark by
/// deleting its least-recently-accessed files.
#[derive(Debug, Parser)]
#[command(
    name = "qprune",
    author,
    version,
    about = "Quota enforcer for on-disk caches",
    long_about = None
)]
pub struct Cli {
    /// Root directories to prune.
    #[arg(value_name = "ROOT")]
    roots: Vec<PathBuf>,
    /// Additional root directory (repeatable).
    #[arg(long = "root", value_name = "PATH")]
    extra_roots: Vec<PathBuf>,
    /// Low-water mark in MB: eviction stops at or below it.
    #[arg(long, value_name = "MB")]
    minquota: Option<u64>,
    /// High-water mark in MB: nothing is deleted unless usage exceeds it.
    #[arg(long, value_name = "MB")]
    maxquota: Option<u64>,
    /// Activity log destination.
    #[arg(long, value_name = "PATH")]
    logfile: Option<PathBuf>,
    /// Activity log line format (text|jsonl).
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<LogFormat>,
    /// Override config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// What to do when a file's access time cannot be read (abort|skip).
    #[arg(long, value_name = "POLICY")]
    on_atime_error: Option<AtimeErrorPolicy>,
    /// Allow removing a root that eviction leaves empty.
    #[arg(long)]
    reclaim_root: bool,
    /// Descend into symlinked directories and judge links by their targets.
    #[arg(long)]
    follow_symlinks: bool,
    /// Report what would be deleted without deleting anything.
    #[arg(long)]
    dry_run: bool,
    /// Print the run summary as JSON.
    #[arg(long)]
    json: bool,
    /// Disable colored output.
    #[arg(long)]
    no_color: bool,
    /// Print no summary (the activity log is still written).
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Bad arguments or configuration.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// A root could not be ordered; the batch was abandoned.
    #[error("{0}")]
    Fatal(String),
    /// Some roots were pruned, others failed.
    #[error("{0}")]
    Partial(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Json(_) | Self::Io(_) => 2,
            Self::Fatal(_) => 3,
            Self::Partial(_) => 4,
        }
    }
}

/// Load configuration, prune every root, and print the summary.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color || !io::stdout().is_terminal() {
        control::set_override(false);
    }

    let mut config = Config::load(cli.config.as_deref()).map_err(config_error)?;
    apply_cli_overrides(cli, &mut config);
    config.validate().map_err(config_error)?;

    let roots = select_roots(cli, &config);
    if roots.is_empty() {
        let usage = Cli::command().render_usage();
        return Err(CliError::User(format!(
            "no root directory given (pass ROOT, --root, or set `roots` in the config)\n\n{usage}"
        )));
    }

    let mut log = ActivityLogWriter::open(&config.logging);
    let report = run_batch(&config, &roots, &mut log);
    log.flush();

    if !cli.quiet {
        match output_mode(cli) {
            OutputMode::Human => emit_human_summary(&report, &config),
            OutputMode::Json => emit_json_summary(&report, &config)?,
        }
    }

    batch_status(&report)
}

/// CLI flags win over file and environment settings.
fn apply_cli_overrides(cli: &Cli, config: &mut Config) {
    if let Some(mb) = cli.minquota {
        config.quota.min_quota_mb = mb;
    }
    if let Some(mb) = cli.maxquota {
        config.quota.max_quota_mb = mb;
    }
    if let Some(path) = &cli.logfile {
        config.logging.log_file.clone_from(path);
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    if let Some(policy) = cli.on_atime_error {
        config.prune.atime_error_policy = policy;
    }
    config.prune.reclaim_root |= cli.reclaim_root;
    config.prune.follow_symlinks |= cli.follow_symlinks;
    config.prune.dry_run |= cli.dry_run;
}

/// Positional roots plus `--root`, or the configured roots when both are empty.
fn select_roots(cli: &Cli, config: &Config) -> Vec<PathBuf> {
    let roots: Vec<PathBuf> = cli.roots.iter().chain(&cli.extra_roots).cloned().collect();
    if roots.is_empty() {
        config.roots.clone()
    } else {
        roots
    }
}

fn config_error(err: PruneError) -> CliError {
    match err {
        PruneError::Io { .. } => CliError::Runtime(err.to_string()),
        _ => CliError::User(err.to_string()),
    }
}

fn batch_status(report: &BatchReport) -> Result<(), CliError> {
    if let Some(err) = report.fatal() {
        return Err(CliError::Fatal(format!("batch aborted: {err}")));
    }
    let failed = report.failed().count();
    let total = report.results.len();
    if failed == 0 {
        Ok(())
    } else if failed == total {
        Err(CliError::Runtime(format!(
            "all {total} roots failed; see the activity log"
        )))
    } else {
        Err(CliError::Partial(format!(
            "{failed} of {total} roots failed; see the activity log"
        )))
    }
}

// ──────────────────── summary output ────────────────────

fn emit_human_summary(report: &BatchReport, config: &Config) {
    for result in &report.results {
        println!("{}", human_line(result, config));
    }
    for root in &report.not_attempted {
        println!(
            "{} {}",
            root.display().to_string().bold(),
            "not attempted (batch aborted)".yellow()
        );
    }
    if report.results.len() > 1 {
        let verb = if config.prune.dry_run {
            "would free"
        } else {
            "freed"
        };
        println!(
            "{}",
            format!(
                "Total: {} files, {verb} {}",
                report.files_deleted(),
                format_bytes(report.bytes_freed())
            )
            .bold()
        );
    }
}

fn human_line(result: &RootResult, config: &Config) -> String {
    let root = result.root.display().to_string().bold();
    match &result.outcome {
        Ok(RunOutcome::BelowThreshold { usage_bytes, files }) => format!(
            "{root} {} ({} in {files} files, max {} MB)",
            "within quota".green(),
            format_bytes(*usage_bytes),
            config.quota.max_quota_mb
        ),
        Ok(RunOutcome::Pruned {
            usage_bytes,
            report,
            swept_dirs,
            skipped,
        }) => {
            let verb = if report.dry_run {
                "would delete"
            } else {
                "deleted"
            };
            let mut line = format!(
                "{root} {} {} files, {} -> {} (min {} MB)",
                verb.green(),
                report.files_deleted,
                format_bytes(*usage_bytes),
                format_bytes(report.usage_after_bytes),
                config.quota.min_quota_mb
            );
            let dirs = report.dirs_reclaimed + swept_dirs;
            if dirs > 0 {
                line.push_str(&format!(", {dirs} directories removed"));
            }
            if !report.failures.is_empty() {
                line.push_str(&format!(
                    ", {}",
                    format!("{} deletions failed", report.failures.len()).yellow()
                ));
            }
            if !skipped.is_empty() {
                line.push_str(&format!(
                    ", {}",
                    format!("{} files skipped", skipped.len()).yellow()
                ));
            }
            if !report.target_reached {
                line.push_str(&format!(", {}", "low-water mark not reached".yellow()));
            }
            line
        }
        Err(err) => format!("{root} {}", err.to_string().red()),
    }
}

fn emit_json_summary(report: &BatchReport, config: &Config) -> Result<(), CliError> {
    let roots: Vec<Value> = report.results.iter().map(root_json).collect();
    let not_attempted: Vec<String> = report
        .not_attempted
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();

    let payload = json!({
        "command": "prune",
        "min_quota_mb": config.quota.min_quota_mb,
        "max_quota_mb": config.quota.max_quota_mb,
        "dry_run": config.prune.dry_run,
        "files_deleted": report.files_deleted(),
        "bytes_freed": report.bytes_freed(),
        "roots": roots,
        "not_attempted": not_attempted,
    });
    write_json_line(&payload)
}

fn root_json(result: &RootResult) -> Value {
    let root = result.root.to_string_lossy();
    match &result.outcome {
        Ok(RunOutcome::BelowThreshold { usage_bytes, files }) => json!({
            "root": root,
            "status": "below_threshold",
            "usage_bytes": usage_bytes,
            "files": files,
            "files_deleted": 0,
            "bytes_freed": 0,
        }),
        Ok(RunOutcome::Pruned {
            usage_bytes,
            report,
            swept_dirs,
            skipped,
        }) => {
            let failures: Vec<Value> = report
                .failures
                .iter()
                .map(|f| {
                    json!({
                        "path": f.path.to_string_lossy(),
                        "error": f.error,
                        "error_code": f.error_code,
                    })
                })
                .collect();
            let skipped: Vec<String> = skipped
                .iter()
                .map(|s| s.path.to_string_lossy().into_owned())
                .collect();
            json!({
                "root": root,
                "status": "pruned",
                "usage_bytes": usage_bytes,
                "usage_after_bytes": report.usage_after_bytes,
                "files_deleted": report.files_deleted,
                "bytes_freed": report.bytes_freed,
                "dirs_reclaimed": report.dirs_reclaimed,
                "empty_dirs_swept": swept_dirs,
                "target_reached": report.target_reached,
                "duration_seconds": report.duration.as_secs_f64(),
                "failures": failures,
                "skipped": skipped,
            })
        }
        Err(err) => json!({
            "root": root,
            "status": "failed",
            "error_code": err.code(),
            "error": err.to_string(),
        }),
    }
}

#[allow(clippy::cast_precision_loss)]
fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    const GIB: u64 = 1024 * MIB;
    const TIB: u64 = 1024 * GIB;

    if bytes >= TIB {
        format!("{:.1} TB", bytes as f64 / TIB as f64)
    } else if bytes >= GIB {
        format!("{:.1} GB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("QPRUNE_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }
    match env_mode.map(str::trim).map(str::to_ascii_lowercase).as_deref() {
        Some("json") => OutputMode::Json,
        _ => OutputMode::Human,
    }
}
