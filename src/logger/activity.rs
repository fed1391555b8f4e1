//! Events emitted during a prune run.

#![allow(missing_docs)]

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::config::MIB;
use crate::core::errors::PruneError;

/// Severity level for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARN",
            Self::Critical => "CRIT",
        }
    }
}

/// Everything a run reports. Paths are carried as lossy strings so every event
/// serializes, whatever bytes the filesystem handed back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ActivityEvent {
    RunStarted {
        root: String,
    },
    BelowThreshold {
        root: String,
        usage_bytes: u64,
        max_quota_mb: u64,
    },
    PruneStarted {
        root: String,
        usage_bytes: u64,
        max_quota_mb: u64,
        min_quota_mb: u64,
        files: usize,
    },
    EmptyDirRemoved {
        path: String,
    },
    FileDeleted {
        root: String,
        path: String,
        size_bytes: u64,
    },
    WouldDelete {
        root: String,
        path: String,
        size_bytes: u64,
    },
    DeletionFailed {
        root: String,
        path: String,
        error_code: String,
        error_message: String,
    },
    AccessTimeSkipped {
        root: String,
        path: String,
        error_message: String,
    },
    DirReclaimed {
        path: String,
    },
    ReclaimFailed {
        path: String,
        error_code: String,
        error_message: String,
    },
    TraversalFailed {
        root: String,
        error_code: String,
        error_message: String,
    },
    RunAborted {
        root: String,
        error_code: String,
        error_message: String,
    },
    RunCompleted {
        root: String,
        files_deleted: usize,
        bytes_freed: u64,
        usage_after_bytes: u64,
        dry_run: bool,
    },
}

impl ActivityEvent {
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::DeletionFailed { .. }
            | Self::AccessTimeSkipped { .. }
            | Self::ReclaimFailed { .. }
            | Self::TraversalFailed { .. } => Severity::Warning,
            Self::RunAborted { .. } => Severity::Critical,
            _ => Severity::Info,
        }
    }

    /// Build a `DeletionFailed` event from the error that caused it.
    pub fn deletion_failed(root: &Path, err: &PruneError) -> Self {
        Self::DeletionFailed {
            root: lossy(root),
            path: err.path().map(lossy).unwrap_or_default(),
            error_code: err.code().to_string(),
            error_message: err.to_string(),
        }
    }

    /// Build a `ReclaimFailed` event from the error that caused it.
    pub fn reclaim_failed(err: &PruneError) -> Self {
        Self::ReclaimFailed {
            path: err.path().map(lossy).unwrap_or_default(),
            error_code: err.code().to_string(),
            error_message: err.to_string(),
        }
    }

    /// One human-readable line, without timestamp or severity.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::RunStarted { root } => format!("[{root}] Scanning"),
            Self::BelowThreshold {
                root,
                usage_bytes,
                max_quota_mb,
            } => format!(
                "[{root}] Quota is below max allowed ({} / {max_quota_mb} MB), nothing to do",
                mb(*usage_bytes)
            ),
            Self::PruneStarted {
                root,
                usage_bytes,
                max_quota_mb,
                min_quota_mb,
                files,
            } => format!(
                "[{root}] Quota above max allowed ({} / {max_quota_mb} MB): pruning {files} files down to {min_quota_mb} MB",
                mb(*usage_bytes)
            ),
            Self::EmptyDirRemoved { path } => format!("Removed empty directory {path}"),
            Self::FileDeleted {
                root,
                path,
                size_bytes,
            } => format!("[{root}] Deleted {path} ({size_bytes} bytes)"),
            Self::WouldDelete {
                root,
                path,
                size_bytes,
            } => format!("[{root}] Would delete {path} ({size_bytes} bytes)"),
            Self::DeletionFailed {
                root,
                error_message,
                ..
            } => format!("[{root}] {error_message}"),
            Self::AccessTimeSkipped {
                root,
                path,
                error_message,
            } => format!("[{root}] Skipping {path}: {error_message}"),
            Self::DirReclaimed { path } => format!("Removed emptied directory {path}"),
            Self::ReclaimFailed { error_message, .. } => error_message.clone(),
            Self::TraversalFailed {
                root,
                error_message,
                ..
            } => format!("[{root}] Traversal failed, root skipped: {error_message}"),
            Self::RunAborted {
                root,
                error_message,
                ..
            } => format!("[{root}] Run aborted: {error_message}"),
            Self::RunCompleted {
                root,
                files_deleted,
                bytes_freed,
                usage_after_bytes,
                dry_run,
            } => {
                let verb = if *dry_run { "Would delete" } else { "Deleted" };
                format!(
                    "[{root}] {verb} {files_deleted} files (total: {} kB), usage now {} MB",
                    bytes_freed / 1024,
                    mb(*usage_after_bytes)
                )
            }
        }
    }
}

pub(crate) fn lossy(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn mb(bytes: u64) -> u64 {
    bytes / MIB
}
