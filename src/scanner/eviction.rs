//! Eviction loop: delete oldest-accessed files until usage reaches the low-water mark.
//!
//! Pipeline: ordered candidates -> stop check -> delete one file -> account
//! freed bytes -> reclaim emptied parents -> stop check -> next.
//!
//! Stopping rule: `usage_estimate = total_usage - freed_bytes`; the loop stops
//! as soon as the estimate is at or below the target. It is checked before
//! the first candidate and after every successful deletion, so the file whose
//! removal crosses the threshold is the last one deleted.
//!
//! A failed deletion (already gone, permission, busy) is logged and skipped.
//! It frees nothing and never stops the loop.

#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::core::errors::PruneError;
use crate::core::paths::display_relative;
use crate::logger::activity::lossy;
use crate::logger::{ActivityEvent, EventSink};
use crate::scanner::reclaim::DirectoryReclaimer;
use crate::scanner::walker::FileRecord;

// ──────────────────── configuration ────────────────────

/// Configuration for the evictor.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvictionConfig {
    /// Count candidates as freed without deleting anything.
    pub dry_run: bool,
    /// Let the reclaimer remove the root once it is empty.
    pub reclaim_root: bool,
}

// ──────────────────── report types ────────────────────

/// Summary after an eviction pass completes.
#[derive(Debug, Clone, Default)]
pub struct EvictionReport {
    pub files_deleted: usize,
    pub bytes_freed: u64,
    /// Usage estimate when the loop stopped.
    pub usage_after_bytes: u64,
    /// Deleted (or, in dry-run, selected) paths in deletion order.
    pub deleted: Vec<PathBuf>,
    pub failures: Vec<DeletionFailure>,
    pub dirs_reclaimed: usize,
    /// Whether the loop reached its target rather than running out of files.
    pub target_reached: bool,
    pub duration: Duration,
    pub dry_run: bool,
}

/// A single deletion failure record.
#[derive(Debug, Clone)]
pub struct DeletionFailure {
    pub path: PathBuf,
    pub error: String,
    pub error_code: String,
}

// ──────────────────── evictor ────────────────────

/// Deletes ordered candidates under one root.
pub struct Evictor {
    config: EvictionConfig,
    reclaimer: DirectoryReclaimer,
}

impl Evictor {
    pub fn new(root: impl Into<PathBuf>, config: EvictionConfig) -> Self {
        Self {
            reclaimer: DirectoryReclaimer::new(root, config.reclaim_root),
            config,
        }
    }

    pub fn root(&self) -> &Path {
        self.reclaimer.root()
    }

    /// Delete `ordered` front to back until `total_usage_bytes - freed <= target_bytes`.
    pub fn evict(
        &self,
        ordered: &[FileRecord],
        total_usage_bytes: u64,
        target_bytes: u64,
        sink: &mut dyn EventSink,
    ) -> EvictionReport {
        let start = Instant::now();
        let mut report = EvictionReport {
            usage_after_bytes: total_usage_bytes,
            dry_run: self.config.dry_run,
            ..EvictionReport::default()
        };
        let root = lossy(self.root());

        for candidate in ordered {
            if report.usage_after_bytes <= target_bytes {
                break;
            }

            let shown = display_relative(self.root(), &candidate.path);
            if self.config.dry_run {
                sink.record(ActivityEvent::WouldDelete {
                    root: root.clone(),
                    path: shown,
                    size_bytes: candidate.size_bytes,
                });
            } else {
                if let Err(err) = delete_file(&candidate.path) {
                    sink.record(ActivityEvent::deletion_failed(self.root(), &err));
                    report.failures.push(DeletionFailure {
                        path: candidate.path.clone(),
                        error: err.to_string(),
                        error_code: err.code().to_string(),
                    });
                    continue;
                }
                sink.record(ActivityEvent::FileDeleted {
                    root: root.clone(),
                    path: shown,
                    size_bytes: candidate.size_bytes,
                });
            }

            report.files_deleted += 1;
            report.bytes_freed = report.bytes_freed.saturating_add(candidate.size_bytes);
            report.usage_after_bytes = total_usage_bytes.saturating_sub(report.bytes_freed);
            report.deleted.push(candidate.path.clone());

            if !self.config.dry_run
                && let Some(parent) = candidate.path.parent()
            {
                report.dirs_reclaimed += self.reclaimer.reclaim_from(parent, sink);
            }
        }

        report.target_reached = report.usage_after_bytes <= target_bytes;
        report.duration = start.elapsed();
        report
    }
}

fn delete_file(path: &Path) -> Result<(), PruneError> {
    fs::remove_file(path).map_err(|source| PruneError::Deletion {
        path: path.to_path_buf(),
        source,
    })
}

// ──────────────────── tests ────────────────────
