//! A single prune run over one root.
//!
//! Phases: `Idle -> Traversing -> BelowThreshold -> Done` when usage is within
//! quota, otherwise `Idle -> Traversing -> Ordering -> Evicting -> Done`.
//! Nothing on disk changes before the gate opens.

#![allow(missing_docs)]

use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::config::{Config, PruneConfig, QuotaThresholds};
use crate::core::errors::Result;
use crate::core::paths::{display_relative, resolve_absolute_path};
use crate::logger::activity::lossy;
use crate::logger::{ActivityEvent, EventSink};
use crate::scanner::atime::{AccessTimeCache, AccessTimeOrderer, SkippedFile};
use crate::scanner::eviction::{EvictionConfig, EvictionReport, Evictor};
use crate::scanner::reclaim::DirectoryReclaimer;
use crate::scanner::walker::{DirectoryWalker, WalkerConfig};

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Traversing,
    BelowThreshold,
    Ordering,
    Evicting,
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Traversing => "traversing",
            Self::BelowThreshold => "below_threshold",
            Self::Ordering => "ordering",
            Self::Evicting => "evicting",
            Self::Done => "done",
        })
    }
}

/// How a successful run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// Usage did not exceed the high-water mark; nothing was touched.
    BelowThreshold { usage_bytes: u64, files: usize },
    /// The gate opened and the evictor ran.
    Pruned {
        /// Usage measured by the traversal, before any deletion.
        usage_bytes: u64,
        report: EvictionReport,
        /// Pre-existing empty directories removed before eviction.
        swept_dirs: usize,
        /// Files left out of eviction because their access time was unreadable.
        skipped: Vec<SkippedFile>,
    },
}

impl RunOutcome {
    #[must_use]
    pub fn files_deleted(&self) -> usize {
        match self {
            Self::BelowThreshold { .. } => 0,
            Self::Pruned { report, .. } => report.files_deleted,
        }
    }

    #[must_use]
    pub fn bytes_freed(&self) -> u64 {
        match self {
            Self::BelowThreshold { .. } => 0,
            Self::Pruned { report, .. } => report.bytes_freed,
        }
    }

    /// Usage estimate once the run finished.
    #[must_use]
    pub fn usage_after_bytes(&self) -> u64 {
        match self {
            Self::BelowThreshold { usage_bytes, .. } => *usage_bytes,
            Self::Pruned { report, .. } => report.usage_after_bytes,
        }
    }
}

/// Orchestrates traversal, the quota gate, ordering, and eviction for one root.
#[derive(Debug)]
pub struct PruneRun {
    root: PathBuf,
    quota: QuotaThresholds,
    prune: PruneConfig,
    phase: RunPhase,
}

impl PruneRun {
    pub fn new(root: &Path, config: &Config) -> Self {
        Self {
            root: resolve_absolute_path(root),
            quota: config.quota,
            prune: config.prune,
            phase: RunPhase::Idle,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Run to completion.
    ///
    /// A traversal failure or a fatal access-time failure is logged, leaves
    /// the run in `Done`, and is returned to the caller.
    pub fn execute(&mut self, sink: &mut dyn EventSink) -> Result<RunOutcome> {
        let result = self.execute_phases(sink);
        self.phase = RunPhase::Done;
        result
    }

    fn execute_phases(&mut self, sink: &mut dyn EventSink) -> Result<RunOutcome> {
        let root_label = lossy(&self.root);

        self.phase = RunPhase::Traversing;
        sink.record(ActivityEvent::RunStarted {
            root: root_label.clone(),
        });
        let walker = DirectoryWalker::new(WalkerConfig {
            follow_symlinks: self.prune.follow_symlinks,
        });
        let inventory = walker.walk(&self.root).inspect_err(|err| {
            sink.record(ActivityEvent::TraversalFailed {
                root: root_label.clone(),
                error_code: err.code().to_string(),
                error_message: err.to_string(),
            });
        })?;
        let usage_bytes = inventory.total_bytes;

        if !self.quota.exceeds_max(usage_bytes) {
            self.phase = RunPhase::BelowThreshold;
            sink.record(ActivityEvent::BelowThreshold {
                root: root_label,
                usage_bytes,
                max_quota_mb: self.quota.max_quota_mb,
            });
            return Ok(RunOutcome::BelowThreshold {
                usage_bytes,
                files: inventory.len(),
            });
        }

        self.phase = RunPhase::Ordering;
        sink.record(ActivityEvent::PruneStarted {
            root: root_label.clone(),
            usage_bytes,
            max_quota_mb: self.quota.max_quota_mb,
            min_quota_mb: self.quota.min_quota_mb,
            files: inventory.len(),
        });

        let swept_dirs = if self.prune.sweep_empty_dirs && !self.prune.dry_run {
            DirectoryReclaimer::new(&self.root, self.prune.reclaim_root)
                .sweep(&inventory.empty_dirs, sink)
        } else {
            0
        };

        let orderer =
            AccessTimeOrderer::new(self.prune.atime_error_policy, self.prune.follow_symlinks);
        let mut cache = AccessTimeCache::new();
        let ordered = orderer
            .order(inventory.files, &mut cache)
            .inspect_err(|err| {
                sink.record(ActivityEvent::RunAborted {
                    root: root_label.clone(),
                    error_code: err.code().to_string(),
                    error_message: err.to_string(),
                });
            })?;
        for skipped in &ordered.skipped {
            sink.record(ActivityEvent::AccessTimeSkipped {
                root: root_label.clone(),
                path: display_relative(&self.root, &skipped.path),
                error_message: skipped.error.to_string(),
            });
        }

        self.phase = RunPhase::Evicting;
        let evictor = Evictor::new(
            &self.root,
            EvictionConfig {
                dry_run: self.prune.dry_run,
                reclaim_root: self.prune.reclaim_root,
            },
        );
        let report = evictor.evict(
            &ordered.candidates,
            usage_bytes,
            self.quota.min_bytes(),
            sink,
        );

        sink.record(ActivityEvent::RunCompleted {
            root: root_label,
            files_deleted: report.files_deleted,
            bytes_freed: report.bytes_freed,
            usage_after_bytes: report.usage_after_bytes,
            dry_run: report.dry_run,
        });

        Ok(RunOutcome::Pruned {
            usage_bytes,
            report,
            swept_dirs,
            skipped: ordered.skipped,
        })
    }
}
