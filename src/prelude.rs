//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use qprune::prelude::*;
//! ```

// Core
pub use crate::core::config::{Config, LoggingConfig, MIB, PruneConfig, QuotaThresholds};
pub use crate::core::errors::{PruneError, Result};

// Logging
pub use crate::logger::writer::{ActivityLogWriter, LogFormat};
pub use crate::logger::{ActivityEvent, EventSink, MemorySink, Severity};

// Scanner
pub use crate::scanner::atime::{AccessTimeCache, AccessTimeOrderer, AtimeErrorPolicy};
pub use crate::scanner::eviction::{EvictionConfig, EvictionReport, Evictor};
pub use crate::scanner::reclaim::DirectoryReclaimer;
pub use crate::scanner::walker::{DirectoryWalker, FileRecord, Inventory, WalkerConfig};

// Orchestration
pub use crate::pruner::{BatchReport, PruneRun, RootResult, RunOutcome, RunPhase, run_batch};
