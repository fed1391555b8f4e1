#![forbid(unsafe_code)]

//! qprune: batch quota enforcer for on-disk caches.
//!
//! When the files under a root add up to more than the high-water mark
//! (`max_quota_mb`), qprune deletes them least-recently-accessed first until
//! usage is at or below the low-water mark (`min_quota_mb`), removing any
//! directory the deletions leave empty on the way.
//!
//! Pipeline per root:
//! 1. **Traversal**: read-only inventory of every file and its size
//! 2. **Gate**: nothing happens unless usage exceeds the high-water mark
//! 3. **Ordering**: access times resolved once, oldest first
//! 4. **Eviction**: delete until the low-water mark, reclaiming emptied directories
//!
//! # Library usage
//!
//! ```rust,no_run
//! use qprune::prelude::*;
//! use std::path::PathBuf;
//!
//! let config = Config::default();
//! let mut sink = MemorySink::new();
//! let report = run_batch(&config, &[PathBuf::from("/var/cache/objects")], &mut sink);
//! println!("freed {} bytes", report.bytes_freed());
//! ```

pub mod prelude;

pub mod core;
pub mod logger;
pub mod pruner;
pub mod scanner;
