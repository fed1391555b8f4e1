//! Access-time ordering of the inventory.
//!
//! Ordering happens in two phases. `resolve` fetches every file's access time
//! once (through a per-run [`AccessTimeCache`]) and writes it into the record;
//! this is the only place that touches the filesystem and the only place the
//! [`AtimeErrorPolicy`] is applied. `sort_by_access_time` then performs a
//! stable, side-effect-free sort on the resolved keys.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::errors::{PruneError, Result};
use crate::scanner::walker::{FileRecord, metadata_for_path};

/// What to do when a file's access time cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AtimeErrorPolicy {
    /// Fail the ordering; the run and the rest of the batch are abandoned.
    #[default]
    Abort,
    /// Drop the file from eviction candidacy and keep going.
    Skip,
}

impl FromStr for AtimeErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "skip" => Ok(Self::Skip),
            other => Err(format!("unknown policy {other:?} (expected abort|skip)")),
        }
    }
}

impl fmt::Display for AtimeErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Abort => "abort",
            Self::Skip => "skip",
        })
    }
}

/// Position of a record in the inventory as produced by the walker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub usize);

/// Per-run memo of resolved access times, keyed by inventory position.
#[derive(Debug, Default)]
pub struct AccessTimeCache {
    times: HashMap<FileId, i64>,
}

impl AccessTimeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: FileId) -> Option<i64> {
        self.times.get(&id).copied()
    }

    pub fn insert(&mut self, id: FileId, atime: i64) {
        self.times.insert(id, atime);
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// A file excluded from eviction because its access time was unreadable.
#[derive(Debug)]
pub struct SkippedFile {
    pub id: FileId,
    pub path: PathBuf,
    pub error: PruneError,
}

/// Candidates in eviction order plus whatever the policy dropped.
#[derive(Debug, Default)]
pub struct OrderedInventory {
    pub candidates: Vec<FileRecord>,
    pub skipped: Vec<SkippedFile>,
}

/// Resolves access times and orders records oldest first.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessTimeOrderer {
    policy: AtimeErrorPolicy,
    follow_symlinks: bool,
}

impl AccessTimeOrderer {
    pub fn new(policy: AtimeErrorPolicy, follow_symlinks: bool) -> Self {
        Self {
            policy,
            follow_symlinks,
        }
    }

    /// Fill in `access_time` for every record, querying each file at most once.
    ///
    /// Under `Abort` the first failure is returned as an error; under `Skip`
    /// failing records keep `access_time == None` and are reported back.
    pub fn resolve(
        &self,
        files: &mut [FileRecord],
        cache: &mut AccessTimeCache,
    ) -> Result<Vec<SkippedFile>> {
        let mut skipped = Vec::new();
        for (idx, record) in files.iter_mut().enumerate() {
            let id = FileId(idx);
            if let Some(atime) = cache.get(id) {
                record.access_time = Some(atime);
                continue;
            }
            match query_access_time(&record.path, self.follow_symlinks) {
                Ok(atime) => {
                    cache.insert(id, atime);
                    record.access_time = Some(atime);
                }
                Err(source) => {
                    let error = PruneError::AccessTime {
                        path: record.path.clone(),
                        source,
                    };
                    match self.policy {
                        AtimeErrorPolicy::Abort => return Err(error),
                        AtimeErrorPolicy::Skip => skipped.push(SkippedFile {
                            id,
                            path: record.path.clone(),
                            error,
                        }),
                    }
                }
            }
        }
        Ok(skipped)
    }

    /// Resolve, drop unresolved records, and sort oldest first.
    pub fn order(
        &self,
        mut files: Vec<FileRecord>,
        cache: &mut AccessTimeCache,
    ) -> Result<OrderedInventory> {
        let skipped = self.resolve(&mut files, cache)?;
        files.retain(|f| f.access_time.is_some());
        sort_by_access_time(&mut files);
        Ok(OrderedInventory {
            candidates: files,
            skipped,
        })
    }
}

/// Stable ascending sort on resolved access times; unresolved records sort last.
pub fn sort_by_access_time(files: &mut [FileRecord]) {
    files.sort_by_key(|f| f.access_time.unwrap_or(i64::MAX));
}

/// Last-access time of `path` in whole seconds since the Unix epoch.
///
/// When following symlinks, a dangling link reports its own access time, as
/// the walker keeps such links as leaf entries.
pub fn query_access_time(path: &Path, follow_symlinks: bool) -> io::Result<i64> {
    let meta = metadata_for_path(path, follow_symlinks)
        .or_else(|err| match err.kind() {
            io::ErrorKind::NotFound if follow_symlinks => fs::symlink_metadata(path),
            _ => Err(err),
        })?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        Ok(meta.atime())
    }
    #[cfg(not(unix))]
    {
        let accessed = meta.accessed()?;
        Ok(match accessed.duration_since(std::time::UNIX_EPOCH) {
            Ok(d) => i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
            Err(e) => -i64::try_from(e.duration().as_secs()).unwrap_or(i64::MAX),
        })
    }
}
