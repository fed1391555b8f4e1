//! Removal of directories left empty under a root.

#![allow(missing_docs)]

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::core::errors::PruneError;
use crate::core::paths::is_within;
use crate::logger::activity::lossy;
use crate::logger::{ActivityEvent, EventSink};

/// Removes empty directories beneath a root, never above it.
///
/// The root itself is only removed when `reclaim_root` is set.
#[derive(Debug, Clone)]
pub struct DirectoryReclaimer {
    root: PathBuf,
    reclaim_root: bool,
}

impl DirectoryReclaimer {
    pub fn new(root: impl Into<PathBuf>, reclaim_root: bool) -> Self {
        Self {
            root: root.into(),
            reclaim_root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Remove `dir` if empty, then each newly emptied ancestor.
    ///
    /// Stops at the first non-empty directory, at the first read/remove
    /// failure, or at the root. Returns how many directories were removed.
    pub fn reclaim_from(&self, dir: &Path, sink: &mut dyn EventSink) -> usize {
        let mut removed = 0;
        let mut current = dir.to_path_buf();
        loop {
            if !self.may_remove(&current) {
                break;
            }
            match self.remove_if_empty(&current) {
                Ok(true) => {
                    removed += 1;
                    sink.record(ActivityEvent::DirReclaimed {
                        path: lossy(&current),
                    });
                }
                Ok(false) => break,
                Err(err) => {
                    sink.record(ActivityEvent::reclaim_failed(&err));
                    break;
                }
            }
            if current == self.root {
                break;
            }
            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => break,
            }
        }
        removed
    }

    /// Remove directories that held no files at traversal time.
    ///
    /// `dirs` must list children before parents, as the walker produces them.
    /// Directories that gained entries since the walk are left alone.
    pub fn sweep(&self, dirs: &[PathBuf], sink: &mut dyn EventSink) -> usize {
        let mut removed = 0;
        for dir in dirs {
            if !self.may_remove(dir) {
                continue;
            }
            match self.remove_if_empty(dir) {
                Ok(true) => {
                    removed += 1;
                    sink.record(ActivityEvent::EmptyDirRemoved { path: lossy(dir) });
                }
                Ok(false) => {}
                Err(err) => sink.record(ActivityEvent::reclaim_failed(&err)),
            }
        }
        removed
    }

    fn may_remove(&self, dir: &Path) -> bool {
        is_within(&self.root, dir) && (self.reclaim_root || dir != self.root)
    }

    fn remove_if_empty(&self, dir: &Path) -> Result<bool, PruneError> {
        let empty = is_empty_dir(dir).map_err(|source| reclaim_error(dir, source))?;
        if !empty {
            return Ok(false);
        }
        fs::remove_dir(dir).map_err(|source| reclaim_error(dir, source))?;
        Ok(true)
    }
}

fn is_empty_dir(dir: &Path) -> io::Result<bool> {
    Ok(fs::read_dir(dir)?.next().is_none())
}

fn reclaim_error(dir: &Path, source: io::Error) -> PruneError {
    PruneError::Reclaim {
        path: dir.to_path_buf(),
        source,
    }
}
