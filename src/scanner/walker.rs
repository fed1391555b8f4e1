//! Sequential directory walker producing the eviction inventory.
//!
//! The walk is read-only: it lists every file under a root, sums their sizes,
//! and reports directories whose subtree holds no files so the caller can
//! decide whether to remove them. Any directory that cannot be listed fails
//! the whole walk, because a partial inventory would under-count usage.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use crate::core::errors::{PruneError, Result};

/// Walker configuration derived from `PruneConfig`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkerConfig {
    /// Classify entries with `stat` (symlinks take their target's type).
    pub follow_symlinks: bool,
}

/// One file under the root, as seen at traversal time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: PathBuf,
    /// Size when the walk saw it; may be stale by the time it is deleted.
    pub size_bytes: u64,
    /// Seconds since the Unix epoch; filled in by the access-time orderer.
    pub access_time: Option<i64>,
}

impl FileRecord {
    pub fn new(path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            size_bytes,
            access_time: None,
        }
    }
}

/// Everything one walk found under a root.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub root: PathBuf,
    /// Files in traversal order (name order within each directory, depth first).
    pub files: Vec<FileRecord>,
    pub total_bytes: u64,
    /// Directories with no files anywhere beneath them, children before parents.
    pub empty_dirs: Vec<PathBuf>,
}

impl Inventory {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Accumulator threaded through the recursion.
struct WalkState {
    files: Vec<FileRecord>,
    total_bytes: u64,
    empty_dirs: Vec<PathBuf>,
    /// (device, inode) of every directory entered; only consulted when
    /// following symlinks, where a link back up the tree would otherwise loop.
    visited: HashSet<(u64, u64)>,
}

/// Recursive walker over a single root.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryWalker {
    config: WalkerConfig,
}

impl DirectoryWalker {
    pub fn new(config: WalkerConfig) -> Self {
        Self { config }
    }

    /// Walk `root` and return its inventory.
    pub fn walk(&self, root: &Path) -> Result<Inventory> {
        let meta = metadata_for_path(root, self.config.follow_symlinks)
            .map_err(|source| traversal(root, source))?;
        if !meta.is_dir() {
            return Err(traversal(
                root,
                io::Error::new(ErrorKind::NotADirectory, "root is not a directory"),
            ));
        }

        let mut state = WalkState {
            files: Vec::new(),
            total_bytes: 0,
            empty_dirs: Vec::new(),
            visited: HashSet::new(),
        };
        state.visited.insert(dir_identity(&meta));
        self.walk_dir(root, &mut state)?;

        Ok(Inventory {
            root: root.to_path_buf(),
            files: state.files,
            total_bytes: state.total_bytes,
            empty_dirs: state.empty_dirs,
        })
    }

    /// Returns whether any file was found at or below `dir`.
    fn walk_dir(&self, dir: &Path, state: &mut WalkState) -> Result<bool> {
        let mut children: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(|source| traversal(dir, source))?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<_>>()
            .map_err(|source| traversal(dir, source))?;
        children.sort_unstable_by(|a, b| a.file_name().cmp(&b.file_name()));

        let mut found_files = false;
        for child in children {
            let meta = match self.child_metadata(&child) {
                Ok(m) => m,
                // Removed between listing and stat: nothing left to count.
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(source) => return Err(traversal(&child, source)),
            };

            if meta.is_dir() {
                if self.config.follow_symlinks && !state.visited.insert(dir_identity(&meta)) {
                    continue;
                }
                if self.walk_dir(&child, state)? {
                    found_files = true;
                }
            } else {
                let size = meta.len();
                state.total_bytes = state.total_bytes.saturating_add(size);
                state.files.push(FileRecord::new(child, size));
                found_files = true;
            }
        }

        if !found_files {
            state.empty_dirs.push(dir.to_path_buf());
        }
        Ok(found_files)
    }

    fn child_metadata(&self, path: &Path) -> io::Result<fs::Metadata> {
        if self.config.follow_symlinks {
            // A dangling link is still an entry that can be evicted.
            fs::metadata(path).or_else(|_| fs::symlink_metadata(path))
        } else {
            fs::symlink_metadata(path)
        }
    }
}

fn traversal(path: &Path, source: io::Error) -> PruneError {
    PruneError::Traversal {
        path: path.to_path_buf(),
        source,
    }
}

pub(crate) fn metadata_for_path(path: &Path, follow_symlinks: bool) -> io::Result<fs::Metadata> {
    if follow_symlinks {
        fs::metadata(path)
    } else {
        fs::symlink_metadata(path)
    }
}

/// (device, inode) pair identifying a directory across symlinked paths.
fn dir_identity(meta: &fs::Metadata) -> (u64, u64) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        (meta.dev(), meta.ino())
    }
    #[cfg(not(unix))]
    {
        let _ = meta;
        (0, 0)
    }
}
