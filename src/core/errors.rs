//! QP-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, PruneError>;

/// Top-level error type for qprune.
#[derive(Debug, Error)]
pub enum PruneError {
    #[error("[QP-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[QP-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[QP-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[QP-2001] cannot traverse {path}: {source}")]
    Traversal {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[QP-2002] cannot query access time of {path}: {source}")]
    AccessTime {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[QP-3001] cannot delete {path}: {source}")]
    Deletion {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[QP-3002] cannot reclaim directory {path}: {source}")]
    Reclaim {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[QP-3003] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[QP-3101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },
}

impl PruneError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "QP-1001",
            Self::MissingConfig { .. } => "QP-1002",
            Self::ConfigParse { .. } => "QP-1003",
            Self::Traversal { .. } => "QP-2001",
            Self::AccessTime { .. } => "QP-2002",
            Self::Deletion { .. } => "QP-3001",
            Self::Reclaim { .. } => "QP-3002",
            Self::Io { .. } => "QP-3003",
            Self::Serialization { .. } => "QP-3101",
        }
    }

    /// Whether the failure must stop the whole batch rather than one root.
    ///
    /// Only an access-time failure that escaped the configured policy is fatal;
    /// traversal failures are scoped to their root and deletion/reclaim
    /// failures never leave the eviction loop.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::AccessTime { .. })
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// The filesystem path the failure refers to, when there is one.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::MissingConfig { path }
            | Self::Traversal { path, .. }
            | Self::AccessTime { path, .. }
            | Self::Deletion { path, .. }
            | Self::Reclaim { path, .. }
            | Self::Io { path, .. } => Some(path),
            Self::InvalidConfig { .. } | Self::ConfigParse { .. } | Self::Serialization { .. } => {
                None
            }
        }
    }
}

impl From<serde_json::Error> for PruneError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for PruneError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
