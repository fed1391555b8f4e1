//! Configuration system: TOML file + env var overrides + defaults.
//!
//! The effective [`Config`] is built once per invocation (defaults, then the
//! config file, then `QPRUNE_*` variables, then CLI flags) and handed to the
//! pruner by reference. Nothing reads configuration from global state.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{PruneError, Result};
use crate::logger::writer::LogFormat;
use crate::scanner::atime::AtimeErrorPolicy;

/// One quota megabyte.
pub const MIB: u64 = 1024 * 1024;

/// Full qprune configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    /// Root directories pruned when none are given on the command line.
    pub roots: Vec<PathBuf>,
    pub quota: QuotaThresholds,
    pub prune: PruneConfig,
    pub logging: LoggingConfig,
}

/// High/low-water marks in megabytes (MiB).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QuotaThresholds {
    /// Low-water mark: eviction stops once usage is at or below it.
    pub min_quota_mb: u64,
    /// High-water mark: a run only evicts when usage exceeds it.
    pub max_quota_mb: u64,
}

/// Pruning policy knobs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PruneConfig {
    /// Remove the root itself when eviction leaves it empty.
    pub reclaim_root: bool,
    /// Remove directories that already held no files before eviction started.
    pub sweep_empty_dirs: bool,
    /// Classify entries with `stat` instead of `lstat`.
    pub follow_symlinks: bool,
    pub atime_error_policy: AtimeErrorPolicy,
    /// Report what would be evicted without touching the filesystem.
    pub dry_run: bool,
}

/// Log sink settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_file: PathBuf,
    pub fallback_log_file: Option<PathBuf>,
    pub format: LogFormat,
}

impl QuotaThresholds {
    #[must_use]
    pub const fn new(min_quota_mb: u64, max_quota_mb: u64) -> Self {
        Self {
            min_quota_mb,
            max_quota_mb,
        }
    }

    /// Low-water mark in bytes.
    #[must_use]
    pub const fn min_bytes(&self) -> u64 {
        self.min_quota_mb.saturating_mul(MIB)
    }

    /// High-water mark in bytes.
    #[must_use]
    pub const fn max_bytes(&self) -> u64 {
        self.max_quota_mb.saturating_mul(MIB)
    }

    /// Whether `usage_bytes` is strictly above the high-water mark.
    #[must_use]
    pub const fn exceeds_max(&self, usage_bytes: u64) -> bool {
        usage_bytes > self.max_bytes()
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_quota_mb == 0 {
            return Err(PruneError::InvalidConfig {
                details: "quota.max_quota_mb must be > 0".to_string(),
            });
        }
        if self.min_quota_mb > self.max_quota_mb {
            return Err(PruneError::InvalidConfig {
                details: format!(
                    "quota.min_quota_mb ({}) must be <= quota.max_quota_mb ({})",
                    self.min_quota_mb, self.max_quota_mb
                ),
            });
        }
        Ok(())
    }
}

impl Default for QuotaThresholds {
    fn default() -> Self {
        Self::new(512, 1024)
    }
}

impl Default for PruneConfig {
    fn default() -> Self {
        Self {
            reclaim_root: false,
            sweep_empty_dirs: true,
            follow_symlinks: false,
            atime_error_policy: AtimeErrorPolicy::Abort,
            dry_run: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("/var/log/qprune.log"),
            fallback_log_file: None,
            format: LogFormat::Text,
        }
    }
}

impl Config {
    /// Default configuration path (`$HOME/.config/qprune/config.toml`).
    #[must_use]
    pub fn default_path() -> PathBuf {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!("[QP-CONFIG] WARNING: HOME not set, falling back to /tmp for config");
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        home_dir.join(".config").join("qprune").join("config.toml")
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| PruneError::Io {
                path: path_buf.clone(),
                source,
            })?;
            Self::from_toml_str(&raw)?
        } else if is_explicit_path {
            return Err(PruneError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.apply_env_overrides_from(env_var)?;
        cfg.normalize_paths();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML document without env overrides or validation.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("QPRUNE_MIN_QUOTA_MB") {
            self.quota.min_quota_mb = parse_env_u64("QPRUNE_MIN_QUOTA_MB", &raw)?;
        }
        if let Some(raw) = lookup("QPRUNE_MAX_QUOTA_MB") {
            self.quota.max_quota_mb = parse_env_u64("QPRUNE_MAX_QUOTA_MB", &raw)?;
        }
        if let Some(raw) = lookup("QPRUNE_LOG_FILE") {
            self.logging.log_file = PathBuf::from(raw.trim());
        }
        if let Some(raw) = lookup("QPRUNE_LOG_FORMAT") {
            self.logging.format = raw.parse().map_err(|details| PruneError::ConfigParse {
                context: "env",
                details: format!("QPRUNE_LOG_FORMAT={raw:?}: {details}"),
            })?;
        }
        if let Some(raw) = lookup("QPRUNE_ATIME_ERROR_POLICY") {
            self.prune.atime_error_policy =
                raw.parse().map_err(|details| PruneError::ConfigParse {
                    context: "env",
                    details: format!("QPRUNE_ATIME_ERROR_POLICY={raw:?}: {details}"),
                })?;
        }
        for (name, slot) in [
            ("QPRUNE_RECLAIM_ROOT", &mut self.prune.reclaim_root),
            ("QPRUNE_SWEEP_EMPTY_DIRS", &mut self.prune.sweep_empty_dirs),
            ("QPRUNE_FOLLOW_SYMLINKS", &mut self.prune.follow_symlinks),
            ("QPRUNE_DRY_RUN", &mut self.prune.dry_run),
        ] {
            if let Some(raw) = lookup(name) {
                *slot = parse_env_bool(name, &raw)?;
            }
        }
        Ok(())
    }

    /// Trim trailing slashes from root paths, keeping `/` intact.
    pub fn normalize_paths(&mut self) {
        for path in &mut self.roots {
            let s = path.to_string_lossy().to_string();
            if s.len() > 1
                && let Some(stripped) = s.strip_suffix('/')
            {
                *path = PathBuf::from(stripped);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.quota.validate()?;
        if self.logging.log_file.as_os_str().is_empty() {
            return Err(PruneError::InvalidConfig {
                details: "logging.log_file must not be empty".to_string(),
            });
        }
        if self.roots.iter().any(|r| r.as_os_str().is_empty()) {
            return Err(PruneError::InvalidConfig {
                details: "roots must not contain empty paths".to_string(),
            });
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_u64(name: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|error| PruneError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    raw.trim()
        .parse::<bool>()
        .map_err(|error| PruneError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}
