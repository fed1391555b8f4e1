//! Append-only activity log writer.
//!
//! Each event becomes one line, either human-readable text or a JSON object.
//! Each line is assembled in memory and handed to the buffered writer with one
//! `write_all`. A failed write or flush moves the writer down the chain below.
//!
//! Four-level fallback chain:
//! 1. Primary file path
//! 2. Fallback path, when configured
//! 3. stderr with `[QP-LOG]` prefix
//! 4. Silent discard (a prune run never fails because of logging)

#![allow(missing_docs)]

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::config::LoggingConfig;
use crate::core::errors::{PruneError, Result};
use crate::logger::EventSink;
use crate::logger::activity::{ActivityEvent, Severity};

/// Line format of the activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// `<ts> <LEVEL> <message>`
    #[default]
    Text,
    /// One self-contained JSON object per line.
    Jsonl,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "jsonl" | "json" => Ok(Self::Jsonl),
            other => Err(format!("unknown log format {other:?} (expected text|jsonl)")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Jsonl => "jsonl",
        })
    }
}

/// JSONL record: timestamp and severity, then the event's own fields.
#[derive(Serialize)]
struct LogEntry<'a> {
    ts: String,
    severity: Severity,
    #[serde(flatten)]
    event: &'a ActivityEvent,
}

/// Degradation state of the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Normal,
    Fallback,
    Stderr,
    Discard,
}

/// Activity log writer with multi-level fallback.
pub struct ActivityLogWriter {
    path: PathBuf,
    fallback_path: Option<PathBuf>,
    format: LogFormat,
    writer: Option<BufWriter<File>>,
    state: WriterState,
    lines_written: u64,
}

impl ActivityLogWriter {
    /// Open the log file. Falls through the degradation chain on failure.
    pub fn open(config: &LoggingConfig) -> Self {
        let mut w = Self {
            path: config.log_file.clone(),
            fallback_path: config.fallback_log_file.clone(),
            format: config.format,
            writer: None,
            state: WriterState::Discard,
            lines_written: 0,
        };
        w.try_open_primary();
        w
    }

    /// Write one event as a single line.
    pub fn write_event(&mut self, event: &ActivityEvent) {
        let line = match self.format {
            LogFormat::Text => format!(
                "{} {} {}\n",
                format_utc_now(),
                event.severity().label(),
                event.describe()
            ),
            LogFormat::Jsonl => {
                let entry = LogEntry {
                    ts: format_utc_now(),
                    severity: event.severity(),
                    event,
                };
                match serde_json::to_string(&entry) {
                    Ok(json) => format!("{json}\n"),
                    Err(e) => {
                        let _ = writeln!(io::stderr(), "[QP-LOG] serialize error: {e}");
                        return;
                    }
                }
            }
        };
        self.write_line(&line);
    }

    /// Flush buffered lines. On failure the buffered lines are lost, the
    /// failure is reported on stderr, and the writer degrades one level.
    pub fn flush(&mut self) {
        let failed = self.writer.as_mut().is_some_and(|w| w.flush().is_err());
        if failed {
            let _ = writeln!(
                io::stderr(),
                "[QP-LOG] flush failed, buffered lines may be lost"
            );
            self.degrade();
        }
    }

    /// Current degradation state.
    pub fn state(&self) -> &str {
        match self.state {
            WriterState::Normal => "normal",
            WriterState::Fallback => "fallback",
            WriterState::Stderr => "stderr",
            WriterState::Discard => "discard",
        }
    }

    /// Number of lines handed to a file (primary or fallback).
    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    // ──────────────────────── internals ────────────────────────

    fn write_line(&mut self, line: &str) {
        match self.state {
            WriterState::Normal | WriterState::Fallback => {
                if let Some(w) = self.writer.as_mut() {
                    if w.write_all(line.as_bytes()).is_err() {
                        self.degrade();
                        self.write_line(line); // retry at next level
                        return;
                    }
                    self.lines_written += 1;
                } else {
                    self.degrade();
                    self.write_line(line);
                }
            }
            WriterState::Stderr => {
                let _ = write!(io::stderr(), "[QP-LOG] {line}");
            }
            WriterState::Discard => {}
        }
    }

    fn try_open_primary(&mut self) {
        match open_append(&self.path) {
            Ok(file) => {
                self.writer = Some(BufWriter::new(file));
                self.state = WriterState::Normal;
            }
            Err(e) => {
                let _ = writeln!(io::stderr(), "[QP-LOG] couldn't open log file: {e}");
                self.try_open_fallback();
            }
        }
    }

    fn try_open_fallback(&mut self) {
        if let Some(fb) = &self.fallback_path {
            if let Ok(file) = open_append(fb) {
                let _ = writeln!(
                    io::stderr(),
                    "[QP-LOG] primary path failed, using fallback: {}",
                    fb.display()
                );
                self.writer = Some(BufWriter::new(file));
                self.state = WriterState::Fallback;
            } else {
                self.state = WriterState::Stderr;
                let _ = writeln!(
                    io::stderr(),
                    "[QP-LOG] both primary and fallback paths failed, using stderr"
                );
            }
        } else {
            self.state = WriterState::Stderr;
            let _ = writeln!(
                io::stderr(),
                "[QP-LOG] primary path failed and no fallback configured, using stderr"
            );
        }
    }

    fn degrade(&mut self) {
        self.writer = None;
        match self.state {
            WriterState::Normal => self.try_open_fallback(),
            WriterState::Fallback => {
                self.state = WriterState::Stderr;
                let _ = writeln!(io::stderr(), "[QP-LOG] fallback write failed, using stderr");
            }
            WriterState::Stderr => self.state = WriterState::Discard,
            WriterState::Discard => {}
        }
    }
}

impl EventSink for ActivityLogWriter {
    fn record(&mut self, event: ActivityEvent) {
        self.write_event(&event);
    }
}

impl Drop for ActivityLogWriter {
    fn drop(&mut self) {
        self.flush();
    }
}

// ──────────────────────── helpers ────────────────────────

/// Open or create a file for appending, creating missing parent directories.
fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| PruneError::io(parent, source))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| PruneError::io(path, source))
}

/// Format current UTC time as ISO 8601.
fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

// ──────────────────────── tests ────────────────────────
