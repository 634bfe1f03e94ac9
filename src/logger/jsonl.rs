//! JSONL log writer: append-only line-delimited JSON.
//!
//! Each line is a self-contained JSON object, assembled in memory and written
//! with a single `write_all` so a process tailing the file never sees an
//! interleaved partial line.
//!
//! Degradation chain — the daemon must never crash for logging failures:
//! 1. Primary file path
//! 2. stderr with a `[DC-LOG]` prefix
//! 3. Silent discard

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::SystemTime;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Severity level for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// A single JSONL log entry — all fields optional except `ts`, `event`, `severity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO 8601 UTC timestamp.
    pub ts: String,
    /// Event type identifier (snake_case).
    pub event: String,
    /// Severity level.
    pub severity: Severity,
    /// Affected filesystem path (when applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Size in bytes of the affected item or amount freed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Configured threshold for the entry involved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u64>,
    /// Monitor cycle counter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle: Option<u64>,
    /// Duration of the action in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Whether the action succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    /// DC error code if the action failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Freeform details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Create a new entry stamped with the current UTC time.
    pub fn new(event: &str, severity: Severity) -> Self {
        Self {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            event: event.to_string(),
            severity,
            path: None,
            size: None,
            threshold: None,
            cycle: None,
            duration_ms: None,
            ok: None,
            error_code: None,
            details: None,
        }
    }

    /// Shorthand for a detail-only entry.
    pub fn message(event: &str, severity: Severity, details: &str) -> Self {
        let mut entry = Self::new(event, severity);
        entry.details = Some(details.to_string());
        entry
    }
}

/// Degradation state of the JSONL writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Normal,
    Stderr,
    Discard,
}

/// Configuration for the JSONL writer.
#[derive(Debug, Clone)]
pub struct JsonlConfig {
    /// Primary log file path.
    pub path: PathBuf,
    /// Maximum file size before rotation (bytes).
    pub max_size_bytes: u64,
    /// Number of rotated files to keep.
    pub max_rotated_files: u32,
    /// Seconds between forced fsync calls.
    pub fsync_interval_secs: u64,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/dircap/activity.jsonl"),
            max_size_bytes: 10 * 1024 * 1024,
            max_rotated_files: 3,
            fsync_interval_secs: 30,
        }
    }
}

/// Append-only JSONL log writer with rotation and stderr fallback.
pub struct JsonlWriter {
    config: JsonlConfig,
    writer: Option<BufWriter<File>>,
    state: WriterState,
    bytes_written: u64,
    last_fsync: SystemTime,
}

impl JsonlWriter {
    /// Open the JSONL log file. Falls through the degradation chain on failure.
    pub fn open(config: JsonlConfig) -> Self {
        let mut w = Self {
            config,
            writer: None,
            state: WriterState::Discard,
            bytes_written: 0,
            last_fsync: SystemTime::now(),
        };
        w.try_open_primary();
        w
    }

    /// Write a single log entry as one atomic JSONL line.
    pub fn write_entry(&mut self, entry: &LogEntry) {
        let line = match serde_json::to_string(entry) {
            Ok(json) => format!("{json}\n"),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[DC-LOG] serialize error: {e}");
                return;
            }
        };
        self.write_line(&line);
    }

    /// Flush buffers.
    pub fn flush(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
    }

    /// Force an fsync on the underlying file.
    pub fn fsync(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
            let _ = w.get_ref().sync_data();
            self.last_fsync = SystemTime::now();
        }
    }

    fn try_open_primary(&mut self) {
        if let Some(parent) = self.config.path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.config.path)
        {
            Ok(file) => {
                self.bytes_written = file.metadata().map_or(0, |m| m.len());
                self.writer = Some(BufWriter::new(file));
                self.state = WriterState::Normal;
            }
            Err(e) => {
                let _ = writeln!(
                    io::stderr(),
                    "[DC-LOG] cannot open {}: {e}; logging to stderr",
                    self.config.path.display()
                );
                self.state = WriterState::Stderr;
            }
        }
    }

    fn write_line(&mut self, line: &str) {
        match self.state {
            WriterState::Normal => {
                self.maybe_rotate();
                let failed = match self.writer.as_mut() {
                    Some(w) => w.write_all(line.as_bytes()).is_err(),
                    None => true,
                };
                if failed {
                    // Demote to stderr; the line that failed goes there too.
                    self.writer = None;
                    self.state = WriterState::Stderr;
                    let _ = write!(io::stderr(), "[DC-LOG] {line}");
                    return;
                }
                self.bytes_written += line.len() as u64;
                self.maybe_fsync();
            }
            WriterState::Stderr => {
                if write!(io::stderr(), "[DC-LOG] {line}").is_err() {
                    self.state = WriterState::Discard;
                }
            }
            WriterState::Discard => {}
        }
    }

    fn maybe_fsync(&mut self) {
        let due = self
            .last_fsync
            .elapsed()
            .map_or(true, |e| e.as_secs() >= self.config.fsync_interval_secs);
        if due {
            self.fsync();
        }
    }

    fn maybe_rotate(&mut self) {
        if self.bytes_written < self.config.max_size_bytes {
            return;
        }

        self.flush();
        self.writer = None;

        // Shift activity.jsonl.N -> activity.jsonl.N+1, dropping the oldest.
        for i in (1..self.config.max_rotated_files).rev() {
            let from = rotated_path(&self.config.path, i);
            let to = rotated_path(&self.config.path, i + 1);
            let _ = fs::rename(&from, &to);
        }
        if self.config.max_rotated_files > 0 {
            let _ = fs::rename(&self.config.path, rotated_path(&self.config.path, 1));
        } else {
            let _ = fs::remove_file(&self.config.path);
        }

        self.bytes_written = 0;
        self.try_open_primary();
    }
}

fn rotated_path(base: &std::path::Path, index: u32) -> PathBuf {
    let mut name = base
        .file_name()
        .map_or_else(|| "activity.jsonl".into(), std::ffi::OsStr::to_os_string);
    name.push(format!(".{index}"));
    base.with_file_name(name)
}
