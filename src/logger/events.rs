//! Structured activity events and the logger thread.
//!
//! A dedicated logger thread owns the sink (stdout or a JSONL file). All
//! other threads send [`ActivityEvent`]s through a bounded crossbeam channel
//! via a cloneable [`LoggerHandle`]. Sends are non-blocking `try_send` — the
//! monitor loop is never stalled by logging back-pressure; overflow is
//! counted and reported instead.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::core::errors::{DcError, Result};
use crate::logger::jsonl::{JsonlConfig, JsonlWriter, LogEntry, Severity};

/// Events emitted by the daemon and the eviction pipeline.
#[derive(Debug, Clone)]
pub enum ActivityEvent {
    DaemonStarted {
        version: String,
        interval_secs: u64,
    },
    DaemonStopped {
        reason: String,
        uptime_secs: u64,
    },
    CycleStarted {
        cycle: u64,
        entries: usize,
    },
    CycleCompleted {
        cycle: u64,
        entries_checked: usize,
        entries_failed: usize,
        duration_ms: u64,
    },
    EntryScanned {
        path: String,
        total_bytes: u64,
        max_size_bytes: u64,
        candidates: usize,
        over_budget: bool,
    },
    EntrySkipped {
        path: String,
        reason: String,
    },
    EvictionPlanned {
        path: String,
        over_by: u64,
        files: usize,
        expected_bytes: u64,
        insufficient: bool,
    },
    FileDeleted {
        path: String,
        size_bytes: u64,
    },
    FileDeleteFailed {
        path: String,
        error_code: String,
        error_message: String,
    },
    EvictionCompleted {
        path: String,
        files_deleted: usize,
        files_failed: usize,
        freed_bytes: u64,
        duration_ms: u64,
    },
    Error {
        code: String,
        message: String,
    },
    /// Sentinel requesting graceful shutdown of the logger thread.
    Shutdown,
}

/// Where log lines go.
#[derive(Debug, Clone)]
pub enum LogSink {
    /// Interactive / foreground use: one JSON line per event on stdout.
    Stdout,
    /// Daemon use: append-only JSONL file with rotation.
    Jsonl(JsonlConfig),
}

/// Thread-safe, cheaply-cloneable handle for sending log events.
#[derive(Clone)]
pub struct LoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl LoggerHandle {
    /// Send an event to the logger thread. Non-blocking.
    ///
    /// If the channel is full the event is dropped and the dropped-events
    /// counter is incremented. Disconnected is fine during shutdown.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Number of events dropped due to channel back-pressure.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Request graceful shutdown of the logger thread.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }
}

/// Spawn the logger thread and return a handle plus its join handle.
pub fn spawn_logger(
    sink: LogSink,
    channel_capacity: usize,
) -> Result<(LoggerHandle, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded::<ActivityEvent>(channel_capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    let dropped_clone = Arc::clone(&dropped);

    let handle = LoggerHandle {
        tx,
        dropped_events: dropped,
    };

    let join = thread::Builder::new()
        .name("dircap-logger".to_string())
        .spawn(move || logger_thread_main(&rx, sink, &dropped_clone))
        .map_err(|e| DcError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

fn logger_thread_main(rx: &Receiver<ActivityEvent>, sink: LogSink, dropped: &AtomicU64) {
    let mut jsonl = match sink {
        LogSink::Stdout => None,
        LogSink::Jsonl(config) => Some(JsonlWriter::open(config)),
    };

    while let Ok(event) = rx.recv() {
        let d = dropped.swap(0, Ordering::Relaxed);
        if d > 0 {
            let entry = LogEntry::message(
                "logger",
                Severity::Warning,
                &format!("{d} log events dropped due to back-pressure"),
            );
            write_entry(jsonl.as_mut(), &entry);
        }

        if matches!(event, ActivityEvent::Shutdown) {
            if let Some(w) = jsonl.as_mut() {
                w.flush();
                w.fsync();
            }
            break;
        }

        let entry = event_to_entry(&event);
        write_entry(jsonl.as_mut(), &entry);
    }
}

fn write_entry(jsonl: Option<&mut JsonlWriter>, entry: &LogEntry) {
    match jsonl {
        Some(writer) => writer.write_entry(entry),
        None => match serde_json::to_string(entry) {
            Ok(line) => println!("{line}"),
            Err(e) => eprintln!("[DC-LOG] serialize error: {e}"),
        },
    }
}

#[allow(clippy::too_many_lines)]
fn event_to_entry(event: &ActivityEvent) -> LogEntry {
    match event {
        ActivityEvent::DaemonStarted {
            version,
            interval_secs,
        } => {
            let mut e = LogEntry::new("daemon_start", Severity::Info);
            e.details = Some(format!("dircap {version}, interval {interval_secs}s"));
            e
        }
        ActivityEvent::DaemonStopped {
            reason,
            uptime_secs,
        } => {
            let mut e = LogEntry::new("daemon_stop", Severity::Info);
            e.details = Some(format!("{reason}, uptime {uptime_secs}s"));
            e
        }
        ActivityEvent::CycleStarted { cycle, entries } => {
            let mut e = LogEntry::new("cycle_start", Severity::Info);
            e.cycle = Some(*cycle);
            e.details = Some(format!("{entries} enabled entries"));
            e
        }
        ActivityEvent::CycleCompleted {
            cycle,
            entries_checked,
            entries_failed,
            duration_ms,
        } => {
            let severity = if *entries_failed > 0 {
                Severity::Warning
            } else {
                Severity::Info
            };
            let mut e = LogEntry::new("cycle_end", severity);
            e.cycle = Some(*cycle);
            e.duration_ms = Some(*duration_ms);
            e.details = Some(format!("{entries_checked} checked, {entries_failed} failed"));
            e
        }
        ActivityEvent::EntryScanned {
            path,
            total_bytes,
            max_size_bytes,
            candidates,
            over_budget,
        } => {
            let mut e = LogEntry::new("entry_scanned", Severity::Info);
            e.path = Some(path.clone());
            e.size = Some(*total_bytes);
            e.threshold = Some(*max_size_bytes);
            e.details = Some(format!(
                "{candidates} candidates, over_budget={over_budget}"
            ));
            e
        }
        ActivityEvent::EntrySkipped { path, reason } => {
            let mut e = LogEntry::new("entry_skipped", Severity::Warning);
            e.path = Some(path.clone());
            e.details = Some(reason.clone());
            e
        }
        ActivityEvent::EvictionPlanned {
            path,
            over_by,
            files,
            expected_bytes,
            insufficient,
        } => {
            let severity = if *insufficient {
                Severity::Warning
            } else {
                Severity::Info
            };
            let mut e = LogEntry::new("eviction_planned", severity);
            e.path = Some(path.clone());
            e.size = Some(*expected_bytes);
            e.details = Some(format!(
                "over_by={over_by}, {files} files, insufficient={insufficient}"
            ));
            e
        }
        ActivityEvent::FileDeleted { path, size_bytes } => {
            let mut e = LogEntry::new("file_deleted", Severity::Info);
            e.path = Some(path.clone());
            e.size = Some(*size_bytes);
            e.ok = Some(true);
            e
        }
        ActivityEvent::FileDeleteFailed {
            path,
            error_code,
            error_message,
        } => {
            let mut e = LogEntry::new("file_delete_failed", Severity::Warning);
            e.path = Some(path.clone());
            e.ok = Some(false);
            e.error_code = Some(error_code.clone());
            e.details = Some(error_message.clone());
            e
        }
        ActivityEvent::EvictionCompleted {
            path,
            files_deleted,
            files_failed,
            freed_bytes,
            duration_ms,
        } => {
            let severity = if *files_failed > 0 {
                Severity::Warning
            } else {
                Severity::Info
            };
            let mut e = LogEntry::new("eviction_end", severity);
            e.path = Some(path.clone());
            e.size = Some(*freed_bytes);
            e.duration_ms = Some(*duration_ms);
            e.details = Some(format!("{files_deleted} deleted, {files_failed} failed"));
            e
        }
        ActivityEvent::Error { code, message } => {
            let mut e = LogEntry::new("error", Severity::Critical);
            e.error_code = Some(code.clone());
            e.details = Some(message.clone());
            e
        }
        ActivityEvent::Shutdown => LogEntry::new("daemon_stop", Severity::Info),
    }
}
