//! Structured activity logging: events, sinks, and the logger thread.

pub mod events;
pub mod jsonl;

pub use events::{ActivityEvent, LogSink, LoggerHandle, spawn_logger};
pub use jsonl::{JsonlConfig, JsonlWriter, LogEntry, Severity};
