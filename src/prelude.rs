//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use dircap::prelude::*;
//! ```

// Core
pub use crate::core::bytesize::{format_size, parse_size};
pub use crate::core::config::Config;
pub use crate::core::errors::{DcError, Result};

// Registry
pub use crate::registry::{EvictionOrder, EvictionPolicy, Registry, WatchedDirectory};

// Probe and eviction
pub use crate::evict::{EvictionExecutor, EvictionPlan, EvictionReport, plan};
pub use crate::probe::{DirectoryMeasurement, FileCandidate, measure};

// Logging
pub use crate::logger::{ActivityEvent, LogSink, LoggerHandle, spawn_logger};

// Daemon
#[cfg(feature = "daemon")]
pub use crate::daemon::{LoopState, Monitor, MonitorHandle, SignalHandler};
