//! Long-running monitor daemon: signal handling and the eviction loop.

pub mod loop_main;
pub mod signals;

pub use loop_main::{LoopState, Monitor, MonitorHandle, write_pidfile};
pub use signals::SignalHandler;
