//! Signal handling: SIGTERM/SIGINT graceful shutdown, SIGHUP registry reload,
//! SIGUSR1 immediate check.
//!
//! Uses the `signal-hook` crate for safe signal registration. The monitor
//! loop polls [`SignalHandler`] flags between entries and during sleeps
//! rather than blocking on signals.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::consts::{SIGINT, SIGTERM};

/// Thread-safe signal state shared between the signal handler and the monitor loop.
///
/// All flags use `Ordering::Relaxed` because the loop polls them every
/// iteration and exact ordering with other atomics is not required.
#[derive(Clone)]
pub struct SignalHandler {
    shutdown_flag: Arc<AtomicBool>,
    reload_flag: Arc<AtomicBool>,
    check_flag: Arc<AtomicBool>,
}

impl SignalHandler {
    /// Create a new handler and register OS signal hooks.
    ///
    /// SIGTERM/SIGINT -> shutdown, SIGHUP -> reload, SIGUSR1 -> immediate check.
    /// Registration is best-effort; failures are logged to stderr but not fatal.
    pub fn new() -> Self {
        let handler = Self::unregistered();
        handler.register_signals();
        handler
    }

    /// Create a handler with no OS hooks, for in-process control (tests,
    /// embedding as a library).
    pub fn unregistered() -> Self {
        Self {
            shutdown_flag: Arc::new(AtomicBool::new(false)),
            reload_flag: Arc::new(AtomicBool::new(false)),
            check_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Check whether a shutdown has been requested.
    pub fn should_shutdown(&self) -> bool {
        self.shutdown_flag.load(Ordering::Relaxed)
    }

    /// Check (and clear) whether a registry reload has been requested.
    pub fn should_reload(&self) -> bool {
        self.reload_flag.swap(false, Ordering::Relaxed)
    }

    /// Check (and clear) whether an immediate check has been requested.
    pub fn should_check_now(&self) -> bool {
        self.check_flag.swap(false, Ordering::Relaxed)
    }

    /// Programmatically request shutdown.
    pub fn request_shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::Relaxed);
    }

    /// Programmatically request a reload.
    pub fn request_reload(&self) {
        self.reload_flag.store(true, Ordering::Relaxed);
    }

    /// Programmatically request an immediate check.
    pub fn request_check_now(&self) {
        self.check_flag.store(true, Ordering::Relaxed);
    }

    fn register_signals(&self) {
        if let Err(e) = signal_hook::flag::register(SIGTERM, Arc::clone(&self.shutdown_flag)) {
            eprintln!("[DC-SIGNAL] failed to register SIGTERM: {e}");
        }
        if let Err(e) = signal_hook::flag::register(SIGINT, Arc::clone(&self.shutdown_flag)) {
            eprintln!("[DC-SIGNAL] failed to register SIGINT: {e}");
        }

        #[cfg(unix)]
        {
            use signal_hook::consts::{SIGHUP, SIGUSR1};
            if let Err(e) = signal_hook::flag::register(SIGHUP, Arc::clone(&self.reload_flag)) {
                eprintln!("[DC-SIGNAL] failed to register SIGHUP: {e}");
            }
            if let Err(e) = signal_hook::flag::register(SIGUSR1, Arc::clone(&self.check_flag)) {
                eprintln!("[DC-SIGNAL] failed to register SIGUSR1: {e}");
            }
        }
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_handler_default_state() {
        let handler = SignalHandler::unregistered();
        assert!(!handler.should_shutdown());
        assert!(!handler.should_reload());
        assert!(!handler.should_check_now());
    }

    #[test]
    fn programmatic_shutdown_request() {
        let handler = SignalHandler::unregistered();
        handler.request_shutdown();
        assert!(handler.should_shutdown());
        // Shutdown is sticky, not clear-on-read.
        assert!(handler.should_shutdown());
    }

    #[test]
    fn reload_flag_clears_on_read() {
        let handler = SignalHandler::unregistered();
        handler.request_reload();
        assert!(handler.should_reload());
        assert!(!handler.should_reload());
    }

    #[test]
    fn check_flag_clears_on_read() {
        let handler = SignalHandler::unregistered();
        handler.request_check_now();
        assert!(handler.should_check_now());
        assert!(!handler.should_check_now());
    }

    #[test]
    fn handler_is_clone_and_shared() {
        let handler = SignalHandler::unregistered();
        let h2 = handler.clone();
        handler.request_shutdown();
        assert!(h2.should_shutdown());
    }
}
