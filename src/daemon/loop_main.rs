//! The monitor loop: periodically measure enabled watched directories and
//! evict when over budget.
//!
//! Single long-lived control loop; CLI invocations run concurrently as
//! separate short-lived processes against the same persisted registry, which
//! is why every registry access goes through the locked [`Registry`] handle
//! and the loop only ever holds a per-cycle snapshot.
//!
//! Cancellation contract: the stop flag is honored at every sleep point and
//! between entries, never mid-deletion of a single file — deleting one file
//! is an atomic unit.

#![allow(missing_docs)]

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::RwLock;

use crate::core::config::Config;
use crate::core::errors::{DcError, Result};
use crate::daemon::signals::SignalHandler;
use crate::evict::{EvictionExecutor, planner};
use crate::logger::{ActivityEvent, LoggerHandle};
use crate::probe;
use crate::registry::{EvictionPolicy, Registry, WatchedDirectory};

/// Poll granularity for cancellable sleeps.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Observable loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Between cycles.
    Idle,
    /// Measuring an entry.
    Scanning,
    /// Executing an eviction plan.
    Evicting,
    /// Loop has exited.
    Stopped,
}

/// The monitor daemon: an explicit, constructible object so multiple
/// instances can run (and be tested) in one process.
pub struct Monitor {
    config: Config,
    registry: Registry,
    signals: SignalHandler,
    logger: LoggerHandle,
    executor: EvictionExecutor,
    state: Arc<RwLock<LoopState>>,
    cycle: u64,
}

/// Handle to a monitor running on a background thread.
pub struct MonitorHandle {
    signals: SignalHandler,
    state: Arc<RwLock<LoopState>>,
    join: Option<thread::JoinHandle<Result<()>>>,
}

impl MonitorHandle {
    /// Request a graceful stop. The loop finishes the entry in progress first.
    pub fn request_stop(&self) {
        self.signals.request_shutdown();
    }

    /// Current loop state.
    pub fn state(&self) -> LoopState {
        *self.state.read()
    }

    /// Wait for the loop thread to exit.
    pub fn join(mut self) -> Result<()> {
        match self.join.take() {
            Some(handle) => handle.join().map_err(|_| DcError::Runtime {
                details: "monitor thread panicked".to_string(),
            })?,
            None => Ok(()),
        }
    }
}

impl Monitor {
    /// Build a monitor from configuration and collaborators.
    #[must_use]
    pub fn new(
        config: Config,
        registry: Registry,
        signals: SignalHandler,
        logger: LoggerHandle,
    ) -> Self {
        let executor = EvictionExecutor::new(Some(logger.clone()));
        Self {
            config,
            registry,
            signals,
            logger,
            executor,
            state: Arc::new(RwLock::new(LoopState::Idle)),
            cycle: 0,
        }
    }

    /// Signal handler driving this monitor (for host-process wiring).
    pub fn signals(&self) -> &SignalHandler {
        &self.signals
    }

    /// Spawn the loop on a background thread and return its lifecycle handle.
    pub fn start(mut self) -> Result<MonitorHandle> {
        let signals = self.signals.clone();
        let state = Arc::clone(&self.state);
        let join = thread::Builder::new()
            .name("dircap-monitor".to_string())
            .spawn(move || self.run())
            .map_err(|e| DcError::Runtime {
                details: format!("failed to spawn monitor thread: {e}"),
            })?;
        Ok(MonitorHandle {
            signals,
            state,
            join: Some(join),
        })
    }

    /// Run the loop on the current thread until stop is requested.
    pub fn run(&mut self) -> Result<()> {
        let started = Instant::now();
        self.logger.send(ActivityEvent::DaemonStarted {
            version: env!("CARGO_PKG_VERSION").to_string(),
            interval_secs: self.config.daemon.interval_secs,
        });

        while !self.signals.should_shutdown() {
            let cycle_started = Instant::now();
            self.run_cycle();

            let interval = self.config.cycle_interval();
            let elapsed = cycle_started.elapsed();
            if elapsed > interval {
                self.logger.send(ActivityEvent::Error {
                    code: "DC-3900".to_string(),
                    message: format!(
                        "cycle {} took {:.1}s, longer than the {}s interval",
                        self.cycle,
                        elapsed.as_secs_f64(),
                        interval.as_secs()
                    ),
                });
            }
            self.idle_sleep(interval.saturating_sub(elapsed));
        }

        *self.state.write() = LoopState::Stopped;
        self.logger.send(ActivityEvent::DaemonStopped {
            reason: "stop requested".to_string(),
            uptime_secs: started.elapsed().as_secs(),
        });
        Ok(())
    }

    /// One full pass over all enabled entries.
    ///
    /// A registry load failure aborts the cycle (retried after the sleep);
    /// a failure on one entry never stops the remaining entries.
    fn run_cycle(&mut self) {
        self.cycle += 1;

        let snapshot = match self.registry.snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.logger.send(ActivityEvent::Error {
                    code: e.code().to_string(),
                    message: format!("registry load failed, skipping cycle: {e}"),
                });
                return;
            }
        };
        if snapshot.skipped_records > 0 {
            self.logger.send(ActivityEvent::Error {
                code: "DC-1001".to_string(),
                message: format!(
                    "{} malformed registry records skipped",
                    snapshot.skipped_records
                ),
            });
        }

        let enabled: Vec<WatchedDirectory> =
            snapshot.entries.into_iter().filter(|e| e.enabled).collect();
        self.logger.send(ActivityEvent::CycleStarted {
            cycle: self.cycle,
            entries: enabled.len(),
        });

        let started = Instant::now();
        let mut checked = 0usize;
        let mut failed = 0usize;
        for entry in &enabled {
            if self.signals.should_shutdown() {
                break;
            }
            match self.process_entry(entry) {
                Ok(()) => checked += 1,
                Err(e) => {
                    failed += 1;
                    self.logger.send(ActivityEvent::EntrySkipped {
                        path: entry.path.to_string_lossy().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        *self.state.write() = LoopState::Idle;
        self.logger.send(ActivityEvent::CycleCompleted {
            cycle: self.cycle,
            entries_checked: checked,
            entries_failed: failed,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        });
    }

    /// Measure one entry and evict if over budget.
    fn process_entry(&self, entry: &WatchedDirectory) -> Result<()> {
        *self.state.write() = LoopState::Scanning;

        let measurement = probe::measure(&entry.path)?;
        for warning in &measurement.warnings {
            self.logger.send(ActivityEvent::Error {
                code: "DC-3002".to_string(),
                message: warning.clone(),
            });
        }

        let over_budget = measurement.total_bytes > entry.max_size_bytes;
        self.logger.send(ActivityEvent::EntryScanned {
            path: entry.path.to_string_lossy().to_string(),
            total_bytes: measurement.total_bytes,
            max_size_bytes: entry.max_size_bytes,
            candidates: measurement.candidates.len(),
            over_budget,
        });

        let checked_at = Utc::now();
        if !over_budget {
            self.registry.update_metadata(&entry.path, checked_at, None)?;
            return Ok(());
        }

        let plan = planner::plan(
            measurement.total_bytes,
            entry.max_size_bytes,
            measurement.candidates,
            self.effective_policy(entry),
        );
        self.logger.send(ActivityEvent::EvictionPlanned {
            path: entry.path.to_string_lossy().to_string(),
            over_by: plan.over_by,
            files: plan.files.len(),
            expected_bytes: plan.expected_freed_bytes,
            insufficient: plan.insufficient,
        });

        if plan.is_empty() {
            self.registry.update_metadata(&entry.path, checked_at, None)?;
            return Ok(());
        }

        *self.state.write() = LoopState::Evicting;
        let report = self.executor.apply(&plan);
        self.logger.send(ActivityEvent::EvictionCompleted {
            path: entry.path.to_string_lossy().to_string(),
            files_deleted: report.files_deleted,
            files_failed: report.files_failed,
            freed_bytes: report.freed_bytes,
            duration_ms: u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX),
        });

        let evicted = report
            .evicted_anything()
            .then(|| (Utc::now(), report.freed_bytes));
        self.registry
            .update_metadata(&entry.path, checked_at, evicted)?;
        Ok(())
    }

    /// Per-entry policy with the global default margin applied when the
    /// entry does not set one.
    fn effective_policy(&self, entry: &WatchedDirectory) -> EvictionPolicy {
        let mut policy = entry.policy;
        if policy.margin_bytes == 0 {
            policy.margin_bytes = self.config.daemon.default_margin_bytes;
        }
        policy
    }

    /// Sleep in small slices so shutdown and check-now requests are honored
    /// promptly between cycles.
    fn idle_sleep(&self, total: Duration) {
        let deadline = Instant::now() + total;
        while Instant::now() < deadline {
            if self.signals.should_shutdown() || self.signals.should_check_now() {
                return;
            }
            // A reload request just shortens the nap; the next cycle always
            // re-reads the registry anyway.
            if self.signals.should_reload() {
                return;
            }
            thread::sleep(SLEEP_SLICE.min(deadline.saturating_duration_since(Instant::now())));
        }
    }
}

/// Write the current PID to `path` (opt-in, for non-service setups).
pub fn write_pidfile(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| DcError::io(parent, e))?;
    }
    fs::write(path, format!("{}\n", std::process::id())).map_err(|e| DcError::io(path, e))
}
