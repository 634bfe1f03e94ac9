//! Eviction execution: apply a deletion plan file-by-file.
//!
//! Per-file failures are recorded and skipped — a plan is never aborted
//! because one file could not be removed. A file that vanished between
//! planning and execution counts as freed: the goal is bytes gone, not
//! deletions performed. Callers must use the report's `freed_bytes`, never
//! the plan's expected total, for metadata and logging.

#![allow(missing_docs)]

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::evict::planner::EvictionPlan;
use crate::logger::{ActivityEvent, LoggerHandle};

/// A single deletion failure record.
#[derive(Debug, Clone)]
pub struct EvictionFailure {
    pub path: PathBuf,
    pub details: String,
}

/// Summary of one executed plan.
#[derive(Debug, Clone)]
pub struct EvictionReport {
    pub files_deleted: usize,
    pub files_failed: usize,
    /// Sum of sizes of files that are actually gone (deleted by us or
    /// already vanished). May be less than the plan's expected total.
    pub freed_bytes: u64,
    pub failures: Vec<EvictionFailure>,
    pub duration: Duration,
}

impl EvictionReport {
    /// Whether at least one file was removed.
    #[must_use]
    pub fn evicted_anything(&self) -> bool {
        self.files_deleted > 0
    }
}

/// Applies deletion plans. Execution is always destructive once invoked; any
/// preview/approval step belongs to the CLI layer.
pub struct EvictionExecutor {
    logger: Option<LoggerHandle>,
}

impl EvictionExecutor {
    /// Create an executor with an optional logger handle.
    #[must_use]
    pub fn new(logger: Option<LoggerHandle>) -> Self {
        Self { logger }
    }

    /// Delete each planned file in plan order.
    pub fn apply(&self, plan: &EvictionPlan) -> EvictionReport {
        let start = Instant::now();
        let mut report = EvictionReport {
            files_deleted: 0,
            files_failed: 0,
            freed_bytes: 0,
            failures: Vec::new(),
            duration: Duration::ZERO,
        };

        for file in &plan.files {
            match fs::remove_file(&file.path) {
                Ok(()) => {
                    report.files_deleted += 1;
                    report.freed_bytes += file.size_bytes;
                    self.log(ActivityEvent::FileDeleted {
                        path: file.path.to_string_lossy().to_string(),
                        size_bytes: file.size_bytes,
                    });
                }
                // Already gone: somebody beat us to it, the bytes are freed.
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    report.files_deleted += 1;
                    report.freed_bytes += file.size_bytes;
                    self.log(ActivityEvent::FileDeleted {
                        path: file.path.to_string_lossy().to_string(),
                        size_bytes: file.size_bytes,
                    });
                }
                Err(e) => {
                    report.files_failed += 1;
                    report.failures.push(EvictionFailure {
                        path: file.path.clone(),
                        details: e.to_string(),
                    });
                    self.log(ActivityEvent::FileDeleteFailed {
                        path: file.path.to_string_lossy().to_string(),
                        error_code: "DC-3004".to_string(),
                        error_message: e.to_string(),
                    });
                }
            }
        }

        report.duration = start.elapsed();
        report
    }

    fn log(&self, event: ActivityEvent) {
        if let Some(logger) = &self.logger {
            logger.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evict::planner;
    use crate::probe::FileCandidate;
    use crate::registry::EvictionPolicy;
    use std::path::Path;
    use std::time::SystemTime;

    fn candidate(path: &Path, size: u64) -> FileCandidate {
        FileCandidate {
            path: path.to_path_buf(),
            size_bytes: size,
            modified: SystemTime::UNIX_EPOCH,
        }
    }

    fn plan_of(files: Vec<FileCandidate>) -> EvictionPlan {
        let expected = files.iter().map(|f| f.size_bytes).sum();
        EvictionPlan {
            files,
            over_by: expected,
            expected_freed_bytes: expected,
            insufficient: false,
        }
    }

    #[test]
    fn deletes_planned_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        fs::write(&a, vec![0u8; 100]).unwrap();
        fs::write(&b, vec![0u8; 200]).unwrap();

        let executor = EvictionExecutor::new(None);
        let report = executor.apply(&plan_of(vec![candidate(&a, 100), candidate(&b, 200)]));

        assert_eq!(report.files_deleted, 2);
        assert_eq!(report.freed_bytes, 300);
        assert!(report.failures.is_empty());
        assert!(!a.exists());
        assert!(!b.exists());
    }

    #[test]
    fn vanished_file_counts_as_freed() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("gone");

        let executor = EvictionExecutor::new(None);
        let report = executor.apply(&plan_of(vec![candidate(&gone, 64)]));

        assert_eq!(report.files_deleted, 1);
        assert_eq!(report.freed_bytes, 64);
        assert_eq!(report.files_failed, 0);
    }

    #[cfg(unix)]
    #[test]
    fn failure_is_recorded_and_execution_continues() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let sealed = dir.path().join("sealed");
        fs::create_dir(&sealed).unwrap();
        let locked = sealed.join("locked");
        fs::write(&locked, vec![0u8; 50]).unwrap();
        let free = dir.path().join("free");
        fs::write(&free, vec![0u8; 70]).unwrap();

        // Read-only parent: unlink fails for non-root.
        fs::set_permissions(&sealed, fs::Permissions::from_mode(0o555)).unwrap();

        let executor = EvictionExecutor::new(None);
        let report = executor.apply(&plan_of(vec![candidate(&locked, 50), candidate(&free, 70)]));

        fs::set_permissions(&sealed, fs::Permissions::from_mode(0o755)).unwrap();

        // Running as root the unlink may succeed; both outcomes honor the
        // contract of continuing past the first file.
        if report.files_failed == 1 {
            assert_eq!(report.files_deleted, 1);
            assert_eq!(report.freed_bytes, 70);
            assert_eq!(report.failures[0].path, locked);
        } else {
            assert_eq!(report.files_deleted, 2);
            assert_eq!(report.freed_bytes, 120);
        }
        assert!(!free.exists(), "later files still processed");
    }

    #[test]
    fn actual_freed_reported_not_planned() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real");
        fs::write(&real, vec![0u8; 30]).unwrap();

        // Plan claims more than will be freed.
        let mut plan = plan_of(vec![candidate(&real, 30)]);
        plan.expected_freed_bytes = 9999;

        let executor = EvictionExecutor::new(None);
        let report = executor.apply(&plan);
        assert_eq!(report.freed_bytes, 30);
    }

    #[test]
    fn planner_to_executor_pipeline_brings_dir_under_budget() {
        let dir = tempfile::tempdir().unwrap();
        for (name, size, age) in [("a", 100usize, 300), ("b", 200, 200), ("c", 50, 10)] {
            let path = dir.path().join(name);
            fs::write(&path, vec![0u8; size]).unwrap();
            let mtime = filetime::FileTime::from_unix_time(1_000_000 - age, 0);
            filetime::set_file_mtime(&path, mtime).unwrap();
        }

        let measurement = crate::probe::measure(dir.path()).unwrap();
        assert_eq!(measurement.total_bytes, 350);

        let plan = planner::plan(
            measurement.total_bytes,
            200,
            measurement.candidates,
            EvictionPolicy::default(),
        );
        let report = EvictionExecutor::new(None).apply(&plan);

        assert_eq!(report.freed_bytes, 300);
        let after = crate::probe::measure(dir.path()).unwrap();
        assert_eq!(after.total_bytes, 50, "only c remains");
        assert!(dir.path().join("c").exists());
    }
}
