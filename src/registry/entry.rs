//! Watched-directory records and eviction policy parameters.

#![allow(missing_docs)]

use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::errors::{DcError, Result};

/// Ordering strategy used when selecting files for eviction.
///
/// A closed set: new strategies are added here and dispatched through
/// [`EvictionOrder::sort_key`]-style comparison in the planner, never through
/// ad hoc branching at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EvictionOrder {
    /// Delete files with the oldest modification time first (FIFO-ish).
    #[default]
    OldestFirst,
    /// Delete the largest files first.
    LargestFirst,
}

impl EvictionOrder {
    /// Stable label used in logs and CLI output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::OldestFirst => "oldest_first",
            Self::LargestFirst => "largest_first",
        }
    }
}

impl std::str::FromStr for EvictionOrder {
    type Err = DcError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "oldest_first" | "oldest-first" | "oldest" => Ok(Self::OldestFirst),
            "largest_first" | "largest-first" | "largest" => Ok(Self::LargestFirst),
            other => Err(DcError::InvalidConfig {
                details: format!("unknown eviction order {other:?}"),
            }),
        }
    }
}

/// Eviction policy parameters stored per watched directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EvictionPolicy {
    /// Candidate ordering strategy.
    pub order: EvictionOrder,
    /// Extra bytes to free beyond the over-budget amount, so the directory
    /// does not re-trigger on the very next cycle.
    pub margin_bytes: u64,
}

/// One monitored directory as persisted in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchedDirectory {
    /// Absolute, normalized path; unique key in the registry.
    pub path: PathBuf,
    /// Budget in bytes; the directory is over budget when its measured size
    /// strictly exceeds this.
    pub max_size_bytes: u64,
    /// Disabled entries stay in the registry but are skipped by the monitor.
    pub enabled: bool,
    /// Eviction policy parameters.
    #[serde(default)]
    pub policy: EvictionPolicy,
    /// When the monitor last measured this directory.
    #[serde(default)]
    pub last_checked_at: Option<DateTime<Utc>>,
    /// When eviction last removed at least one file.
    #[serde(default)]
    pub last_evicted_at: Option<DateTime<Utc>>,
    /// Bytes actually freed by the last eviction.
    #[serde(default)]
    pub last_freed_bytes: u64,
}

impl WatchedDirectory {
    /// Build a new enabled entry, validating path and threshold.
    pub fn new(path: &Path, max_size_bytes: u64, policy: EvictionPolicy) -> Result<Self> {
        let normalized = normalize_watch_path(path)?;
        if max_size_bytes == 0 {
            return Err(DcError::InvalidThreshold {
                path: normalized,
                details: "max_size_bytes must be > 0".to_string(),
            });
        }
        Ok(Self {
            path: normalized,
            max_size_bytes,
            enabled: true,
            policy,
            last_checked_at: None,
            last_evicted_at: None,
            last_freed_bytes: 0,
        })
    }
}

/// Normalize a watch path: require absolute, strip `.` components and
/// trailing slashes, refuse the filesystem root.
pub fn normalize_watch_path(path: &Path) -> Result<PathBuf> {
    if !path.is_absolute() {
        return Err(DcError::InvalidConfig {
            details: format!("watch path must be absolute: {}", path.display()),
        });
    }

    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Lexical parent handling only; the probe resolves the real tree.
                if !normalized.pop() {
                    return Err(DcError::InvalidConfig {
                        details: format!("watch path escapes root: {}", path.display()),
                    });
                }
            }
            other => normalized.push(other),
        }
    }

    if normalized == Path::new("/") {
        return Err(DcError::InvalidConfig {
            details: "refusing to watch the filesystem root".to_string(),
        });
    }

    Ok(normalized)
}
