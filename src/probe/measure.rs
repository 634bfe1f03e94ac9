//! Directory size measurement and eviction-candidate collection.
//!
//! One probe pass walks the whole tree under a watched directory, summing
//! regular-file sizes and recording a [`FileCandidate`] per file. The walk is
//! single-threaded and iterative (explicit stack), since one entry is probed
//! at a time inside the monitor cycle.
//!
//! Filesystem races are expected, not exceptional: files that vanish or become
//! unreadable between listing and stat are skipped with a warning. Only an
//! unavailable root (missing, or not a directory) fails the probe.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::core::errors::{DcError, Result};

/// One regular file eligible for eviction, as observed during a single scan.
///
/// Transient: recreated every cycle, never cached — the filesystem may have
/// changed between cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: SystemTime,
}

/// Result of probing one watched directory.
#[derive(Debug, Clone)]
pub struct DirectoryMeasurement {
    /// Sum of regular-file sizes under the root (hard links counted once).
    pub total_bytes: u64,
    /// Every regular file found, unordered; the planner imposes policy order.
    pub candidates: Vec<FileCandidate>,
    /// Non-fatal per-entry problems encountered during the walk.
    pub warnings: Vec<String>,
}

/// Walk the tree under `root` and measure it.
///
/// Symlinks below the root are never followed: the link itself is not a
/// candidate, and an in-tree target is counted once when the walk reaches it
/// directly. The root itself may be a symlink to a directory (a watched
/// `/var/cache -> /data/cache` is fine) and is followed. Hard links are
/// deduplicated by (device, inode) so multi-linked files are not
/// double-counted.
pub fn measure(root: &Path) -> Result<DirectoryMeasurement> {
    // stat, not lstat: a symlinked root resolves to the directory it names.
    let root_meta = fs::metadata(root).map_err(|e| DcError::DirectoryUnavailable {
        path: root.to_path_buf(),
        details: e.to_string(),
    })?;
    if !root_meta.is_dir() {
        return Err(DcError::DirectoryUnavailable {
            path: root.to_path_buf(),
            details: "not a directory".to_string(),
        });
    }

    let mut measurement = DirectoryMeasurement {
        total_bytes: 0,
        candidates: Vec::new(),
        warnings: Vec::new(),
    };
    let mut seen_inodes: HashSet<(u64, u64)> = HashSet::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            // Directory vanished or became unreadable mid-scan: warn and move on.
            Err(e) => {
                measurement
                    .warnings
                    .push(format!("skipping {}: {e}", dir.display()));
                continue;
            }
        };

        for entry_result in entries {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    measurement
                        .warnings
                        .push(format!("unreadable entry in {}: {e}", dir.display()));
                    continue;
                }
            };
            let path = entry.path();

            // lstat, not stat: symlinks must be observed as links.
            let meta = match fs::symlink_metadata(&path) {
                Ok(meta) => meta,
                Err(e) => {
                    measurement
                        .warnings
                        .push(format!("vanished during scan: {}: {e}", path.display()));
                    continue;
                }
            };

            let file_type = meta.file_type();
            if file_type.is_dir() {
                stack.push(path);
            } else if file_type.is_file() {
                if !note_inode(&mut seen_inodes, &meta) {
                    continue; // hard link to a file already counted
                }
                let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                measurement.total_bytes += meta.len();
                measurement.candidates.push(FileCandidate {
                    path,
                    size_bytes: meta.len(),
                    modified,
                });
            }
            // Symlinks and special files: neither counted nor candidates.
        }
    }

    Ok(measurement)
}

#[cfg(unix)]
fn note_inode(seen: &mut HashSet<(u64, u64)>, meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    seen.insert((meta.dev(), meta.ino()))
}

#[cfg(not(unix))]
fn note_inode(_seen: &mut HashSet<(u64, u64)>, _meta: &fs::Metadata) -> bool {
    true
}
