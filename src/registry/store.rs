//! Persistent registry of watched directories.
//!
//! The registry is a single JSON document (versioned envelope around a list of
//! [`WatchedDirectory`] records). It is the only shared mutable resource
//! between a running daemon and short-lived CLI invocations, so every
//! read-modify-write cycle runs under an exclusive `flock()` on a sidecar
//! `.lock` file, and every persist is a whole-file atomic replace
//! (temp file + fsync + rename). A crash mid-write leaves the prior valid
//! registry intact.
//!
//! Records this build cannot decode (schema drift between versions sharing
//! the registry) are skipped in memory but carried verbatim through every
//! rewrite, never destroyed on disk.

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::errors::{DcError, Result};
use crate::registry::entry::{EvictionPolicy, WatchedDirectory, normalize_watch_path};

/// Current on-disk format version.
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct RegistryDocument {
    version: u32,
    entries: Vec<serde_json::Value>,
}

/// One locked load: decoded entries plus raw records this build could not
/// decode, held so the next persist writes them back unchanged.
struct LoadedRegistry {
    entries: Vec<WatchedDirectory>,
    unreadable: Vec<serde_json::Value>,
}

/// Result of loading the registry: decoded entries plus how many records were
/// dropped because they failed to deserialize individually.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    pub entries: Vec<WatchedDirectory>,
    pub skipped_records: usize,
}

/// Handle to the persisted registry file.
///
/// The handle itself holds no entry state; every operation performs a full
/// locked load-mutate-persist so concurrent processes always observe a
/// consistent registry.
#[derive(Debug, Clone)]
pub struct Registry {
    registry_path: PathBuf,
}

impl Registry {
    /// Create a handle for the given registry file. The file need not exist
    /// yet; it is created on the first mutation.
    #[must_use]
    pub fn open(registry_path: PathBuf) -> Self {
        Self { registry_path }
    }

    /// Path of the persisted registry file.
    pub fn path(&self) -> &Path {
        &self.registry_path
    }

    /// Register a new directory. Fails with `DuplicateEntry` if the
    /// normalized path is already present and `InvalidThreshold` if the
    /// budget is zero.
    pub fn add(
        &self,
        path: &Path,
        max_size_bytes: u64,
        policy: EvictionPolicy,
    ) -> Result<WatchedDirectory> {
        let entry = WatchedDirectory::new(path, max_size_bytes, policy)?;
        self.with_lock(|| {
            let mut doc = self.load_document()?;
            if doc.entries.iter().any(|e| e.path == entry.path) {
                return Err(DcError::DuplicateEntry {
                    path: entry.path.clone(),
                });
            }
            doc.entries.push(entry.clone());
            self.persist(&doc)?;
            Ok(entry.clone())
        })
    }

    /// Remove a directory from the registry. Fails with `NotFound`.
    pub fn remove(&self, path: &Path) -> Result<WatchedDirectory> {
        let key = normalize_watch_path(path)?;
        self.with_lock(|| {
            let mut doc = self.load_document()?;
            let idx = doc
                .entries
                .iter()
                .position(|e| e.path == key)
                .ok_or_else(|| DcError::NotFound { path: key.clone() })?;
            let removed = doc.entries.remove(idx);
            self.persist(&doc)?;
            Ok(removed)
        })
    }

    /// Enable a directory for monitoring. Fails with `NotFound`.
    pub fn enable(&self, path: &Path) -> Result<WatchedDirectory> {
        self.set_enabled(path, true)
    }

    /// Disable a directory without removing it. Fails with `NotFound`.
    pub fn disable(&self, path: &Path) -> Result<WatchedDirectory> {
        self.set_enabled(path, false)
    }

    fn set_enabled(&self, path: &Path, enabled: bool) -> Result<WatchedDirectory> {
        let key = normalize_watch_path(path)?;
        self.with_lock(|| {
            let mut doc = self.load_document()?;
            let entry = doc
                .entries
                .iter_mut()
                .find(|e| e.path == key)
                .ok_or_else(|| DcError::NotFound { path: key.clone() })?;
            entry.enabled = enabled;
            let updated = entry.clone();
            self.persist(&doc)?;
            Ok(updated)
        })
    }

    /// Point-in-time snapshot of all entries, in insertion order.
    pub fn list(&self) -> Result<Vec<WatchedDirectory>> {
        Ok(self.snapshot()?.entries)
    }

    /// Snapshot with load diagnostics (skipped malformed records).
    pub fn snapshot(&self) -> Result<RegistrySnapshot> {
        self.with_lock(|| {
            let doc = self.load_document()?;
            Ok(RegistrySnapshot {
                entries: doc.entries,
                skipped_records: doc.unreadable.len(),
            })
        })
    }

    /// Record monitor-cycle metadata for one entry.
    ///
    /// `evicted` carries (timestamp, freed bytes) when an eviction removed at
    /// least one file this cycle. Returns `false` when the entry no longer
    /// exists (removed concurrently by a CLI invocation) — that is not an
    /// error, the update is simply dropped.
    pub fn update_metadata(
        &self,
        path: &Path,
        checked_at: DateTime<Utc>,
        evicted: Option<(DateTime<Utc>, u64)>,
    ) -> Result<bool> {
        self.with_lock(|| {
            let mut doc = self.load_document()?;
            let Some(entry) = doc.entries.iter_mut().find(|e| e.path == path) else {
                return Ok(false);
            };
            entry.last_checked_at = Some(checked_at);
            if let Some((at, freed)) = evicted {
                entry.last_evicted_at = Some(at);
                entry.last_freed_bytes = freed;
            }
            self.persist(&doc)?;
            Ok(true)
        })
    }

    // ──────────────────── locking ────────────────────

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .registry_path
            .file_name()
            .map_or_else(|| "registry".into(), std::ffi::OsStr::to_os_string);
        name.push(".lock");
        self.registry_path.with_file_name(name)
    }

    #[cfg(unix)]
    fn with_lock<T>(&self, op: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock_path = self.lock_path();
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).map_err(|e| DcError::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| DcError::io(&lock_path, e))?;

        let _guard = nix::fcntl::Flock::lock(file, nix::fcntl::FlockArg::LockExclusive).map_err(
            |(_file, e)| DcError::RegistryLock {
                path: lock_path.clone(),
                details: e.to_string(),
            },
        )?;

        op()
    }

    #[cfg(not(unix))]
    fn with_lock<T>(&self, op: impl FnOnce() -> Result<T>) -> Result<T> {
        op()
    }

    // ──────────────────── load / persist ────────────────────

    fn load_document(&self) -> Result<LoadedRegistry> {
        if !self.registry_path.exists() {
            return Ok(LoadedRegistry {
                entries: Vec::new(),
                unreadable: Vec::new(),
            });
        }

        let raw =
            fs::read_to_string(&self.registry_path).map_err(|e| DcError::io(&self.registry_path, e))?;
        let document: RegistryDocument = serde_json::from_str(&raw)?;
        if document.version != FORMAT_VERSION {
            return Err(DcError::InvalidConfig {
                details: format!(
                    "unsupported registry version {} in {}",
                    document.version,
                    self.registry_path.display()
                ),
            });
        }

        // Individually-undecodable records are skipped in memory but retained
        // raw, so the next persist writes them back; only a file that is not
        // valid JSON at all is fatal.
        let mut entries = Vec::with_capacity(document.entries.len());
        let mut unreadable = Vec::new();
        for value in document.entries {
            match serde_json::from_value::<WatchedDirectory>(value.clone()) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    eprintln!(
                        "[DC-REGISTRY] skipping undecodable registry record (kept on disk): {e}"
                    );
                    unreadable.push(value);
                }
            }
        }

        Ok(LoadedRegistry {
            entries,
            unreadable,
        })
    }

    fn persist(&self, doc: &LoadedRegistry) -> Result<()> {
        let mut records: Vec<serde_json::Value> = doc
            .entries
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<_, _>>()?;
        records.extend(doc.unreadable.iter().cloned());
        let document = RegistryDocument {
            version: FORMAT_VERSION,
            entries: records,
        };
        let payload = serde_json::to_vec_pretty(&document)?;

        let parent = self
            .registry_path
            .parent()
            .ok_or_else(|| DcError::InvalidConfig {
                details: format!(
                    "registry path has no parent directory: {}",
                    self.registry_path.display()
                ),
            })?;
        fs::create_dir_all(parent).map_err(|e| DcError::io(parent, e))?;

        // Write to a temp file in the same directory, fsync, then rename over
        // the live file. Rename within one filesystem is atomic, so readers
        // see either the old or the new document, never a truncated one.
        let tmp_path = self
            .registry_path
            .with_extension(format!("tmp.{}", std::process::id()));
        let mut tmp = File::create(&tmp_path).map_err(|e| DcError::io(&tmp_path, e))?;
        tmp.write_all(&payload).map_err(|e| DcError::io(&tmp_path, e))?;
        tmp.sync_all().map_err(|e| DcError::io(&tmp_path, e))?;
        drop(tmp);

        fs::rename(&tmp_path, &self.registry_path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DcError::io(&self.registry_path, e)
        })?;
        Ok(())
    }
}
