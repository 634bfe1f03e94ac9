//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{DcError, Result};

/// Full dircap configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    pub daemon: DaemonConfig,
    pub logging: LoggingConfig,
    pub paths: PathsConfig,
}

/// Monitor loop tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DaemonConfig {
    /// Seconds to sleep between monitor cycles.
    pub interval_secs: u64,
    /// Default eviction safety margin applied to entries that don't set one.
    pub default_margin_bytes: u64,
}

/// JSONL activity log tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub max_size_bytes: u64,
    pub max_rotated_files: u32,
    pub fsync_interval_secs: u64,
    pub channel_capacity: usize,
}

/// Filesystem paths used by dircap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub registry_file: PathBuf,
    pub jsonl_log: PathBuf,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            interval_secs: 1_800,
            default_margin_bytes: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: 10 * 1024 * 1024,
            max_rotated_files: 3,
            fsync_interval_secs: 30,
            channel_capacity: 1024,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!(
                    "[DC-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths"
                );
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        let cfg = home_dir.join(".config").join("dircap").join("config.toml");
        let data = home_dir.join(".local").join("share").join("dircap");
        Self {
            config_file: cfg,
            registry_file: data.join("registry.json"),
            jsonl_log: data.join("activity.jsonl"),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| DcError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(DcError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Sleep interval between monitor cycles.
    #[must_use]
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.daemon.interval_secs)
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("DIRCAP_INTERVAL_SECS") {
            self.daemon.interval_secs = parse_env_u64("DIRCAP_INTERVAL_SECS", &raw)?;
        }
        if let Some(raw) = lookup("DIRCAP_DEFAULT_MARGIN_BYTES") {
            self.daemon.default_margin_bytes = parse_env_u64("DIRCAP_DEFAULT_MARGIN_BYTES", &raw)?;
        }
        if let Some(raw) = lookup("DIRCAP_REGISTRY_FILE") {
            self.paths.registry_file = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("DIRCAP_JSONL_LOG") {
            self.paths.jsonl_log = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("DIRCAP_LOG_MAX_SIZE_BYTES") {
            self.logging.max_size_bytes = parse_env_u64("DIRCAP_LOG_MAX_SIZE_BYTES", &raw)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.daemon.interval_secs == 0 {
            return Err(DcError::InvalidConfig {
                details: "daemon.interval_secs must be >= 1".to_string(),
            });
        }
        if self.logging.max_size_bytes == 0 {
            return Err(DcError::InvalidConfig {
                details: "logging.max_size_bytes must be > 0".to_string(),
            });
        }
        if self.logging.channel_capacity == 0 {
            return Err(DcError::InvalidConfig {
                details: "logging.channel_capacity must be >= 1".to_string(),
            });
        }
        if self.paths.registry_file.as_os_str().is_empty() {
            return Err(DcError::InvalidConfig {
                details: "paths.registry_file must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_u64(name: &str, raw: &str) -> Result<u64> {
    raw.parse::<u64>().map_err(|error| DcError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}
