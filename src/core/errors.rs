//! DC-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, DcError>;

/// Top-level error type for dircap.
#[derive(Debug, Error)]
pub enum DcError {
    #[error("[DC-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[DC-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[DC-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[DC-2001] invalid threshold for {path}: {details}")]
    InvalidThreshold { path: PathBuf, details: String },

    #[error("[DC-2002] directory already registered: {path}")]
    DuplicateEntry { path: PathBuf },

    #[error("[DC-2003] directory not registered: {path}")]
    NotFound { path: PathBuf },

    #[error("[DC-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[DC-3001] directory unavailable: {path}: {details}")]
    DirectoryUnavailable { path: PathBuf, details: String },

    #[error("[DC-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[DC-3003] registry lock failure at {path}: {details}")]
    RegistryLock { path: PathBuf, details: String },

    #[error("[DC-3004] failed to delete {path}: {details}")]
    FileDeleteFailed { path: PathBuf, details: String },

    #[error("[DC-3005] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[DC-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl DcError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "DC-1001",
            Self::MissingConfig { .. } => "DC-1002",
            Self::ConfigParse { .. } => "DC-1003",
            Self::InvalidThreshold { .. } => "DC-2001",
            Self::DuplicateEntry { .. } => "DC-2002",
            Self::NotFound { .. } => "DC-2003",
            Self::Serialization { .. } => "DC-2101",
            Self::DirectoryUnavailable { .. } => "DC-3001",
            Self::Io { .. } => "DC-3002",
            Self::RegistryLock { .. } => "DC-3003",
            Self::FileDeleteFailed { .. } => "DC-3004",
            Self::ChannelClosed { .. } => "DC-3005",
            Self::Runtime { .. } => "DC-3900",
        }
    }

    /// Whether retrying (typically on the next monitor cycle) might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DirectoryUnavailable { .. }
                | Self::Io { .. }
                | Self::RegistryLock { .. }
                | Self::FileDeleteFailed { .. }
                | Self::ChannelClosed { .. }
                | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for DcError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for DcError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_errors() -> Vec<DcError> {
        vec![
            DcError::InvalidConfig {
                details: String::new(),
            },
            DcError::MissingConfig {
                path: PathBuf::new(),
            },
            DcError::ConfigParse {
                context: "",
                details: String::new(),
            },
            DcError::InvalidThreshold {
                path: PathBuf::new(),
                details: String::new(),
            },
            DcError::DuplicateEntry {
                path: PathBuf::new(),
            },
            DcError::NotFound {
                path: PathBuf::new(),
            },
            DcError::Serialization {
                context: "",
                details: String::new(),
            },
            DcError::DirectoryUnavailable {
                path: PathBuf::new(),
                details: String::new(),
            },
            DcError::Io {
                path: PathBuf::new(),
                source: std::io::Error::other("test"),
            },
            DcError::RegistryLock {
                path: PathBuf::new(),
                details: String::new(),
            },
            DcError::FileDeleteFailed {
                path: PathBuf::new(),
                details: String::new(),
            },
            DcError::ChannelClosed { component: "" },
            DcError::Runtime {
                details: String::new(),
            },
        ]
    }

    #[test]
    fn error_codes_are_unique() {
        let errors = sample_errors();
        let codes: Vec<&str> = errors.iter().map(|e| e.code()).collect();
        let unique: std::collections::HashSet<&&str> = codes.iter().collect();
        assert_eq!(
            codes.len(),
            unique.len(),
            "error codes must be unique: {codes:?}"
        );
    }

    #[test]
    fn error_codes_have_dc_prefix() {
        for err in &sample_errors() {
            assert!(
                err.code().starts_with("DC-"),
                "code {} must start with DC-",
                err.code()
            );
        }
    }

    #[test]
    fn error_display_includes_code() {
        let err = DcError::DuplicateEntry {
            path: PathBuf::from("/data/cache"),
        };
        let msg = err.to_string();
        assert!(
            msg.contains("DC-2002"),
            "display should contain error code: {msg}"
        );
        assert!(
            msg.contains("/data/cache"),
            "display should contain path: {msg}"
        );
    }

    #[test]
    fn retryable_errors_are_correct() {
        // Retryable: cycle-local failures the daemon absorbs and retries.
        assert!(
            DcError::DirectoryUnavailable {
                path: PathBuf::new(),
                details: String::new(),
            }
            .is_retryable()
        );
        assert!(
            DcError::FileDeleteFailed {
                path: PathBuf::new(),
                details: String::new(),
            }
            .is_retryable()
        );
        assert!(
            DcError::RegistryLock {
                path: PathBuf::new(),
                details: String::new(),
            }
            .is_retryable()
        );

        // Not retryable: command failures surfaced to the CLI caller.
        assert!(
            !DcError::DuplicateEntry {
                path: PathBuf::new()
            }
            .is_retryable()
        );
        assert!(
            !DcError::NotFound {
                path: PathBuf::new()
            }
            .is_retryable()
        );
        assert!(
            !DcError::InvalidThreshold {
                path: PathBuf::new(),
                details: String::new(),
            }
            .is_retryable()
        );
        assert!(
            !DcError::InvalidConfig {
                details: String::new()
            }
            .is_retryable()
        );
    }

    #[test]
    fn io_convenience_constructor() {
        let err = DcError::io(
            "/tmp/test.txt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.code(), "DC-3002");
        assert!(err.to_string().contains("/tmp/test.txt"));
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: DcError = json_err.into();
        assert_eq!(err.code(), "DC-2101");
    }

    #[test]
    fn from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let err: DcError = toml_err.into();
        assert_eq!(err.code(), "DC-1003");
    }
}
