//! DT-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, DtError>;

/// Top-level error type for disktest.
///
/// Only whole-pass failures are errors. A single failed benchmark cell is
/// recorded as data in the report instead.
#[derive(Debug, Error)]
pub enum DtError {
    #[error("[DT-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[DT-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[DT-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[DT-1101] unsupported platform: {details}")]
    UnsupportedPlatform { details: String },

    #[error("[DT-2001] filesystem stats failure for {path}: {details}")]
    FsStats { path: PathBuf, details: String },

    #[error("[DT-2002] mount table parse failure: {details}")]
    MountParse { details: String },

    #[error("[DT-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[DT-3001] permission denied for {path}")]
    PermissionDenied { path: PathBuf },

    #[error("[DT-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[DT-3101] tool {tool} unavailable: {details}")]
    ToolUnavailable { tool: &'static str, details: String },

    #[error("[DT-3102] bundled {tool} failed checksum verification: expected {expected}, got {actual}")]
    ChecksumMismatch {
        tool: &'static str,
        expected: String,
        actual: String,
    },

    #[error("[DT-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl DtError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "DT-1001",
            Self::MissingConfig { .. } => "DT-1002",
            Self::ConfigParse { .. } => "DT-1003",
            Self::UnsupportedPlatform { .. } => "DT-1101",
            Self::FsStats { .. } => "DT-2001",
            Self::MountParse { .. } => "DT-2002",
            Self::Serialization { .. } => "DT-2101",
            Self::PermissionDenied { .. } => "DT-3001",
            Self::Io { .. } => "DT-3002",
            Self::ToolUnavailable { .. } => "DT-3101",
            Self::ChecksumMismatch { .. } => "DT-3102",
            Self::Runtime { .. } => "DT-3900",
        }
    }

    /// Whether retrying against another path might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::PermissionDenied { .. } | Self::FsStats { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            return Self::PermissionDenied { path };
        }
        Self::Io { path, source }
    }
}

impl From<serde_json::Error> for DtError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for DtError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
