//! ATG-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, TriageError>;

/// Top-level error type for the attachment triage pipeline.
#[derive(Debug, Error)]
pub enum TriageError {
    #[error("[ATG-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[ATG-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[ATG-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[ATG-2001] registry {operation} failure: {details}")]
    Registry {
        operation: &'static str,
        details: String,
    },

    #[error("[ATG-2002] download failure for attachment {id} ({filename}): {details}")]
    DownloadFailed {
        id: i64,
        filename: String,
        details: String,
    },

    #[error("[ATG-2003] invalid attachment record: {details}")]
    RecordInvalid { details: String },

    #[error("[ATG-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[ATG-3001] storage device out of space at {path}")]
    StorageFull { path: PathBuf },

    #[error("[ATG-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TriageError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "ATG-1001",
            Self::MissingConfig { .. } => "ATG-1002",
            Self::ConfigParse { .. } => "ATG-1003",
            Self::Registry { .. } => "ATG-2001",
            Self::DownloadFailed { .. } => "ATG-2002",
            Self::RecordInvalid { .. } => "ATG-2003",
            Self::Serialization { .. } => "ATG-2101",
            Self::StorageFull { .. } => "ATG-3001",
            Self::Io { .. } => "ATG-3002",
        }
    }

    /// Whether this error aborts the whole run.
    ///
    /// Out-of-space is the single fatal condition: once the device is
    /// full there is no point downloading further candidates. Every
    /// other error is a per-attachment skip-and-log.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::StorageFull { .. })
    }

    /// Convenience constructor for IO errors with a known path.
    ///
    /// Classifies the out-of-space condition so callers never have to
    /// match on OS error strings.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        if is_out_of_space(&source) {
            return Self::StorageFull {
                path: path.as_ref().to_path_buf(),
            };
        }
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Typed check for the ENOSPC condition.
///
/// The reference deployment matched on the OS error message
/// ("No space left on device"), which breaks under localization; the
/// error kind and raw errno are stable.
#[must_use]
pub fn is_out_of_space(error: &std::io::Error) -> bool {
    if error.kind() == std::io::ErrorKind::StorageFull {
        return true;
    }
    #[cfg(unix)]
    {
        error.raw_os_error() == Some(libc::ENOSPC)
    }
    #[cfg(not(unix))]
    {
        false
    }
}

impl From<serde_json::Error> for TriageError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for TriageError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
