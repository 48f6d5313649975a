//! Storage error types for the Ambulink persistence layer.

use std::fmt;
use std::path::Path;

use ambulink_core::CoreError;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Attempted to create a record that already exists.
    #[error("Record already exists: {kind}/{id}")]
    AlreadyExists {
        /// The kind of record that already exists.
        kind: String,
        /// The conflicting identifier.
        id: String,
    },

    /// The inbound payload could not be turned into a record.
    #[error("Invalid record: {message}")]
    InvalidRecord {
        /// Description of why the record is invalid.
        message: String,
    },

    /// A file could not be read or written.
    #[error("I/O error on {path}: {message}")]
    Io {
        /// The file or directory involved.
        path: String,
        /// The underlying error.
        message: String,
    },

    /// A stored file did not contain the expected JSON.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `AlreadyExists` error.
    #[must_use]
    pub fn already_exists(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Creates a new `InvalidRecord` error.
    #[must_use]
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    /// Creates a new `Io` error for `path`.
    #[must_use]
    pub fn io(path: &Path, err: impl fmt::Display) -> Self {
        Self::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    /// Creates a new `Serialization` error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Returns `true` if this is an already exists error.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::AlreadyExists { .. } => ErrorCategory::Conflict,
            Self::InvalidRecord { .. } => ErrorCategory::Validation,
            Self::Io { .. } | Self::Serialization { .. } => ErrorCategory::Persistence,
        }
    }
}

impl From<CoreError> for StorageError {
    fn from(err: CoreError) -> Self {
        Self::invalid_record(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

/// Categories of storage errors for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Record already exists.
    Conflict,
    /// Payload validation error.
    Validation,
    /// Durable storage read/write failure.
    Persistence,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conflict => write!(f, "conflict"),
            Self::Validation => write!(f, "validation"),
            Self::Persistence => write!(f, "persistence"),
        }
    }
}
