//! Error types for import runs.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::client::{ClientError, UploadErrorEntry};
use crate::files::Category;
use crate::schema::SchemaError;

/// Every way an import run can stop.
///
/// Variants raised during enumeration and validation stop the run before any
/// upload. [`ImportError::Upload`] is not a transport failure: the service
/// answered and rejected records, so files uploaded before it stay applied.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ImportError {
    /// The import root does not exist.
    #[error("Import path {} does not exist", path.display())]
    PathNotFound {
        /// The path that was given.
        path: PathBuf,
    },

    /// An I/O error occurred while reading a file or directory.
    #[error("{}: {source}", path.display())]
    Io {
        /// The file or directory that failed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A directory traversal error (permission denied, loop detected, etc.).
    #[error("{}: directory traversal error: {message}", path.display())]
    Walk {
        /// The directory that failed.
        path: PathBuf,
        /// Human-readable description of the failure.
        message: String,
    },

    /// The file exceeded the configured maximum size.
    #[error("{}: file exceeds maximum size of {limit} bytes", path.display())]
    FileTooLarge {
        /// The oversized file.
        path: PathBuf,
        /// The configured limit in bytes.
        limit: u64,
    },

    /// The file content is not valid UTF-8.
    #[error("{}: file is not valid UTF-8", path.display())]
    InvalidEncoding {
        /// The offending file.
        path: PathBuf,
    },

    /// The file content is not valid JSON.
    #[error("{}: invalid JSON: {source}", path.display())]
    Parse {
        /// The offending file.
        path: PathBuf,
        /// The parser error, including line and column.
        #[source]
        source: serde_json::Error,
    },

    /// The type-schema description could not be understood.
    #[error("invalid type schema: {0}")]
    Schema(#[from] SchemaError),

    /// The file is valid JSON but does not match the import record shape.
    #[error("{}: {violations}", path.display())]
    Validation {
        /// The offending file.
        path: PathBuf,
        /// Everything wrong with the file.
        violations: SchemaViolations,
    },

    /// The upload call itself failed (connection, unexpected response).
    #[error("{}: upload failed: {source}", path.display())]
    Client {
        /// The file being uploaded.
        path: PathBuf,
        /// The client error.
        #[source]
        source: ClientError,
    },

    /// The service rejected one or more records of a file.
    #[error("{}: {} {} record error(s) reported by the service", path.display(), errors.len(), category)]
    Upload {
        /// The phase the file belonged to.
        category: Category,
        /// The rejected file.
        path: PathBuf,
        /// The service's error entries, in the order it returned them.
        errors: Vec<UploadErrorEntry>,
    },
}

/// A single schema mismatch inside one import document.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[non_exhaustive]
pub struct Violation {
    /// JSON pointer to the offending value (e.g., `/values/3`); empty for the root.
    pub pointer: String,
    /// Human-readable error description.
    pub message: String,
}

impl Violation {
    pub(crate) fn new(pointer: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            pointer: pointer.into(),
            message: message.into(),
        }
    }

    /// Format the violation for human-readable output.
    #[must_use]
    pub fn format_human_readable(&self) -> String {
        if self.pointer.is_empty() {
            self.message.clone()
        } else {
            format!("{} (at {})", self.message, self.pointer)
        }
    }
}

/// All schema mismatches found in one import document. Never empty.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct SchemaViolations(pub Vec<Violation>);

impl SchemaViolations {
    /// Number of violations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false` for violations produced by the validator.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the violations in discovery order.
    pub fn iter(&self) -> std::slice::Iter<'_, Violation> {
        self.0.iter()
    }
}

impl fmt::Display for SchemaViolations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} schema violation(s)", self.0.len())?;
        for violation in &self.0 {
            write!(f, "\n  - {}", violation.format_human_readable())?;
        }
        Ok(())
    }
}

impl std::error::Error for SchemaViolations {}
