//! Configuration types for an import run.
//!
//! Split into the filesystem side (how import files are discovered and read)
//! and the upload side (where payloads are sent). The importer itself never
//! looks at CLI flags or environment variables.

use std::time::Duration;

/// Filesystem options for discovering and reading import files.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ImportConfig {
    /// Maximum size of a single import file in bytes (default: 100 MiB).
    pub max_file_size: u64,
    /// Whether to follow symbolic links inside the category directories.
    ///
    /// **Defaults to `false`**.
    pub follow_links: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_file_size: 104_857_600,
            follow_links: false,
        }
    }
}

/// Connection options for [`HttpUploadClient`](crate::HttpUploadClient).
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClientConfig {
    /// Base URL of the import service; `/{project_id}/import` is appended.
    pub endpoint: String,
    /// Bearer token sent in the `Authorization` header, if any.
    pub token: Option<String>,
    /// Per-request timeout. `None` leaves the transport default in place.
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    /// Build a config for `endpoint` with no token and no timeout.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: None,
            timeout: None,
        }
    }
}
