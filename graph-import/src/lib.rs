//! # graph-import
//!
//! Bulk import of graph data into a backend project.
//!
//! An import root holds JSON files in three directories:
//!
//! - `nodes/`: graph entities
//! - `lists/`: scalar list field values
//! - `relations/`: edges between nodes
//!
//! Every file is validated against the project's type schema before anything
//! is sent. Files are then uploaded one at a time, nodes first, then lists,
//! then relations, and the run stops at the first file the service rejects.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use graph_import::{ClientConfig, HttpUploadClient, ImportConfig, Importer, NoProgress};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let types = std::fs::read_to_string("types.graphql")?;
//! let client = HttpUploadClient::new(&ClientConfig::new("https://api.example.com/simple/v1"))?;
//! let importer = Importer::new("data", types, client, ImportConfig::default())?;
//!
//! let summary = importer.upload("cj123", &mut NoProgress).await?;
//! println!("Uploaded {} files", summary.uploaded_files());
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod files;
mod importer;
pub mod output;
mod report;
pub mod schema;

pub use client::{ClientError, HttpUploadClient, UploadClient, UploadErrorEntry};
pub use config::{ClientConfig, ImportConfig};
pub use error::{ImportError, SchemaViolations, Violation};
pub use files::{Category, FILE_PATTERN, FileSet, ImportRoot, read_file_bounded};
pub use importer::{Importer, NoProgress, Phase, Progress};
pub use report::{CategoryCounts, ImportSummary, PhaseTiming};
pub use schema::{ImportValidator, SchemaError};
