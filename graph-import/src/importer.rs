//! The import orchestrator.
//!
//! A run moves through four phases in a fixed order:
//!
//! ```text
//! Validating -> UploadingNodes -> UploadingLists -> UploadingRelations
//! ```
//!
//! Every file in every category is read, parsed and validated before the
//! first upload. Uploads then go one file at a time, category by category,
//! and the run stops at the first file the service rejects. Nothing already
//! uploaded is rolled back.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::UploadClient;
use crate::config::ImportConfig;
use crate::error::ImportError;
use crate::files::{Category, FileSet, ImportRoot, read_file_bounded};
use crate::report::ImportSummary;
use crate::schema::ImportValidator;

/// A stage of an import run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Reading, parsing and validating every file.
    Validating,
    /// Uploading `nodes/` files.
    UploadingNodes,
    /// Uploading `lists/` files.
    UploadingLists,
    /// Uploading `relations/` files.
    UploadingRelations,
}

impl Phase {
    /// The upload phase for `category`.
    #[must_use]
    pub const fn upload(category: Category) -> Self {
        match category {
            Category::Nodes => Self::UploadingNodes,
            Category::Lists => Self::UploadingLists,
            Category::Relations => Self::UploadingRelations,
        }
    }

    /// Text shown to the user while the phase runs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Validating => "Validating data",
            Self::UploadingNodes => "Uploading nodes",
            Self::UploadingLists => "Uploading lists",
            Self::UploadingRelations => "Uploading relations",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Receives phase start/stop notifications.
///
/// A phase that fails is started but never finished.
pub trait Progress {
    /// Called before `phase` does any work.
    fn phase_started(&mut self, phase: Phase);
    /// Called once `phase` completed, with its wall-clock duration.
    fn phase_finished(&mut self, phase: Phase, elapsed: Duration);
}

/// [`Progress`] that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn phase_started(&mut self, _phase: Phase) {}
    fn phase_finished(&mut self, _phase: Phase, _elapsed: Duration) {}
}

/// Validates and uploads the import files under one root.
#[derive(Debug)]
pub struct Importer<C> {
    root: ImportRoot,
    types: String,
    client: C,
    config: ImportConfig,
}

impl<C> Importer<C> {
    /// Create an importer for the files under `import_path`.
    ///
    /// `types` is the type-schema description; it is compiled at the start
    /// of every validation pass. Validation never touches `client`, so a
    /// validate-only importer can pass `()`.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::PathNotFound`] if `import_path` does not exist.
    pub fn new(
        import_path: impl AsRef<Path>,
        types: impl Into<String>,
        client: C,
        config: ImportConfig,
    ) -> Result<Self, ImportError> {
        Ok(Self {
            root: ImportRoot::new(import_path)?,
            types: types.into(),
            client,
            config,
        })
    }

    #[must_use]
    pub fn root(&self) -> &ImportRoot {
        &self.root
    }

    /// Scan the import root for files.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::Walk`] if a category directory cannot be read.
    pub fn files(&self) -> Result<FileSet, ImportError> {
        FileSet::discover(&self.root, &self.config)
    }

    /// Run the validation phase alone.
    ///
    /// # Errors
    ///
    /// Returns the first read, parse, schema or validation error.
    pub fn validate(&self, progress: &mut dyn Progress) -> Result<FileSet, ImportError> {
        self.run_validation(progress).map(|(files, _)| files)
    }

    fn run_validation(
        &self,
        progress: &mut dyn Progress,
    ) -> Result<(FileSet, Duration), ImportError> {
        let started = Instant::now();
        progress.phase_started(Phase::Validating);

        let files = self.files()?;
        info!(
            root = %self.root.path().display(),
            nodes = files.nodes.len(),
            lists = files.lists.len(),
            relations = files.relations.len(),
            "Discovered import files"
        );
        self.validate_files(&files)?;

        let elapsed = started.elapsed();
        progress.phase_finished(Phase::Validating, elapsed);
        Ok((files, elapsed))
    }

    fn validate_files(&self, files: &FileSet) -> Result<(), ImportError> {
        let validator = ImportValidator::new(&self.types)?;
        for (category, paths) in files.iter() {
            for path in paths {
                let text = self.read(path)?;
                let document = parse(path, &text)?;
                validator
                    .validate_import_data(&document)
                    .map_err(|violations| ImportError::Validation {
                        path: path.clone(),
                        violations,
                    })?;
                debug!(%category, file = %path.display(), "Validated");
            }
        }
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<String, ImportError> {
        read_file_bounded(path, self.config.max_file_size)
    }
}

impl<C: UploadClient> Importer<C> {
    /// Validate everything, then upload nodes, lists and relations.
    ///
    /// # Errors
    ///
    /// Returns the first validation error before anything is uploaded, or
    /// the first upload failure. [`ImportError::Upload`] means the service
    /// rejected records of one file; files before it remain uploaded.
    pub async fn upload(
        &self,
        project_id: &str,
        progress: &mut dyn Progress,
    ) -> Result<ImportSummary, ImportError> {
        let (files, elapsed) = self.run_validation(progress)?;
        let mut summary = ImportSummary::new(project_id, files.len());
        summary.record_phase(Phase::Validating, elapsed);

        for (category, paths) in files.iter() {
            let phase = Phase::upload(category);
            let started = Instant::now();
            progress.phase_started(phase);
            info!(%phase, files = paths.len(), "Phase started");

            self.upload_phase(project_id, category, paths).await?;

            let elapsed = started.elapsed();
            progress.phase_finished(phase, elapsed);
            info!(%phase, elapsed_ms = elapsed.as_millis(), "Phase finished");
            summary.record_upload(category, paths.len());
            summary.record_phase(phase, elapsed);
        }

        Ok(summary)
    }

    async fn upload_phase(
        &self,
        project_id: &str,
        category: Category,
        paths: &[PathBuf],
    ) -> Result<(), ImportError> {
        for path in paths {
            let text = self.read(path)?;
            // Validity only; the raw text is what gets sent.
            parse(path, &text)?;

            let errors = self
                .client
                .upload(project_id, &text)
                .await
                .map_err(|source| ImportError::Client {
                    path: path.clone(),
                    source,
                })?;
            if !errors.is_empty() {
                warn!(
                    %category,
                    file = %path.display(),
                    errors = errors.len(),
                    "Import service rejected records, aborting"
                );
                return Err(ImportError::Upload {
                    category,
                    path: path.clone(),
                    errors,
                });
            }
            debug!(%category, file = %path.display(), "Uploaded");
        }
        Ok(())
    }
}

fn parse(path: &Path, text: &str) -> Result<Value, ImportError> {
    serde_json::from_str(text).map_err(|source| ImportError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
