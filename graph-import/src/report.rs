//! Import run summary.

use std::time::Duration;

use serde::Serialize;

use crate::files::Category;
use crate::importer::Phase;

/// Files uploaded per category.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct CategoryCounts {
    pub nodes: usize,
    pub lists: usize,
    pub relations: usize,
}

/// Wall-clock duration of one finished phase.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct PhaseTiming {
    pub phase: Phase,
    pub elapsed_ms: u64,
}

/// Result of a completed import run.
///
/// Only produced when every phase finished; a failed run yields an
/// [`ImportError`](crate::ImportError) instead.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[non_exhaustive]
pub struct ImportSummary {
    /// Project the files were uploaded to.
    pub project_id: String,
    /// Number of files that passed validation.
    pub validated_files: usize,
    /// Number of files uploaded, per category.
    pub uploaded: CategoryCounts,
    /// Finished phases in the order they ran.
    pub phases: Vec<PhaseTiming>,
}

impl ImportSummary {
    pub(crate) fn new(project_id: &str, validated_files: usize) -> Self {
        Self {
            project_id: project_id.to_owned(),
            validated_files,
            uploaded: CategoryCounts::default(),
            phases: Vec::with_capacity(4),
        }
    }

    pub(crate) fn record_phase(&mut self, phase: Phase, elapsed: Duration) {
        self.phases.push(PhaseTiming {
            phase,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        });
    }

    pub(crate) fn record_upload(&mut self, category: Category, files: usize) {
        match category {
            Category::Nodes => self.uploaded.nodes += files,
            Category::Lists => self.uploaded.lists += files,
            Category::Relations => self.uploaded.relations += files,
        }
    }

    /// Total number of files uploaded.
    #[must_use]
    pub fn uploaded_files(&self) -> usize {
        self.uploaded.nodes + self.uploaded.lists + self.uploaded.relations
    }

    /// Sum of all phase durations in milliseconds.
    #[must_use]
    pub fn total_ms(&self) -> u64 {
        self.phases
            .iter()
            .fold(0, |acc, t| acc.saturating_add(t.elapsed_ms))
    }
}
