//! Serialisable results: job reports, artifact listings, PDF metadata.
//!
//! These are plain data snapshots. The live, mutable state is the
//! [`crate::job::Job`]; a [`JobReport`] is what you print, log, or return
//! from an API handler once the job is done.

use crate::job::{JobState, Stage, StageStatus};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Paths of the artifacts a job produced, each independently downloadable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobArtifacts {
    /// Generated LaTeX source (`<base>.tex`).
    pub markup: Option<PathBuf>,
    /// PDF compiled from the generated LaTeX (`<base>_recompiled.pdf`).
    pub recompiled_pdf: Option<PathBuf>,
    /// DOCX converted from the recompiled PDF (`<base>.docx`).
    pub document: Option<PathBuf>,
}

impl JobArtifacts {
    /// Number of artifacts present.
    pub fn count(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Present artifacts in pipeline order, tagged with the stage that made them.
    pub fn iter(&self) -> impl Iterator<Item = (Stage, &Path)> {
        [
            (Stage::Generation, self.markup.as_deref()),
            (Stage::Compilation, self.recompiled_pdf.as_deref()),
            (Stage::Conversion, self.document.as_deref()),
        ]
        .into_iter()
        .filter_map(|(stage, path)| path.map(|p| (stage, p)))
    }

    pub fn get(&self, stage: Stage) -> Option<&Path> {
        match stage {
            Stage::Generation => self.markup.as_deref(),
            Stage::Compilation => self.recompiled_pdf.as_deref(),
            Stage::Conversion => self.document.as_deref(),
        }
    }

    pub(crate) fn set(&mut self, stage: Stage, path: PathBuf) {
        match stage {
            Stage::Generation => self.markup = Some(path),
            Stage::Compilation => self.recompiled_pdf = Some(path),
            Stage::Conversion => self.document = Some(path),
        }
    }
}

/// Token accounting reported by the model service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Outcome of one stage inside a [`JobReport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    pub status: StageStatus,
    /// Wall-clock time spent in the stage; 0 when it never ran.
    pub duration_ms: u64,
}

/// A point-in-time summary of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    /// File name of the uploaded PDF.
    pub source: String,
    /// Base name used for every artifact.
    pub base_name: String,
    pub state: JobState,
    pub stages: Vec<StageReport>,
    pub artifacts: JobArtifacts,
    /// Where the artifacts were exported, if they were.
    pub exported: Option<JobArtifacts>,
    pub usage: Option<TokenUsage>,
    /// Workspace directory, if it still exists.
    pub workspace: Option<PathBuf>,
}

/// Metadata read from a PDF without converting it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub page_count: usize,
    pub pdf_version: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
}
