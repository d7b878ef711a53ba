//! Progress-callback trait for per-stage pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to be told
//! when each stage starts, produces its artifact, is skipped, or fails.
//! The library does not care whether the host forwards these to a terminal
//! spinner, a web socket, or a database row.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2latex::{PipelineConfig, PipelineProgressCallback, Stage};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl PipelineProgressCallback for Printer {
//!     fn on_stage_complete(&self, stage: Stage, artifact: &Path) {
//!         eprintln!("{stage} → {}", artifact.display());
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::StageError;
use crate::job::{JobState, SkipReason, Stage};
use std::path::Path;
use std::sync::Arc;

/// Called by the orchestrator as a job moves through its stages.
///
/// Stages run strictly one after another, so calls never overlap for a
/// single job. Implementations are still `Send + Sync` so they can be
/// shared with the tokio runtime. All methods default to no-ops.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once when the job leaves `Idle`.
    fn on_job_start(&self, source_name: &str) {
        let _ = source_name;
    }

    /// Called just before a stage calls out to its collaborator.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage produced its artifact.
    fn on_stage_complete(&self, stage: Stage, artifact: &Path) {
        let _ = (stage, artifact);
    }

    /// Called for every stage that is not attempted because an earlier one failed.
    fn on_stage_skipped(&self, stage: Stage, reason: &SkipReason) {
        let _ = (stage, reason);
    }

    /// Called when a stage failed.
    fn on_stage_failed(&self, stage: Stage, error: &StageError) {
        let _ = (stage, error);
    }

    /// Called once the job reaches `Complete` or `Failed`.
    fn on_job_complete(&self, state: &JobState) {
        let _ = state;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
