//! The job: one upload, one workspace, three stages.
//!
//! A [`Job`] is an explicit value the caller owns and hands to
//! [`crate::process::Pipeline::run`]. It records the state machine position,
//! every stage outcome, and the artifact paths. Dropping the job (or calling
//! [`Job::reset`]) deletes its workspace.
//!
//! ```text
//! Idle ─▶ GeneratingMarkup ─▶ CompilingOutput ─▶ ConvertingFormat ─▶ Complete
//!               │                    │                   │
//!               ▼                    ▼                   ▼
//!      Failed(generation)   Failed(compilation)  Failed(conversion)
//!
//! Complete | Failed(_) ──reset──▶ Idle
//! ```

use crate::error::{Pdf2LatexError, StageError};
use crate::output::{JobArtifacts, JobReport, StageReport, TokenUsage};
use crate::pipeline::input::SourceDocument;
use crate::workspace::Workspace;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One of the three pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Generation,
    Compilation,
    Conversion,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 3] = [Stage::Generation, Stage::Compilation, Stage::Conversion];

    /// 1-based position, for "Step n/3" displays.
    pub fn step(self) -> usize {
        match self {
            Stage::Generation => 1,
            Stage::Compilation => 2,
            Stage::Conversion => 3,
        }
    }

    /// Stages that consume this stage's artifact, directly or transitively.
    pub fn downstream(self) -> &'static [Stage] {
        match self {
            Stage::Generation => &[Stage::Compilation, Stage::Conversion],
            Stage::Compilation => &[Stage::Conversion],
            Stage::Conversion => &[],
        }
    }

    /// The working state in which this stage runs.
    pub fn working_state(self) -> JobState {
        match self {
            Stage::Generation => JobState::GeneratingMarkup,
            Stage::Compilation => JobState::CompilingOutput,
            Stage::Conversion => JobState::ConvertingFormat,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Generation => write!(f, "generation"),
            Stage::Compilation => write!(f, "compilation"),
            Stage::Conversion => write!(f, "conversion"),
        }
    }
}

/// Why a stage was not attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// An earlier stage failed, so this stage's input does not exist.
    UpstreamFailed(Stage),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UpstreamFailed(stage) => write!(f, "{stage} stage failed"),
        }
    }
}

/// Per-stage outcome recorded on the job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageStatus {
    #[default]
    NotStarted,
    Succeeded,
    Skipped { reason: SkipReason },
    Failed { error: StageError },
}

impl StageStatus {
    pub fn is_succeeded(&self) -> bool {
        matches!(self, StageStatus::Succeeded)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, StageStatus::Skipped { .. })
    }

    pub fn error(&self) -> Option<&StageError> {
        match self {
            StageStatus::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// Position of a job in the pipeline state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Idle,
    GeneratingMarkup,
    CompilingOutput,
    ConvertingFormat,
    Complete,
    Failed(Stage),
}

impl JobState {
    /// `Complete` or any `Failed` state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Complete | JobState::Failed(_))
    }

    /// The stage that runs in this state, if it is a working state.
    pub fn working_stage(&self) -> Option<Stage> {
        match self {
            JobState::GeneratingMarkup => Some(Stage::Generation),
            JobState::CompilingOutput => Some(Stage::Compilation),
            JobState::ConvertingFormat => Some(Stage::Conversion),
            _ => None,
        }
    }

    /// Whether the pipeline ever moves from `self` to `next`.
    pub fn can_transition_to(&self, next: &JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (Idle, GeneratingMarkup)
            | (GeneratingMarkup, CompilingOutput)
            | (CompilingOutput, ConvertingFormat)
            | (ConvertingFormat, Complete) => true,
            (working, Failed(stage)) => working.working_stage() == Some(*stage),
            (Complete | Failed(_), Idle) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Idle => write!(f, "Idle"),
            JobState::GeneratingMarkup => write!(f, "GeneratingMarkup"),
            JobState::CompilingOutput => write!(f, "CompilingOutput"),
            JobState::ConvertingFormat => write!(f, "ConvertingFormat"),
            JobState::Complete => write!(f, "Complete"),
            JobState::Failed(stage) => write!(f, "Failed({stage})"),
        }
    }
}

/// One user-initiated processing run.
#[derive(Debug)]
pub struct Job {
    source: SourceDocument,
    state: JobState,
    history: Vec<JobState>,
    workspace: Option<Workspace>,
    retained: Option<PathBuf>,
    source_path: Option<PathBuf>,
    markup: Option<String>,
    artifacts: JobArtifacts,
    stages: BTreeMap<Stage, StageStatus>,
    durations_ms: BTreeMap<Stage, u64>,
    usage: Option<TokenUsage>,
}

impl Job {
    /// Create an idle job for an uploaded document. No workspace yet.
    pub fn new(source: SourceDocument) -> Self {
        Self {
            source,
            state: JobState::Idle,
            history: vec![JobState::Idle],
            workspace: None,
            retained: None,
            source_path: None,
            markup: None,
            artifacts: JobArtifacts::default(),
            stages: BTreeMap::new(),
            durations_ms: BTreeMap::new(),
            usage: None,
        }
    }

    /// Shorthand for `Job::new(SourceDocument::new(file_name, bytes))`.
    pub fn from_bytes(file_name: impl AsRef<str>, bytes: Vec<u8>) -> Self {
        Self::new(SourceDocument::new(file_name, bytes))
    }

    pub fn source(&self) -> &SourceDocument {
        &self.source
    }

    /// Base name shared by every artifact (`report.pdf` → `report`).
    pub fn base_name(&self) -> &str {
        self.source.base_name()
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Every state the job has been in since creation or the last reset.
    pub fn history(&self) -> &[JobState] {
        &self.history
    }

    pub fn is_complete(&self) -> bool {
        self.state == JobState::Complete
    }

    /// The generated LaTeX, once the generation stage succeeded.
    pub fn markup(&self) -> Option<&str> {
        self.markup.as_deref()
    }

    pub fn artifacts(&self) -> &JobArtifacts {
        &self.artifacts
    }

    pub fn status(&self, stage: Stage) -> &StageStatus {
        static NOT_STARTED: StageStatus = StageStatus::NotStarted;
        self.stages.get(&stage).unwrap_or(&NOT_STARTED)
    }

    pub fn usage(&self) -> Option<TokenUsage> {
        self.usage
    }

    /// Workspace directory, while the job holds one.
    pub fn workspace_dir(&self) -> Option<&Path> {
        self.workspace
            .as_ref()
            .map(Workspace::path)
            .or(self.retained.as_deref())
    }

    /// Path of the source PDF copy inside the workspace.
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    // ── Orchestrator hooks ───────────────────────────────────────────────

    /// Move to `next`, rejecting edges the state machine does not have.
    pub(crate) fn transition(&mut self, next: JobState) -> Result<(), Pdf2LatexError> {
        if !self.state.can_transition_to(&next) {
            return Err(Pdf2LatexError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        debug!("Job '{}': {} → {}", self.source.file_name(), self.state, next);
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    pub(crate) fn attach_workspace(&mut self, workspace: Workspace, source_path: PathBuf) {
        self.workspace = Some(workspace);
        self.source_path = Some(source_path);
    }

    pub(crate) fn set_markup(&mut self, markup: String, usage: Option<TokenUsage>) {
        self.markup = Some(markup);
        self.usage = usage;
    }

    pub(crate) fn record_success(&mut self, stage: Stage, artifact: PathBuf, duration_ms: u64) {
        self.artifacts.set(stage, artifact);
        self.stages.insert(stage, StageStatus::Succeeded);
        self.durations_ms.insert(stage, duration_ms);
    }

    pub(crate) fn record_failure(&mut self, stage: Stage, error: StageError, duration_ms: u64) {
        self.stages.insert(stage, StageStatus::Failed { error });
        self.durations_ms.insert(stage, duration_ms);
    }

    pub(crate) fn record_skip(&mut self, stage: Stage, reason: SkipReason) {
        self.stages.insert(stage, StageStatus::Skipped { reason });
    }

    // ── Lifecycle ────────────────────────────────────────────────────────

    /// Return a finished job to `Idle`.
    ///
    /// Deletes the workspace (unless it was retained), which invalidates
    /// every artifact path, so those are cleared too. The source document is
    /// kept, so the job can be run again.
    pub fn reset(&mut self) -> Result<(), Pdf2LatexError> {
        if self.state == JobState::Idle {
            return Ok(());
        }
        if !self.state.is_terminal() {
            return Err(Pdf2LatexError::InvalidTransition {
                from: self.state.to_string(),
                to: JobState::Idle.to_string(),
            });
        }

        if let Some(ws) = self.workspace.take() {
            if let Err(e) = ws.discard() {
                warn!("Failed to delete workspace: {}", e);
            }
        }
        self.retained = None;
        self.source_path = None;
        self.markup = None;
        self.artifacts = JobArtifacts::default();
        self.stages.clear();
        self.durations_ms.clear();
        self.usage = None;
        self.state = JobState::Idle;
        self.history = vec![JobState::Idle];
        info!("Job '{}' reset", self.source.file_name());
        Ok(())
    }

    /// Keep the workspace on disk after the job is dropped.
    ///
    /// Artifact paths stay valid; the caller becomes responsible for the
    /// directory.
    pub fn retain_workspace(&mut self) -> Option<PathBuf> {
        if let Some(ws) = self.workspace.take() {
            self.retained = Some(ws.retain());
        }
        self.retained.clone()
    }

    /// Copy every produced artifact into `dest` under its download name.
    ///
    /// Each file is written to a hidden temporary name first and then
    /// renamed, so an interrupted export never leaves a truncated artifact.
    pub fn export_artifacts(&self, dest: impl AsRef<Path>) -> Result<JobArtifacts, Pdf2LatexError> {
        let dest = dest.as_ref();
        fs::create_dir_all(dest).map_err(|e| Pdf2LatexError::OutputWriteFailed {
            path: dest.to_path_buf(),
            source: e,
        })?;

        let mut exported = JobArtifacts::default();
        for (stage, src) in self.artifacts.iter() {
            let Some(name) = src.file_name() else {
                continue;
            };
            let target = dest.join(name);
            let tmp = dest.join(format!(".{}.tmp", name.to_string_lossy()));
            fs::copy(src, &tmp)
                .and_then(|_| fs::rename(&tmp, &target))
                .map_err(|e| {
                    let _ = fs::remove_file(&tmp);
                    Pdf2LatexError::OutputWriteFailed {
                        path: target.clone(),
                        source: e,
                    }
                })?;
            exported.set(stage, target);
        }
        Ok(exported)
    }

    /// Snapshot of the job for printing or serialising.
    pub fn report(&self) -> JobReport {
        JobReport {
            source: self.source.file_name().to_string(),
            base_name: self.base_name().to_string(),
            state: self.state,
            stages: Stage::ALL
                .iter()
                .map(|&stage| StageReport {
                    stage,
                    status: self.status(stage).clone(),
                    duration_ms: self.durations_ms.get(&stage).copied().unwrap_or(0),
                })
                .collect(),
            artifacts: self.artifacts.clone(),
            exported: None,
            usage: self.usage,
            workspace: self.workspace_dir().map(Path::to_path_buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::from_bytes("report.pdf", b"%PDF-1.4\n".to_vec())
    }

    #[test]
    fn happy_path_transitions() {
        let mut j = job();
        j.transition(JobState::GeneratingMarkup).unwrap();
        j.transition(JobState::CompilingOutput).unwrap();
        j.transition(JobState::ConvertingFormat).unwrap();
        j.transition(JobState::Complete).unwrap();
        assert_eq!(
            j.history(),
            &[
                JobState::Idle,
                JobState::GeneratingMarkup,
                JobState::CompilingOutput,
                JobState::ConvertingFormat,
                JobState::Complete
            ]
        );
    }

    #[test]
    fn failed_only_from_matching_working_state() {
        assert!(JobState::GeneratingMarkup.can_transition_to(&JobState::Failed(Stage::Generation)));
        assert!(!JobState::GeneratingMarkup.can_transition_to(&JobState::Failed(Stage::Compilation)));
        assert!(JobState::CompilingOutput.can_transition_to(&JobState::Failed(Stage::Compilation)));
        assert!(!JobState::Idle.can_transition_to(&JobState::Failed(Stage::Generation)));
        assert!(!JobState::Complete.can_transition_to(&JobState::Failed(Stage::Conversion)));
    }

    #[test]
    fn skipping_a_stage_is_rejected() {
        let mut j = job();
        let err = j.transition(JobState::CompilingOutput).unwrap_err();
        assert!(matches!(err, Pdf2LatexError::InvalidTransition { .. }));
        assert_eq!(j.state(), JobState::Idle);
    }

    #[test]
    fn reset_only_from_terminal() {
        let mut j = job();
        j.transition(JobState::GeneratingMarkup).unwrap();
        assert!(j.reset().is_err());
        j.transition(JobState::Failed(Stage::Generation)).unwrap();
        j.reset().unwrap();
        assert_eq!(j.state(), JobState::Idle);
        assert_eq!(j.history(), &[JobState::Idle]);
    }

    #[test]
    fn reset_discards_workspace_and_artifacts() {
        let mut j = job();
        let ws = Workspace::create(None).unwrap();
        let dir = ws.path().to_path_buf();
        let src = ws.store_source("report.pdf", b"%PDF").unwrap();
        let tex = ws.file("report.tex");
        fs::write(&tex, "\\documentclass{article}").unwrap();
        j.attach_workspace(ws, src);
        j.transition(JobState::GeneratingMarkup).unwrap();
        j.set_markup("\\documentclass{article}".into(), None);
        j.record_success(Stage::Generation, tex, 5);
        j.transition(JobState::CompilingOutput).unwrap();
        j.transition(JobState::Failed(Stage::Compilation)).unwrap();

        j.reset().unwrap();
        assert!(!dir.exists());
        assert!(j.artifacts().is_empty());
        assert!(j.markup().is_none());
        assert!(j.workspace_dir().is_none());
        assert!(matches!(j.status(Stage::Generation), StageStatus::NotStarted));
    }

    #[test]
    fn default_status_is_not_started() {
        let j = job();
        for stage in Stage::ALL {
            assert!(matches!(j.status(stage), StageStatus::NotStarted));
        }
    }

    #[test]
    fn report_lists_all_stages() {
        let mut j = job();
        j.record_skip(Stage::Conversion, SkipReason::UpstreamFailed(Stage::Compilation));
        let report = j.report();
        assert_eq!(report.stages.len(), 3);
        assert_eq!(report.base_name, "report");
        assert!(report.stages[2].status.is_skipped());
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"status\":\"skipped\""), "got: {json}");
    }

    #[test]
    fn export_copies_present_artifacts_only() {
        let ws = Workspace::create(None).unwrap();
        let tex = ws.file("report.tex");
        fs::write(&tex, "\\documentclass{article}").unwrap();
        let src = ws.store_source("report.pdf", b"%PDF").unwrap();
        let mut j = job();
        j.attach_workspace(ws, src);
        j.record_success(Stage::Generation, tex, 1);

        let dest = tempfile::tempdir().unwrap();
        let exported = j.export_artifacts(dest.path()).unwrap();
        assert_eq!(exported.count(), 1);
        let out = exported.markup.unwrap();
        assert_eq!(out, dest.path().join("report.tex"));
        assert_eq!(fs::read_to_string(out).unwrap(), "\\documentclass{article}");
        assert!(!dest.path().join(".report.tex.tmp").exists());
    }
}
