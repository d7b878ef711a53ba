//! Job orchestration and the top-level entry points.
//!
//! ## Why partial success is the normal case
//!
//! Every stage consumes the previous stage's artifact, so the first failure
//! ends the run. What it must not do is throw away what already exists: a
//! compile error still leaves the generated `.tex` on the job, downloadable
//! and inspectable. [`Pipeline::run`] therefore returns `Ok(())` whenever the
//! job reached a terminal state, successful or not; `Err` is reserved for
//! problems that prevented the run from happening at all.
//!
//! ## Artifact layout inside the workspace
//!
//! ```text
//! <workspace>/
//!   input/<original name>.pdf   the upload
//!   <base>.tex                  generated LaTeX (artifact)
//!   <base>_recompiled.tex       compiler input
//!   <base>_recompiled.pdf       compiled PDF (artifact)
//!   <base>.docx                 converted document (artifact)
//! ```

use crate::config::PipelineConfig;
use crate::error::{Pdf2LatexError, StageError};
use crate::job::{Job, JobState, SkipReason, Stage};
use crate::output::{DocumentMetadata, JobReport};
use crate::pipeline::compile::{compile, CompilerRunner, PdfLatex};
use crate::pipeline::docx::{convert_document, DocumentConverter, DocxConverter};
use crate::pipeline::gemini::GeminiClient;
use crate::pipeline::generate::{generate_markup, MarkupModel};
use crate::pipeline::input::{self, SourceDocument};
use crate::pipeline::inspect::inspect_bytes;
use crate::progress::{NoopProgressCallback, PipelineProgressCallback};
use crate::prompts::REPLICA_PROMPT;
use crate::workspace::Workspace;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Suffix that keeps the compiled PDF from colliding with the upload's name.
const RECOMPILED_SUFFIX: &str = "_recompiled";

/// The three stage capabilities plus the configuration that drives them.
///
/// [`Pipeline::new`] wires the production implementations; the `with_*`
/// methods swap any of them, which is how tests run without network or TeX.
#[derive(Clone)]
pub struct Pipeline {
    model: Arc<dyn MarkupModel>,
    compiler: Arc<dyn CompilerRunner>,
    converter: Arc<dyn DocumentConverter>,
    config: PipelineConfig,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("model", &self.model.name())
            .field("compiler", &self.compiler.program())
            .field("config", &self.config)
            .finish()
    }
}

impl Pipeline {
    /// Gemini for generation, the configured compiler, lopdf + docx-rs for
    /// conversion.
    pub fn new(config: PipelineConfig) -> Result<Self, Pdf2LatexError> {
        Ok(Self {
            model: Arc::new(GeminiClient::new(&config)?),
            compiler: Arc::new(PdfLatex::new(config.compiler.clone())),
            converter: Arc::new(DocxConverter),
            config,
        })
    }

    pub fn with_model(mut self, model: Arc<dyn MarkupModel>) -> Self {
        self.model = model;
        self
    }

    pub fn with_compiler(mut self, compiler: Arc<dyn CompilerRunner>) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn with_converter(mut self, converter: Arc<dyn DocumentConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage of an idle job.
    ///
    /// Returns `Ok(())` once the job is `Complete` or `Failed(_)`; inspect
    /// [`Job::state`] and [`Job::status`] for the outcome.
    ///
    /// # Errors
    /// * [`Pdf2LatexError::InvalidTransition`] if the job is not `Idle`
    /// * [`Pdf2LatexError::WorkspaceFailed`] if the workspace cannot be set up;
    ///   the job stays `Idle`
    pub async fn run(&self, job: &mut Job) -> Result<(), Pdf2LatexError> {
        if job.state() != JobState::Idle {
            return Err(Pdf2LatexError::InvalidTransition {
                from: job.state().to_string(),
                to: JobState::GeneratingMarkup.to_string(),
            });
        }

        let noop = NoopProgressCallback;
        let cb: &dyn PipelineProgressCallback = match &self.config.progress_callback {
            Some(cb) => cb.as_ref(),
            None => &noop as &dyn PipelineProgressCallback,
        };

        let total_start = Instant::now();
        info!("Starting job: {}", job.source().file_name());
        cb.on_job_start(job.source().file_name());

        // ── Workspace ────────────────────────────────────────────────────
        let workspace = Workspace::create(self.config.workspace_root.as_deref())
            .map_err(|source| Pdf2LatexError::WorkspaceFailed { source })?;
        let source_path = workspace
            .store_source(job.source().file_name(), job.source().bytes())
            .map_err(|source| Pdf2LatexError::WorkspaceFailed { source })?;
        let dir = workspace.path().to_path_buf();
        job.attach_workspace(workspace, source_path);
        let base = job.base_name().to_string();

        // ── Stage 1: Generation ──────────────────────────────────────────
        job.transition(JobState::GeneratingMarkup)?;
        cb.on_stage_start(Stage::Generation);
        let start = Instant::now();
        match self.generate(job.source(), &dir, &base).await {
            Ok((markup, usage, path)) => {
                info!("Generated {} chars of LaTeX", markup.len());
                job.set_markup(markup, usage);
                job.record_success(Stage::Generation, path.clone(), elapsed_ms(start));
                cb.on_stage_complete(Stage::Generation, &path);
            }
            Err(e) => return self.fail(job, Stage::Generation, e, start, cb),
        }

        // ── Stage 2: Compilation ─────────────────────────────────────────
        job.transition(JobState::CompilingOutput)?;
        cb.on_stage_start(Stage::Compilation);
        let start = Instant::now();
        let markup = job.markup().unwrap_or_default().to_string();
        let compiled_base = format!("{base}{RECOMPILED_SUFFIX}");
        let pdf = match compile(self.compiler.as_ref(), &markup, &dir, &compiled_base).await {
            Ok(pdf) => {
                job.record_success(Stage::Compilation, pdf.clone(), elapsed_ms(start));
                cb.on_stage_complete(Stage::Compilation, &pdf);
                pdf
            }
            Err(e) => return self.fail(job, Stage::Compilation, e, start, cb),
        };

        // ── Stage 3: Conversion ──────────────────────────────────────────
        job.transition(JobState::ConvertingFormat)?;
        cb.on_stage_start(Stage::Conversion);
        let start = Instant::now();
        match convert_document(self.converter.as_ref(), &pdf, &dir, &base).await {
            Ok(docx) => {
                job.record_success(Stage::Conversion, docx.clone(), elapsed_ms(start));
                cb.on_stage_complete(Stage::Conversion, &docx);
            }
            Err(e) => return self.fail(job, Stage::Conversion, e, start, cb),
        }

        job.transition(JobState::Complete)?;
        self.finish(job, cb);
        info!(
            "Job '{}' complete in {}ms",
            job.source().file_name(),
            elapsed_ms(total_start)
        );
        Ok(())
    }

    async fn generate(
        &self,
        source: &SourceDocument,
        dir: &Path,
        base: &str,
    ) -> Result<(String, Option<crate::output::TokenUsage>, PathBuf), StageError> {
        let prompt = self.config.prompt.as_deref().unwrap_or(REPLICA_PROMPT);
        let generation = generate_markup(
            self.model.as_ref(),
            source,
            prompt,
            self.config.credential.as_ref(),
        )
        .await?;
        let path = dir.join(format!("{base}.tex"));
        tokio::fs::write(&path, &generation.text)
            .await
            .map_err(|e| StageError::io(&path, &e))?;
        Ok((generation.text, generation.usage, path))
    }

    /// Record `error` on `stage`, skip everything downstream, end in `Failed`.
    fn fail(
        &self,
        job: &mut Job,
        stage: Stage,
        error: StageError,
        start: Instant,
        cb: &dyn PipelineProgressCallback,
    ) -> Result<(), Pdf2LatexError> {
        warn!("{} stage failed ({}): {}", stage, error.kind(), error);
        cb.on_stage_failed(stage, &error);
        job.record_failure(stage, error, elapsed_ms(start));
        for &later in stage.downstream() {
            let reason = SkipReason::UpstreamFailed(stage);
            cb.on_stage_skipped(later, &reason);
            job.record_skip(later, reason);
        }
        job.transition(JobState::Failed(stage))?;
        self.finish(job, cb);
        Ok(())
    }

    fn finish(&self, job: &mut Job, cb: &dyn PipelineProgressCallback) {
        if self.config.keep_workspace {
            if let Some(dir) = job.retain_workspace() {
                info!("Workspace kept at {}", dir.display());
            }
        }
        cb.on_job_complete(&job.state());
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

// ── Entry points ──────────────────────────────────────────────────────────

/// Load a PDF from a path or URL and run it through the pipeline.
///
/// # Returns
/// The finished job, `Complete` or `Failed(_)`. Its artifacts live in the
/// job's workspace until the job is reset or dropped (unless
/// `keep_workspace` is set).
///
/// # Errors
/// Only for problems that stop the job from running: unreadable or non-PDF
/// input, failed download, no workspace.
pub async fn process(
    input_str: impl AsRef<str>,
    config: &PipelineConfig,
) -> Result<Job, Pdf2LatexError> {
    let source = input::load_source(input_str.as_ref(), config.download_timeout_secs).await?;
    run_job(Job::new(source), config).await
}

/// Run the pipeline on a PDF already in memory.
///
/// `file_name` names the artifacts (`report.pdf` → `report.tex`, …).
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdf2latex::{process_bytes, PipelineConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("report.pdf")?;
/// let config = PipelineConfig::builder().api_key("…").build()?;
/// let job = process_bytes("report.pdf", bytes, &config).await?;
/// println!("{}", job.state());
/// # Ok(())
/// # }
/// ```
pub async fn process_bytes(
    file_name: impl AsRef<str>,
    bytes: Vec<u8>,
    config: &PipelineConfig,
) -> Result<Job, Pdf2LatexError> {
    input::check_magic(Path::new(file_name.as_ref()), &bytes)?;
    run_job(Job::from_bytes(file_name, bytes), config).await
}

/// Synchronous wrapper around [`process`].
///
/// Creates a temporary tokio runtime internally.
pub fn process_sync(
    input_str: impl AsRef<str>,
    config: &PipelineConfig,
) -> Result<Job, Pdf2LatexError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2LatexError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(process(input_str, config))
}

/// Process a PDF and copy every produced artifact into `dest`.
///
/// The workspace is deleted afterwards unless `keep_workspace` is set. A
/// failed stage is not an error: the report says which artifacts exist.
pub async fn process_to_dir(
    input_str: impl AsRef<str>,
    dest: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<JobReport, Pdf2LatexError> {
    let mut job = process(input_str, config).await?;
    let exported = job.export_artifacts(dest.as_ref())?;
    let mut report = job.report();
    report.exported = Some(exported);
    if !config.keep_workspace {
        job.reset()?;
        report.workspace = None;
    }
    Ok(report)
}

/// Read PDF metadata without running the pipeline.
///
/// Does not require a credential or a TeX installation. Only
/// `download_timeout_secs` is read from `config`.
pub async fn inspect(
    input_str: impl AsRef<str>,
    config: &PipelineConfig,
) -> Result<DocumentMetadata, Pdf2LatexError> {
    let input_str = input_str.as_ref();
    let source = input::load_source(input_str, config.download_timeout_secs).await?;
    let bytes = source.bytes().to_vec();
    let origin = PathBuf::from(input_str);
    tokio::task::spawn_blocking(move || inspect_bytes(&bytes, &origin))
        .await
        .map_err(|e| Pdf2LatexError::Internal(format!("inspect task: {e}")))?
}

async fn run_job(mut job: Job, config: &PipelineConfig) -> Result<Job, Pdf2LatexError> {
    Pipeline::new(config.clone())?.run(&mut job).await?;
    Ok(job)
}
