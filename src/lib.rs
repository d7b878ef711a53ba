//! # edgequake-pdf2latex
//!
//! Replicate a PDF as LaTeX with a multimodal model, recompile it, and
//! convert the result to DOCX.
//!
//! ## Why this crate?
//!
//! Text extractors lose everything that makes a document *look* like itself:
//! tables, lists, emphasis, page structure. A multimodal model can read the
//! whole PDF and write LaTeX that reproduces it. That LaTeX is an editable
//! source of truth: compile it for a clean PDF, convert that PDF for people
//! who live in Word.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      load local file or download from URL, check %PDF magic
//!  ├─ 2. Generate   upload to Gemini, ask for a complete .tex replica
//!  ├─ 3. Polish     strip ```latex fences from the answer
//!  ├─ 4. Compile    pdflatex × 2 → <base>_recompiled.pdf, aux cleanup
//!  └─ 5. Convert    recompiled PDF → <base>.docx
//! ```
//!
//! Each stage's artifact is kept even when a later stage fails: a compile
//! error still leaves you the `.tex`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2latex::{process, Credential, JobState, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::builder()
//!         .credential(Credential::from_env("GEMINI_API_KEY").ok_or("no key")?)
//!         .build()?;
//!     let job = process("report.pdf", &config).await?;
//!     for (stage, path) in job.artifacts().iter() {
//!         println!("{stage}: {}", path.display());
//!     }
//!     if let JobState::Failed(stage) = job.state() {
//!         eprintln!("{stage} failed: {:?}", job.status(stage).error());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2latex` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdf2latex = { version = "0.1", default-features = false }
//! ```
//!
//! ## Host Requirements
//!
//! Compilation shells out to `pdflatex` (configurable). Without it the
//! compilation stage fails with an environment error and the generated
//! LaTeX is still returned.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod job;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod prompts;
pub mod workspace;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{Credential, PipelineConfig, PipelineConfigBuilder};
pub use error::{ErrorKind, Pdf2LatexError, StageError};
pub use job::{Job, JobState, SkipReason, Stage, StageStatus};
pub use output::{DocumentMetadata, JobArtifacts, JobReport, StageReport, TokenUsage};
pub use pipeline::compile::{CompilerRun, CompilerRunner, PdfLatex};
pub use pipeline::docx::{DocumentConverter, DocxConverter};
pub use pipeline::gemini::GeminiClient;
pub use pipeline::generate::{Generation, MarkupModel};
pub use pipeline::input::SourceDocument;
pub use process::{inspect, process, process_bytes, process_sync, process_to_dir, Pipeline};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
