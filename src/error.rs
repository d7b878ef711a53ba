//! Error types for the edgequake-pdf2latex library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Pdf2LatexError`]: **Fatal.** The job cannot start at all (bad input
//!   file, download failure, no workspace) or the orchestrator was driven
//!   out of order. Returned as `Err(Pdf2LatexError)` from the top-level
//!   `process*` functions.
//!
//! * [`StageError`]: **Non-fatal.** One pipeline stage failed (model service
//!   refused, LaTeX produced no PDF, DOCX writer choked) but everything the
//!   earlier stages produced is still valid. Stored inside the
//!   [`crate::job::Job`] so callers can hand out partial results instead of
//!   losing the generated LaTeX to a compile error.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf2latex library.
///
/// Stage-level failures use [`StageError`] and are recorded on the job
/// rather than propagated here.
#[derive(Debug, Error)]
pub enum Pdf2LatexError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// lopdf could not parse the document (inspect only).
    #[error("PDF '{path}' could not be parsed: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    // ── Workspace errors ──────────────────────────────────────────────────
    /// The per-job working directory could not be created or populated.
    #[error("Failed to prepare job workspace: {source}")]
    WorkspaceFailed {
        #[source]
        source: std::io::Error,
    },

    /// Could not copy an artifact to the export directory.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Orchestration errors ──────────────────────────────────────────────
    /// The job was asked to move between two states the pipeline never links.
    #[error("Invalid job transition: {from} → {to}")]
    InvalidTransition { from: String, to: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Broad class of a [`StageError`], used to pick a remediation hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or empty credential. Fix the configuration.
    Configuration,
    /// Upload/inference failed or the model answered with nothing usable.
    Service,
    /// The host lacks a required tool (e.g. `pdflatex`). Install it.
    Environment,
    /// The compiler ran but produced no PDF. Inspect the diagnostics.
    Content,
    /// The DOCX conversion routine failed.
    Conversion,
    /// Reading or writing a workspace file failed.
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Service => "service",
            ErrorKind::Environment => "environment",
            ErrorKind::Content => "content",
            ErrorKind::Conversion => "conversion",
            ErrorKind::Io => "io",
        };
        f.write_str(s)
    }
}

/// A non-fatal error for a single pipeline stage.
///
/// Stored on the job next to whatever artifacts the earlier stages produced.
/// Later stages that depend on the failed one are reported as skipped, not
/// failed.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum StageError {
    /// No usable credential was supplied. Raised before any network call.
    #[error(
        "No access credential for the model service.\n\
Set GEMINI_API_KEY or pass --api-key."
    )]
    MissingCredential,

    /// Upload, file processing or inference failed.
    #[error("Model service error: {message}")]
    Service { message: String },

    /// The model answered, but the answer held no LaTeX.
    #[error("Model returned an empty response; no LaTeX was generated")]
    EmptyMarkup,

    /// The compiler executable is not installed or not on `PATH`.
    #[error(
        "LaTeX compiler '{program}' was not found on this host.\n\
Install a TeX distribution (e.g. texlive-latex-base) or point --compiler at an existing binary."
    )]
    CompilerNotFound { program: String },

    /// The compiler path exists but the OS refused to execute it.
    #[error(
        "LaTeX compiler '{program}' exists but could not be executed (permission denied).\n\
Check that the file is executable, or point --compiler at a working binary."
    )]
    CompilerNotExecutable { program: String },

    /// The compiler ran both passes but no PDF appeared.
    #[error("LaTeX compilation finished, but no PDF was created at '{expected}'")]
    CompileFailed { expected: PathBuf, diagnostics: String },

    /// The PDF → DOCX routine reported an error or panicked.
    #[error("Failed to convert PDF to DOCX: {message}")]
    ConversionFailed { message: String },

    /// A workspace file could not be read or written.
    #[error("Workspace I/O error on '{path}': {message}")]
    Io { path: PathBuf, message: String },
}

impl StageError {
    /// Taxonomy class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StageError::MissingCredential => ErrorKind::Configuration,
            StageError::Service { .. } | StageError::EmptyMarkup => ErrorKind::Service,
            StageError::CompilerNotFound { .. } | StageError::CompilerNotExecutable { .. } => {
                ErrorKind::Environment
            }
            StageError::CompileFailed { .. } => ErrorKind::Content,
            StageError::ConversionFailed { .. } => ErrorKind::Conversion,
            StageError::Io { .. } => ErrorKind::Io,
        }
    }

    /// Raw compiler output, when the failure carries any.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            StageError::CompileFailed { diagnostics, .. } => Some(diagnostics),
            _ => None,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        StageError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}
