//! Pipeline stages for PDF → LaTeX → PDF → DOCX.
//!
//! Each submodule implements exactly one transformation step. The three
//! external capabilities (model, compiler, converter) sit behind traits so
//! the orchestrator in [`crate::process`] can be driven by test doubles.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ generate ──▶ postprocess ──▶ compile ──▶ docx
//! (path/URL) (Gemini)     (fences)      (pdflatex ×2) (lopdf → docx-rs)
//! ```
//!
//! 1. [`input`]: load the upload into memory and check the `%PDF` magic
//! 2. [`generate`]: the [`generate::MarkupModel`] seam and credential gate;
//!    [`gemini`] is the production implementation and the only network I/O
//! 3. [`postprocess`]: strip a wrapping `` ```latex `` fence
//! 4. [`compile`]: write the `.tex`, run the compiler twice, clean up
//! 5. [`docx`]: text-flow conversion of the recompiled PDF
//!
//! [`inspect`] reads PDF metadata and is not part of a job.

pub mod compile;
pub mod docx;
pub mod gemini;
pub mod generate;
pub mod input;
pub mod inspect;
pub mod postprocess;
