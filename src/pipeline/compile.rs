//! LaTeX → PDF compilation.
//!
//! ## Why always two passes
//!
//! Cross-references, tables of contents and `\pageref` only resolve on the
//! second run, when the `.aux` written by the first exists. A failed first
//! pass is still followed by a second: with `-interaction=nonstopmode` the
//! compiler frequently exits non-zero yet writes a usable PDF, so the only
//! success criterion is whether `<base>.pdf` exists afterwards.
//!
//! The exception is an *environment* failure (the program is not installed):
//! a second attempt cannot change that, so compilation stops immediately.

use crate::error::StageError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Number of compiler invocations per compile.
pub const COMPILE_PASSES: usize = 2;

/// Intermediate files removed after compilation. The `.tex` and `.pdf` stay.
const AUX_EXTENSIONS: &[&str] = &[
    "aux",
    "log",
    "out",
    "toc",
    "lof",
    "lot",
    "nav",
    "snm",
    "vrb",
    "fls",
    "fdb_latexmk",
    "synctex.gz",
    "bbl",
    "blg",
    "xdv",
];

/// Output of one compiler invocation.
#[derive(Debug, Clone, Default)]
pub struct CompilerRun {
    /// Whether the process exited with status 0.
    pub exit_ok: bool,
    /// Captured stdout followed by stderr.
    pub diagnostics: String,
}

/// Something that can turn a `.tex` file into a PDF in `out_dir`.
#[async_trait]
pub trait CompilerRunner: Send + Sync {
    /// Program name, for logs and errors.
    fn program(&self) -> &str;

    /// Run one pass over `source`, writing outputs into `out_dir`.
    ///
    /// Returns [`StageError::CompilerNotFound`] or
    /// [`StageError::CompilerNotExecutable`] when the program cannot be
    /// launched at all. A pass that runs and fails is `Ok` with
    /// `exit_ok == false`.
    async fn run(&self, source: &Path, out_dir: &Path) -> Result<CompilerRun, StageError>;
}

/// Runs a pdflatex-compatible program as a subprocess.
#[derive(Debug, Clone)]
pub struct PdfLatex {
    program: String,
}

impl PdfLatex {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Whether the program can be found on `PATH` (or at the given path).
    pub fn is_available(&self) -> bool {
        which::which(&self.program).is_ok()
    }
}

impl Default for PdfLatex {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_COMPILER)
    }
}

#[async_trait]
impl CompilerRunner for PdfLatex {
    fn program(&self) -> &str {
        &self.program
    }

    async fn run(&self, source: &Path, out_dir: &Path) -> Result<CompilerRun, StageError> {
        let output = Command::new(&self.program)
            .arg("-interaction=nonstopmode")
            .arg(format!("-output-directory={}", out_dir.display()))
            .arg(source)
            .current_dir(out_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => StageError::CompilerNotFound {
                    program: self.program.clone(),
                },
                std::io::ErrorKind::PermissionDenied => StageError::CompilerNotExecutable {
                    program: self.program.clone(),
                },
                _ => StageError::io(source, &e),
            })?;

        let mut diagnostics = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !diagnostics.is_empty() && !diagnostics.ends_with('\n') {
                diagnostics.push('\n');
            }
            diagnostics.push_str(&stderr);
        }

        Ok(CompilerRun {
            exit_ok: output.status.success(),
            diagnostics,
        })
    }
}

/// Compile `markup` into `<workspace_dir>/<base_name>.pdf`.
///
/// Writes `<base_name>.tex`, runs [`COMPILE_PASSES`] passes, then removes
/// auxiliary files for `base_name`. On failure the returned
/// [`StageError::CompileFailed`] carries the last pass's output (or the
/// `.log` file when the output was empty).
pub async fn compile(
    runner: &dyn CompilerRunner,
    markup: &str,
    workspace_dir: &Path,
    base_name: &str,
) -> Result<PathBuf, StageError> {
    let tex_path = workspace_dir.join(format!("{base_name}.tex"));
    let pdf_path = workspace_dir.join(format!("{base_name}.pdf"));

    if markup.trim().is_empty() {
        return Err(StageError::CompileFailed {
            expected: pdf_path,
            diagnostics: "no LaTeX source to compile".to_string(),
        });
    }

    tokio::fs::write(&tex_path, markup)
        .await
        .map_err(|e| StageError::io(&tex_path, &e))?;
    // A PDF left from an earlier run must not count as success.
    if let Err(e) = tokio::fs::remove_file(&pdf_path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            return Err(StageError::io(&pdf_path, &e));
        }
    }

    info!(
        "Compiling {} with {} ({} passes)",
        tex_path.display(),
        runner.program(),
        COMPILE_PASSES
    );

    let mut last = CompilerRun::default();
    for pass in 1..=COMPILE_PASSES {
        match runner.run(&tex_path, workspace_dir).await {
            Ok(run) => {
                debug!("Pass {}/{}: exit_ok={}", pass, COMPILE_PASSES, run.exit_ok);
                last = run;
            }
            Err(e) => {
                remove_aux_files(workspace_dir, base_name).await;
                return Err(e);
            }
        }
    }

    let mut diagnostics = last.diagnostics;
    if diagnostics.trim().is_empty() {
        let log_path = workspace_dir.join(format!("{base_name}.log"));
        diagnostics = tokio::fs::read_to_string(&log_path)
            .await
            .unwrap_or_default();
    }
    remove_aux_files(workspace_dir, base_name).await;

    if tokio::fs::try_exists(&pdf_path).await.unwrap_or(false) {
        if !last.exit_ok {
            warn!(
                "{} exited with errors but produced {}",
                runner.program(),
                pdf_path.display()
            );
        }
        Ok(pdf_path)
    } else {
        Err(StageError::CompileFailed {
            expected: pdf_path,
            diagnostics,
        })
    }
}

/// Best-effort removal of `<base_name>.<ext>` for every auxiliary extension.
async fn remove_aux_files(dir: &Path, base_name: &str) {
    for ext in AUX_EXTENSIONS {
        let path = dir.join(format!("{base_name}.{ext}"));
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!("Removed {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove {}: {}", path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Writes whichever files it is told to, and never fails to launch.
    struct Scripted {
        calls: AtomicUsize,
        write_pdf: bool,
        exit_ok: bool,
        diagnostics: &'static str,
        seen_sources: Mutex<Vec<PathBuf>>,
    }

    impl Scripted {
        fn new(write_pdf: bool, exit_ok: bool, diagnostics: &'static str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                write_pdf,
                exit_ok,
                diagnostics,
                seen_sources: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompilerRunner for Scripted {
        fn program(&self) -> &str {
            "scripted"
        }

        async fn run(&self, source: &Path, out_dir: &Path) -> Result<CompilerRun, StageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_sources.lock().unwrap().push(source.to_path_buf());
            let stem = source.file_stem().unwrap().to_str().unwrap();
            std::fs::write(out_dir.join(format!("{stem}.aux")), "aux").unwrap();
            std::fs::write(out_dir.join(format!("{stem}.log")), "log body").unwrap();
            if self.write_pdf {
                std::fs::write(out_dir.join(format!("{stem}.pdf")), "%PDF-1.5").unwrap();
            }
            Ok(CompilerRun {
                exit_ok: self.exit_ok,
                diagnostics: self.diagnostics.to_string(),
            })
        }
    }

    struct NotInstalled(AtomicUsize);

    #[async_trait]
    impl CompilerRunner for NotInstalled {
        fn program(&self) -> &str {
            "nope-latex"
        }

        async fn run(&self, _source: &Path, _out_dir: &Path) -> Result<CompilerRun, StageError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(StageError::CompilerNotFound {
                program: "nope-latex".into(),
            })
        }
    }

    #[tokio::test]
    async fn success_runs_two_passes_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Scripted::new(true, true, "Output written");
        let pdf = compile(&runner, "\\documentclass{article}", dir.path(), "doc")
            .await
            .unwrap();
        assert_eq!(pdf, dir.path().join("doc.pdf"));
        assert_eq!(runner.calls.load(Ordering::SeqCst), COMPILE_PASSES);
        assert!(dir.path().join("doc.tex").exists());
        assert!(!dir.path().join("doc.aux").exists());
        assert!(!dir.path().join("doc.log").exists());
        let sources = runner.seen_sources.lock().unwrap();
        assert!(sources.iter().all(|s| s == &dir.path().join("doc.tex")));
    }

    #[tokio::test]
    async fn nonzero_exit_with_pdf_is_success() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Scripted::new(true, false, "! Undefined control sequence.");
        assert!(compile(&runner, "x", dir.path(), "doc").await.is_ok());
    }

    #[tokio::test]
    async fn no_pdf_is_compile_failed_with_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Scripted::new(false, false, "! LaTeX Error: File `x.sty' not found.");
        let err = compile(&runner, "x", dir.path(), "doc").await.unwrap_err();
        assert_eq!(runner.calls.load(Ordering::SeqCst), COMPILE_PASSES);
        match err {
            StageError::CompileFailed {
                expected,
                diagnostics,
            } => {
                assert_eq!(expected, dir.path().join("doc.pdf"));
                assert!(diagnostics.contains("x.sty"));
            }
            other => panic!("unexpected: {other}"),
        }
        assert!(dir.path().join("doc.tex").exists());
        assert!(!dir.path().join("doc.aux").exists());
    }

    #[tokio::test]
    async fn empty_output_falls_back_to_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Scripted::new(false, false, "");
        let err = compile(&runner, "x", dir.path(), "doc").await.unwrap_err();
        assert_eq!(err.diagnostics(), Some("log body"));
    }

    #[tokio::test]
    async fn missing_compiler_stops_after_first_pass() {
        let dir = tempfile::tempdir().unwrap();
        let runner = NotInstalled(AtomicUsize::new(0));
        let err = compile(&runner, "x", dir.path(), "doc").await.unwrap_err();
        assert!(matches!(err, StageError::CompilerNotFound { .. }));
        assert_eq!(runner.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_markup_never_invokes_compiler() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Scripted::new(true, true, "");
        let err = compile(&runner, "  \n", dir.path(), "doc").await.unwrap_err();
        assert!(matches!(err, StageError::CompileFailed { .. }));
        assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stale_pdf_does_not_count() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("doc.pdf"), "%PDF-old").unwrap();
        let runner = Scripted::new(false, false, "fatal");
        assert!(compile(&runner, "x", dir.path(), "doc").await.is_err());
        assert!(!dir.path().join("doc.pdf").exists());
    }

    #[tokio::test]
    async fn missing_program_maps_to_compiler_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let runner = PdfLatex::new("definitely-not-a-real-latex-binary");
        assert!(!runner.is_available());
        let err = runner
            .run(&dir.path().join("a.tex"), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::CompilerNotFound { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_executable_program_is_reported_as_such() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("pdflatex");
        std::fs::write(&program, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o644)).unwrap();

        let runner = PdfLatex::new(program.to_string_lossy());
        let err = runner
            .run(&dir.path().join("a.tex"), dir.path())
            .await
            .unwrap_err();
        assert!(
            matches!(err, StageError::CompilerNotExecutable { .. }),
            "got {err}"
        );
    }
}
