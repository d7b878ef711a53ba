//! Per-job working directory.
//!
//! Each job gets its own [`TempDir`], so two jobs can never see each other's
//! files and a dropped job cleans up after itself, even on panic. Callers
//! that want to download artifacts later either copy them out
//! ([`crate::job::Job::export_artifacts`]) or [`Workspace::retain`] the
//! directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Sub-directory that holds the uploaded source PDF.
///
/// Keeping the upload apart from the generated files means a source named
/// `report.tex` or `report_recompiled.pdf` can never collide with an artifact.
pub const INPUT_DIR: &str = "input";

/// An exclusively-owned directory scoped to one job.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Allocate a fresh workspace under `root`, or under the system temp dir.
    pub fn create(root: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("pdf2latex-");
        let dir = match root {
            Some(root) => {
                fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        debug!("Allocated workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a top-level file in the workspace.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Store the uploaded PDF under [`INPUT_DIR`] and return its path.
    pub fn store_source(&self, file_name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let input_dir = self.dir.path().join(INPUT_DIR);
        fs::create_dir_all(&input_dir)?;
        let path = input_dir.join(file_name);
        fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Keep the directory on disk and hand back its path.
    ///
    /// After this the caller owns the cleanup.
    pub fn retain(self) -> PathBuf {
        let path = self.dir.keep();
        debug!("Retained workspace {}", path.display());
        path
    }

    /// Delete the directory and everything in it.
    pub fn discard(self) -> io::Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        debug!("Discarded workspace {}", path.display());
        Ok(())
    }
}
