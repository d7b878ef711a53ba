//! Input resolution: turn a user-supplied path or URL into a [`SourceDocument`].
//!
//! The job owns the uploaded bytes, not a path: the workspace that will hold
//! the on-disk copy does not exist until the job is triggered, and it is
//! recreated after every reset. We validate the PDF magic bytes (`%PDF`)
//! here so callers get a meaningful error before any model call is paid for.

use crate::error::Pdf2LatexError;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Fallback name when the upload has no usable file name.
const FALLBACK_FILE_NAME: &str = "document.pdf";

/// The uploaded PDF: its file name and its bytes.
#[derive(Clone)]
pub struct SourceDocument {
    file_name: String,
    base_name: String,
    bytes: Vec<u8>,
}

impl SourceDocument {
    /// Wrap an upload.
    ///
    /// Only the final path component of `file_name` is kept, so a name like
    /// `../../etc/passwd` cannot escape the workspace.
    pub fn new(file_name: impl AsRef<str>, bytes: Vec<u8>) -> Self {
        let file_name = Path::new(file_name.as_ref())
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(FALLBACK_FILE_NAME)
            .to_string();
        let base_name = base_name_for(&file_name);
        Self {
            file_name,
            base_name,
            bytes,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Stem used for every artifact name.
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for SourceDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceDocument")
            .field("file_name", &self.file_name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Derive the artifact stem from a file name.
///
/// pdflatex treats spaces and shell/TeX specials in the job name badly, so
/// anything outside `[A-Za-z0-9._-]` becomes `_`.
pub fn base_name_for(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("");
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to an in-memory source document.
///
/// If the input is a URL, download it. If the input is a local file,
/// validate it exists, is readable and starts with `%PDF`.
pub async fn load_source(input: &str, timeout_secs: u64) -> Result<SourceDocument, Pdf2LatexError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        load_local(input)
    }
}

/// Resolve a local file path, validating existence and PDF magic bytes.
fn load_local(path_str: &str) -> Result<SourceDocument, Pdf2LatexError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(Pdf2LatexError::FileNotFound { path });
    }

    let mut bytes = Vec::new();
    match std::fs::File::open(&path) {
        Ok(mut f) => {
            f.read_to_end(&mut bytes)
                .map_err(|_| Pdf2LatexError::FileNotFound { path: path.clone() })?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2LatexError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(Pdf2LatexError::FileNotFound { path });
        }
    }

    check_magic(&path, &bytes)?;

    debug!("Loaded local PDF: {} ({} bytes)", path.display(), bytes.len());
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    Ok(SourceDocument::new(name, bytes))
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<SourceDocument, Pdf2LatexError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Pdf2LatexError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Pdf2LatexError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Pdf2LatexError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(Pdf2LatexError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let filename = filename_from_url(url);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Pdf2LatexError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?
        .to_vec();

    check_magic(Path::new(&filename), &bytes)?;

    info!("Downloaded {} bytes as '{}'", bytes.len(), filename);
    Ok(SourceDocument::new(filename, bytes))
}

/// Reject anything that does not start with `%PDF`.
pub(crate) fn check_magic(path: &Path, bytes: &[u8]) -> Result<(), Pdf2LatexError> {
    if bytes.len() >= 4 && &bytes[..4] == b"%PDF" {
        return Ok(());
    }
    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    Err(Pdf2LatexError::NotAPdf {
        path: path.to_path_buf(),
        magic,
    })
}

/// Extract a reasonable filename from the URL path.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}
