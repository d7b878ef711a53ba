//! Configuration types for PDF → LaTeX → PDF → DOCX jobs.
//!
//! Every knob lives in [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`]. The credential is carried as a [`Credential`]
//! so it cannot end up in a `Debug` dump or a log line by accident.

use crate::error::Pdf2LatexError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;

/// Default multimodal model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";

/// Default model service endpoint.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Default LaTeX compiler program.
pub const DEFAULT_COMPILER: &str = "pdflatex";

/// Access token for the model service.
///
/// Construction rejects blank input, so holding a `Credential` means holding
/// a non-empty token. `Debug` is redacted and there is no `Display`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a token. Returns `None` for an empty or whitespace-only string.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Read a token from an environment variable.
    pub fn from_env(var: &str) -> Option<Self> {
        std::env::var(var).ok().and_then(Self::new)
    }

    /// The raw token, for the request header and nothing else.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Configuration for one pipeline run.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdf2latex::{Credential, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .credential(Credential::new("my-key").unwrap())
///     .model("gemini-2.5-flash")
///     .compiler("xelatex")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Access token for the model service. No default: a missing credential
    /// fails the generation stage before any network call.
    pub credential: Option<Credential>,

    /// Model identifier. Default: `gemini-2.5-pro`.
    pub model: String,

    /// Base URL of the model service. Default: the public Gemini endpoint.
    ///
    /// Tests point this at a local mock server.
    pub api_base: String,

    /// Sampling temperature. Default: `None` (service default).
    pub temperature: Option<f32>,

    /// Timeout for each HTTP request to the model service, in seconds. Default: 600.
    ///
    /// Replicating a dense multi-page document routinely takes minutes.
    pub request_timeout_secs: u64,

    /// Delay between status checks while an uploaded file is `PROCESSING`. Default: 1000.
    pub file_poll_interval_ms: u64,

    /// Maximum status checks before an unprocessed upload is a failure. Default: 30.
    pub file_poll_attempts: u32,

    /// Custom instruction prompt. If None, uses [`crate::prompts::REPLICA_PROMPT`].
    pub prompt: Option<String>,

    /// Compiler program invoked for both passes. Default: `pdflatex`.
    pub compiler: String,

    /// Directory under which job workspaces are created. Default: system temp dir.
    pub workspace_root: Option<PathBuf>,

    /// Keep the workspace on disk after the job is done. Default: false.
    pub keep_workspace: bool,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Receives stage events. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            credential: None,
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            temperature: None,
            request_timeout_secs: 600,
            file_poll_interval_ms: 1000,
            file_poll_attempts: 30,
            prompt: None,
            compiler: DEFAULT_COMPILER.to_string(),
            workspace_root: None,
            keep_workspace: false,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("credential", &self.credential)
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("temperature", &self.temperature)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("file_poll_interval_ms", &self.file_poll_interval_ms)
            .field("file_poll_attempts", &self.file_poll_attempts)
            .field("prompt", &self.prompt.as_ref().map(|p| p.len()))
            .field("compiler", &self.compiler)
            .field("workspace_root", &self.workspace_root)
            .field("keep_workspace", &self.keep_workspace)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn PipelineProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn credential(mut self, credential: Credential) -> Self {
        self.config.credential = Some(credential);
        self
    }

    /// Convenience: wrap a raw token; blank tokens leave the credential unset.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.credential = Credential::new(key);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.config.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn file_poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.file_poll_interval_ms = ms;
        self
    }

    pub fn file_poll_attempts(mut self, n: u32) -> Self {
        self.config.file_poll_attempts = n;
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn compiler(mut self, program: impl Into<String>) -> Self {
        self.config.compiler = program.into();
        self
    }

    pub fn workspace_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.workspace_root = Some(dir.into());
        self
    }

    pub fn keep_workspace(mut self, v: bool) -> Self {
        self.config.keep_workspace = v;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// A missing credential is *not* a build error: it is reported by the
    /// generation stage so the job records it like any other stage failure.
    pub fn build(self) -> Result<PipelineConfig, Pdf2LatexError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(Pdf2LatexError::InvalidConfig("Model must not be empty".into()));
        }
        if c.api_base.trim().is_empty() {
            return Err(Pdf2LatexError::InvalidConfig(
                "API base URL must not be empty".into(),
            ));
        }
        if c.compiler.trim().is_empty() {
            return Err(Pdf2LatexError::InvalidConfig(
                "Compiler program must not be empty".into(),
            ));
        }
        if c.file_poll_attempts == 0 {
            return Err(Pdf2LatexError::InvalidConfig(
                "File poll attempts must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = PipelineConfig::default();
        assert!(c.credential.is_none());
        assert_eq!(c.model, "gemini-2.5-pro");
        assert_eq!(c.compiler, "pdflatex");
        assert_eq!(c.request_timeout_secs, 600);
        assert!(!c.keep_workspace);
    }

    #[test]
    fn blank_credential_is_rejected() {
        assert!(Credential::new("").is_none());
        assert!(Credential::new("   \n").is_none());
        assert_eq!(Credential::new(" abc ").unwrap().expose(), "abc");
    }

    #[test]
    fn credential_debug_is_redacted() {
        let config = PipelineConfig::builder()
            .api_key("super-secret-token")
            .build()
            .unwrap();
        let dump = format!("{config:?}");
        assert!(!dump.contains("super-secret-token"), "leaked: {dump}");
        assert!(dump.contains("<redacted>"));
    }

    #[test]
    fn api_key_blank_leaves_unset() {
        let config = PipelineConfig::builder().api_key("  ").build().unwrap();
        assert!(config.credential.is_none());
    }

    #[test]
    fn api_base_trailing_slash_trimmed() {
        let config = PipelineConfig::builder()
            .api_base("http://127.0.0.1:9999/")
            .build()
            .unwrap();
        assert_eq!(config.api_base, "http://127.0.0.1:9999");
    }

    #[test]
    fn temperature_clamped() {
        let config = PipelineConfig::builder().temperature(7.5).build().unwrap();
        assert_eq!(config.temperature, Some(2.0));
    }

    #[test]
    fn empty_compiler_rejected() {
        let err = PipelineConfig::builder().compiler(" ").build().unwrap_err();
        assert!(err.to_string().contains("Compiler"));
    }

    #[test]
    fn zero_poll_attempts_rejected() {
        assert!(PipelineConfig::builder()
            .file_poll_attempts(0)
            .build()
            .is_err());
    }
}
