//! Gemini client: upload the PDF, wait for it, ask for the LaTeX replica.
//!
//! ## Protocol
//!
//! One job costs exactly one upload and one generation request:
//!
//! 1. `POST {base}/upload/v1beta/files` opens a resumable upload session;
//!    the session URL comes back in the `x-goog-upload-url` header.
//! 2. `POST <session url>` with the bytes and `upload, finalize` returns the
//!    file resource (`name`, `uri`, `state`).
//! 3. While the file is `PROCESSING`, `GET {base}/v1beta/{name}` is polled
//!    every `file_poll_interval_ms`, at most `file_poll_attempts` times.
//!    Polling is waiting on the service, not retrying a failed call.
//! 4. `POST {base}/v1beta/models/{model}:generateContent` with the prompt and
//!    a `fileData` reference to the upload.
//!
//! ## Why the key goes in a header
//!
//! Gemini also accepts `?key=` in the query string, but reqwest errors echo
//! the URL. Sending `x-goog-api-key` keeps the credential out of every
//! error message and log line.

use crate::config::{Credential, PipelineConfig};
use crate::error::{Pdf2LatexError, StageError};
use crate::output::TokenUsage;
use crate::pipeline::generate::{Generation, MarkupModel};
use crate::pipeline::input::SourceDocument;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

const API_KEY_HEADER: &str = "x-goog-api-key";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";
const PDF_MIME: &str = "application/pdf";

/// Longest slice of an unparseable error body quoted back to the caller.
const MAX_ERROR_BODY: usize = 300;

/// [`MarkupModel`] backed by the Gemini `generateContent` API.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_base: String,
    model: String,
    temperature: Option<f32>,
    poll_interval: Duration,
    poll_attempts: u32,
}

impl GeminiClient {
    /// Build a client from the job configuration.
    ///
    /// The credential is not captured here; it is passed per call.
    pub fn new(config: &PipelineConfig) -> Result<Self, Pdf2LatexError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Pdf2LatexError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            poll_interval: Duration::from_millis(config.file_poll_interval_ms),
            poll_attempts: config.file_poll_attempts,
        })
    }

    // ── Upload ────────────────────────────────────────────────────────────

    async fn upload(
        &self,
        source: &SourceDocument,
        credential: &Credential,
    ) -> Result<RemoteFile, StageError> {
        let start_url = format!("{}/upload/v1beta/files", self.api_base);
        let resp = self
            .http
            .post(&start_url)
            .header(API_KEY_HEADER, credential.expose())
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header(
                "X-Goog-Upload-Header-Content-Length",
                source.len().to_string(),
            )
            .header("X-Goog-Upload-Header-Content-Type", PDF_MIME)
            .json(&json!({ "file": { "display_name": source.file_name() } }))
            .send()
            .await
            .map_err(|e| transport("upload start", e))?;
        let resp = check_status(resp, "upload start").await?;
        let session_url = upload_session_url(resp.headers())?;

        let resp = self
            .http
            .post(&session_url)
            .header(API_KEY_HEADER, credential.expose())
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(source.bytes().to_vec())
            .send()
            .await
            .map_err(|e| transport("upload", e))?;
        let resp = check_status(resp, "upload").await?;
        let uploaded: UploadResponse = resp
            .json()
            .await
            .map_err(|e| malformed("upload", e))?;

        debug!(
            "Uploaded '{}' as {} (state {:?})",
            source.file_name(),
            uploaded.file.name,
            uploaded.file.state
        );
        Ok(uploaded.file)
    }

    async fn get_file(&self, name: &str, credential: &Credential) -> Result<RemoteFile, StageError> {
        let url = format!("{}/v1beta/{}", self.api_base, name);
        let resp = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, credential.expose())
            .send()
            .await
            .map_err(|e| transport("file status", e))?;
        let resp = check_status(resp, "file status").await?;
        resp.json().await.map_err(|e| malformed("file status", e))
    }

    /// Block until the upload leaves `PROCESSING`.
    async fn wait_until_active(
        &self,
        mut file: RemoteFile,
        credential: &Credential,
    ) -> Result<RemoteFile, StageError> {
        let mut checks = 0u32;
        loop {
            match file.state.as_deref() {
                Some("PROCESSING") => {
                    if checks >= self.poll_attempts {
                        return Err(StageError::Service {
                            message: format!(
                                "uploaded file {} still processing after {} checks",
                                file.name, checks
                            ),
                        });
                    }
                    checks += 1;
                    tokio::time::sleep(self.poll_interval).await;
                    file = self.get_file(&file.name, credential).await?;
                }
                Some("FAILED") => {
                    let detail = file
                        .error
                        .map(|e| e.message)
                        .unwrap_or_else(|| "no detail".to_string());
                    return Err(StageError::Service {
                        message: format!("file processing failed: {detail}"),
                    });
                }
                // ACTIVE, or a response that omits the state.
                _ => return Ok(file),
            }
        }
    }

    // ── Inference ─────────────────────────────────────────────────────────

    async fn generate_content(
        &self,
        file: &RemoteFile,
        prompt: &str,
        credential: &Credential,
    ) -> Result<Generation, StageError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base, self.model
        );
        let mime = file.mime_type.as_deref().unwrap_or(PDF_MIME);
        let mut body = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": prompt },
                    { "fileData": { "mimeType": mime, "fileUri": file.uri } }
                ]
            }]
        });
        if let Some(t) = self.temperature {
            body["generationConfig"] = json!({ "temperature": t });
        }

        let resp = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, credential.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| transport("generateContent", e))?;
        let resp = check_status(resp, "generateContent").await?;
        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| malformed("generateContent", e))?;
        parsed.into_generation()
    }
}

#[async_trait]
impl MarkupModel for GeminiClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        source: &SourceDocument,
        prompt: &str,
        credential: &Credential,
    ) -> Result<Generation, StageError> {
        let file = self.upload(source, credential).await?;
        let file = self.wait_until_active(file, credential).await?;
        info!("File {} ready; requesting generation", file.name);
        self.generate_content(&file, prompt, credential).await
    }
}

// ── Wire types ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: RemoteFile,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteFile {
    name: String,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<ApiStatus>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
    /// Thinking models interleave reasoning parts; those are not markup.
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

impl GenerateResponse {
    fn into_generation(self) -> Result<Generation, StageError> {
        let usage = self.usage_metadata.map(|u| TokenUsage {
            input_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
        });

        let Some(candidate) = self.candidates.into_iter().next() else {
            let message = match self.prompt_feedback.and_then(|f| f.block_reason) {
                Some(reason) => format!("prompt blocked: {reason}"),
                None => "response contained no candidates".to_string(),
            };
            return Err(StageError::Service { message });
        };

        let text: String = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter(|p| !p.thought)
            .filter_map(|p| p.text)
            .collect();

        match candidate.finish_reason.as_deref() {
            None | Some("STOP") => {}
            Some(reason) if text.trim().is_empty() => {
                return Err(StageError::Service {
                    message: format!("generation stopped with {reason} and no text"),
                });
            }
            Some(reason) => warn!("Generation finished with {reason}; output may be truncated"),
        }

        Ok(Generation { text, usage })
    }
}

// ── Error mapping ─────────────────────────────────────────────────────────

fn upload_session_url(headers: &HeaderMap) -> Result<String, StageError> {
    headers
        .get(UPLOAD_URL_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| StageError::Service {
            message: format!("upload start response had no {UPLOAD_URL_HEADER} header"),
        })
}

async fn check_status(
    resp: reqwest::Response,
    step: &str,
) -> Result<reqwest::Response, StageError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let detail = match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(parsed) if !parsed.error.message.is_empty() => parsed.error.message,
        _ => body.chars().take(MAX_ERROR_BODY).collect(),
    };
    Err(StageError::Service {
        message: format!("{step}: HTTP {status}: {detail}"),
    })
}

fn transport(step: &str, e: reqwest::Error) -> StageError {
    let message = if e.is_timeout() {
        format!("{step} timed out")
    } else {
        format!("{step} failed: {}", e.without_url())
    };
    StageError::Service { message }
}

fn malformed(step: &str, e: reqwest::Error) -> StageError {
    StageError::Service {
        message: format!("{step}: malformed response: {}", e.without_url()),
    }
}
