//! Replica generation: PDF + instruction prompt → LaTeX text.
//!
//! The model call sits behind the [`MarkupModel`] trait so the orchestrator
//! never knows which service (or which test double) it is talking to.
//! [`generate_markup`] is the stage boundary: it refuses to call out without
//! a credential, strips fences from the answer, and turns an empty answer
//! into a typed failure. All prompt text lives in [`crate::prompts`].

use crate::config::Credential;
use crate::error::StageError;
use crate::output::TokenUsage;
use crate::pipeline::input::SourceDocument;
use crate::pipeline::postprocess::{looks_like_complete_document, strip_latex_fences};
use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Text returned by a model, plus whatever accounting it reported.
#[derive(Debug, Clone, Default)]
pub struct Generation {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

/// A multimodal model that can read a PDF and answer with text.
///
/// Implementations upload `source`, send `prompt` alongside it, and return
/// the raw answer. Every failure must come back as a [`StageError`]; nothing
/// may panic past this boundary.
#[async_trait]
pub trait MarkupModel: Send + Sync {
    /// Model identifier, for logs.
    fn name(&self) -> &str;

    async fn generate(
        &self,
        source: &SourceDocument,
        prompt: &str,
        credential: &Credential,
    ) -> Result<Generation, StageError>;
}

/// Run the generation stage against `model`.
///
/// A missing credential fails here, before `model` is touched. The returned
/// text has any outer `` ```latex `` fence removed and is never blank.
pub async fn generate_markup(
    model: &dyn MarkupModel,
    source: &SourceDocument,
    prompt: &str,
    credential: Option<&Credential>,
) -> Result<Generation, StageError> {
    let Some(credential) = credential else {
        warn!("No credential configured; skipping model call");
        return Err(StageError::MissingCredential);
    };

    info!(
        "Requesting LaTeX replica of '{}' ({} bytes) from {}",
        source.file_name(),
        source.len(),
        model.name()
    );
    let start = Instant::now();
    let mut generation = model.generate(source, prompt, credential).await?;
    debug!(
        "Model answered with {} chars in {:?}",
        generation.text.len(),
        start.elapsed()
    );

    let text = strip_latex_fences(&generation.text);
    if text.trim().is_empty() {
        return Err(StageError::EmptyMarkup);
    }
    if !looks_like_complete_document(&text) {
        warn!("Generated LaTeX has no \\documentclass … \\end{{document}} frame; compiling anyway");
    }

    generation.text = text;
    Ok(generation)
}
