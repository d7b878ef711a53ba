//! PDF → DOCX conversion.
//!
//! The recompiled PDF is read with `lopdf`, its text is extracted page by
//! page, and a Word document is written with `docx-rs`: one paragraph per
//! text line and a hard page break between PDF pages. Both libraries are
//! synchronous, so the work runs on the blocking pool; a panic inside them
//! becomes a [`StageError::ConversionFailed`] instead of taking the job down.
//!
//! ## Ligatures
//!
//! pdflatex embeds Computer Modern / EC Type1 fonts without a `/ToUnicode`
//! map, and typesets "fi", "ffl" and friends as single glyphs in the control
//! range (OT1 `0x0B..=0x0F`, T1 `0x1B..=0x1F`). No standard PDF encoding
//! defines those codes, so a plain decode drops them and "final office"
//! becomes "nal ofce". Pages whose fonts carry no `/ToUnicode` are therefore
//! decoded here, with the ligature codes expanded; pages that do have one go
//! through lopdf's own extractor.

use crate::error::StageError;
use async_trait::async_trait;
use docx_rs::{BreakType, Docx, Paragraph, Run};
use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Something that can turn a PDF into a DOCX file.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    /// Read `pdf` and write a DOCX to `output`.
    async fn convert(&self, pdf: &Path, output: &Path) -> Result<(), StageError>;
}

/// Text-flow converter built on lopdf + docx-rs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxConverter;

#[async_trait]
impl DocumentConverter for DocxConverter {
    async fn convert(&self, pdf: &Path, output: &Path) -> Result<(), StageError> {
        let pdf = pdf.to_path_buf();
        let output = output.to_path_buf();
        tokio::task::spawn_blocking(move || convert_blocking(&pdf, &output))
            .await
            .map_err(|e| StageError::ConversionFailed {
                message: if e.is_panic() {
                    "converter panicked".to_string()
                } else {
                    format!("converter task failed: {e}")
                },
            })?
    }
}

/// Convert `pdf` into `<workspace_dir>/<base_name>.docx`.
///
/// Fails unless the converter reports success *and* the file exists.
pub async fn convert_document(
    converter: &dyn DocumentConverter,
    pdf: &Path,
    workspace_dir: &Path,
    base_name: &str,
) -> Result<PathBuf, StageError> {
    let docx_path = workspace_dir.join(format!("{base_name}.docx"));
    info!("Converting {} → {}", pdf.display(), docx_path.display());

    converter.convert(pdf, &docx_path).await?;

    if tokio::fs::try_exists(&docx_path).await.unwrap_or(false) {
        Ok(docx_path)
    } else {
        Err(StageError::ConversionFailed {
            message: format!("converter reported success but {} is missing", docx_path.display()),
        })
    }
}

fn convert_blocking(pdf: &Path, output: &Path) -> Result<(), StageError> {
    let doc = Document::load(pdf).map_err(|e| StageError::ConversionFailed {
        message: format!("cannot read {}: {e}", pdf.display()),
    })?;

    let pages = doc.get_pages();
    if pages.is_empty() {
        return Err(StageError::ConversionFailed {
            message: format!("{} has no pages", pdf.display()),
        });
    }

    let mut docx = Docx::new();
    for (i, (&number, &page_id)) in pages.iter().enumerate() {
        if i > 0 {
            docx = docx.add_paragraph(
                Paragraph::new().add_run(Run::new().add_break(BreakType::Page)),
            );
        }
        let text = page_text(&doc, number, page_id).unwrap_or_else(|e| {
            warn!("Page {}: no extractable text ({})", number, e);
            String::new()
        });
        for line in page_lines(&text) {
            docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(line)));
        }
    }

    let file = File::create(output).map_err(|e| StageError::io(output, &e))?;
    docx.build()
        .pack(file)
        .map_err(|e| StageError::ConversionFailed {
            message: format!("cannot write {}: {e}", output.display()),
        })?;

    debug!("Wrote {} pages to {}", pages.len(), output.display());
    Ok(())
}

// ── Text extraction ─────────────────────────────────────────────────────────

/// Text of one page, one line per text object.
fn page_text(doc: &Document, number: u32, page_id: ObjectId) -> lopdf::Result<String> {
    let fonts = doc.get_page_fonts(page_id);
    if fonts.values().any(|font| font.has(b"ToUnicode")) {
        return doc.extract_text(&[number]);
    }

    let encodings: BTreeMap<Vec<u8>, &str> = fonts
        .iter()
        .map(|(name, font)| (name.clone(), font.get_font_encoding()))
        .collect();
    let content = Content::decode(&doc.get_page_content(page_id)?)?;

    let mut text = String::new();
    let mut encoding = None;
    for op in &content.operations {
        match op.operator.as_str() {
            "Tf" => {
                encoding = op
                    .operands
                    .first()
                    .and_then(|name| name.as_name().ok())
                    .and_then(|name| encodings.get(name).copied());
            }
            "Tj" | "TJ" => push_operands(&mut text, encoding, &op.operands),
            "'" => {
                push_newline(&mut text);
                push_operands(&mut text, encoding, &op.operands);
            }
            "ET" => push_newline(&mut text),
            _ => {}
        }
    }
    Ok(text)
}

fn push_newline(text: &mut String) {
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
}

fn push_operands(text: &mut String, encoding: Option<&str>, operands: &[Object]) {
    for operand in operands {
        match operand {
            Object::String(bytes, _) => text.push_str(&decode_shown(encoding, bytes)),
            Object::Array(items) => push_operands(text, encoding, items),
            // A large negative kern in a TJ array is an inter-word gap.
            Object::Integer(n) if *n < -100 => push_space(text),
            Object::Real(n) if *n < -100.0 => push_space(text),
            _ => {}
        }
    }
}

fn push_space(text: &mut String) {
    if !text.is_empty() && !text.ends_with([' ', '\n']) {
        text.push(' ');
    }
}

/// Decode a shown string, expanding TeX ligature codes the font encoding
/// leaves undefined.
fn decode_shown(encoding: Option<&str>, bytes: &[u8]) -> String {
    let mut out = String::new();
    let mut start = 0;
    for (i, &byte) in bytes.iter().enumerate() {
        if let Some(ligature) = tex_ligature(byte) {
            out.push_str(&Document::decode_text(encoding, &bytes[start..i]));
            out.push_str(ligature);
            start = i + 1;
        }
    }
    out.push_str(&Document::decode_text(encoding, &bytes[start..]));
    out
}

/// OT1 and T1 positions of the f-ligatures.
fn tex_ligature(byte: u8) -> Option<&'static str> {
    match byte {
        0x0B | 0x1B => Some("ff"),
        0x0C | 0x1C => Some("fi"),
        0x0D | 0x1D => Some("fl"),
        0x0E | 0x1E => Some("ffi"),
        0x0F | 0x1F => Some("ffl"),
        _ => None,
    }
}

/// Non-blank lines of one page, right-trimmed.
fn page_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn page_lines_skip_blanks() {
        let lines: Vec<&str> = page_lines("Title  \n\n   \nBody text\n").collect();
        assert_eq!(lines, vec!["Title", "Body text"]);
    }

    #[test]
    fn ligature_codes_expand() {
        let shown = b"\x0Cnal of\x0Bce, \x1Dow, e\x0Eciency";
        assert_eq!(
            decode_shown(Some("StandardEncoding"), shown),
            "final office, flow, efficiency"
        );
    }

    #[test]
    fn plain_text_decodes_unchanged() {
        assert_eq!(decode_shown(Some("WinAnsiEncoding"), b"Quarterly"), "Quarterly");
        assert_eq!(decode_shown(None, b""), "");
    }

    #[test]
    fn kerned_gaps_become_single_spaces() {
        let mut text = String::new();
        let tj = vec![Object::Array(vec![
            Object::string_literal("Hello"),
            Object::Integer(-333),
            Object::Integer(-333),
            Object::string_literal("world"),
            Object::Integer(-20),
            Object::string_literal("!"),
        ])];
        push_operands(&mut text, None, &tj);
        assert_eq!(text, "Hello world!");
    }

    #[tokio::test]
    async fn unreadable_pdf_is_conversion_failure() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("broken.pdf");
        std::fs::write(&pdf, b"%PDF-1.5\nthis is not a pdf body").unwrap();
        let err = convert_document(&DocxConverter, &pdf, dir.path(), "broken")
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::ConversionFailed { .. }), "got {err}");
        assert!(!dir.path().join("broken.docx").exists());
    }

    struct SaysOkWritesNothing(AtomicUsize);

    #[async_trait]
    impl DocumentConverter for SaysOkWritesNothing {
        async fn convert(&self, _pdf: &Path, _output: &Path) -> Result<(), StageError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn missing_output_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let converter = SaysOkWritesNothing(AtomicUsize::new(0));
        let err = convert_document(&converter, Path::new("/x.pdf"), dir.path(), "x")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing"));
        assert_eq!(converter.0.load(Ordering::SeqCst), 1);
    }
}
