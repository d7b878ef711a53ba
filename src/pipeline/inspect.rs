//! Read PDF metadata without running the pipeline.

use crate::error::Pdf2LatexError;
use crate::output::DocumentMetadata;
use lopdf::{Dictionary, Document, Object};
use std::path::Path;

/// Page count, version and Info-dictionary fields of a PDF in memory.
///
/// `origin` is only used in error messages.
pub fn inspect_bytes(bytes: &[u8], origin: &Path) -> Result<DocumentMetadata, Pdf2LatexError> {
    let doc = Document::load_mem(bytes).map_err(|e| Pdf2LatexError::CorruptPdf {
        path: origin.to_path_buf(),
        detail: e.to_string(),
    })?;

    let mut meta = DocumentMetadata {
        page_count: doc.get_pages().len(),
        pdf_version: doc.version.clone(),
        ..Default::default()
    };

    if let Some(info) = info_dictionary(&doc) {
        let get = |key: &[u8]| info.get(key).ok().and_then(decode_text_string);
        meta.title = get(b"Title");
        meta.author = get(b"Author");
        meta.subject = get(b"Subject");
        meta.creator = get(b"Creator");
        meta.producer = get(b"Producer");
    }

    Ok(meta)
}

/// The trailer's `/Info`, whether stored inline or by reference.
fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
    match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_dict().ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

/// PDF text strings are either UTF-16BE with a BOM or PDFDocEncoding,
/// approximated here as Latin-1.
fn decode_text_string(obj: &Object) -> Option<String> {
    let Object::String(bytes, _) = obj else {
        return None;
    };
    let text = if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        String::from_utf8(bytes.clone()).unwrap_or_else(|_| bytes.iter().map(|&b| b as char).collect())
    };
    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::StringFormat;

    #[test]
    fn decodes_utf16_with_bom() {
        let obj = Object::String(vec![0xFE, 0xFF, 0x00, 0x48, 0x00, 0xE9], StringFormat::Hexadecimal);
        assert_eq!(decode_text_string(&obj).as_deref(), Some("Hé"));
    }

    #[test]
    fn decodes_latin1_fallback() {
        let obj = Object::String(vec![b'C', 0xE9], StringFormat::Literal);
        assert_eq!(decode_text_string(&obj).as_deref(), Some("Cé"));
    }

    #[test]
    fn blank_and_non_strings_are_none() {
        assert!(decode_text_string(&Object::String(b"  ".to_vec(), StringFormat::Literal)).is_none());
        assert!(decode_text_string(&Object::Integer(3)).is_none());
    }

    #[test]
    fn garbage_is_corrupt_pdf() {
        let err = inspect_bytes(b"%PDF-1.4 nothing else", Path::new("x.pdf")).unwrap_err();
        assert!(matches!(err, Pdf2LatexError::CorruptPdf { .. }));
    }
}
