//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use std::path::Path;

/// Bytes of a small text PDF: one page per entry in `pages`, each holding
/// that line of text, plus an Info dictionary with `title`.
pub fn text_pdf(pages: &[&str], title: &str) -> Vec<u8> {
    let font = dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    };
    let shown: Vec<&[u8]> = pages.iter().map(|p| p.as_bytes()).collect();
    build_pdf(font, &shown, title)
}

/// A one-page PDF shaped like pdflatex output: a Computer Modern Type1
/// font with no `/Encoding` and no `/ToUnicode`, showing `shown` verbatim.
pub fn cm_font_pdf(shown: &[u8]) -> Vec<u8> {
    let font = dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "CMR10",
    };
    build_pdf(font, &[shown], "Recompiled")
}

fn build_pdf(font: Dictionary, pages: &[&[u8]], title: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(font);
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(text.to_vec())]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(title),
        "Producer" => Object::string_literal("lopdf"),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("serialise pdf");
    bytes
}

/// Write a one-page text PDF to `path`.
pub fn write_text_pdf(path: &Path, text: &str) {
    std::fs::write(path, text_pdf(&[text], "Fixture")).expect("write pdf");
}

/// A complete, package-free LaTeX document.
pub const MINIMAL_LATEX: &str = r"\documentclass{article}
\begin{document}
\section{Overview}
Quarterly results are in.
\end{document}
";
