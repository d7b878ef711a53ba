//! DOCX conversion and metadata inspection over generated PDFs.
//!
//! Fixtures are written with lopdf and URLs are served by wiremock, so
//! nothing here needs TeX or outside network access.

mod common;

use edgequake_pdf2latex::pipeline::docx::convert_document;
use edgequake_pdf2latex::{inspect, DocxConverter, Pdf2LatexError, PipelineConfig, StageError};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn docx_json(path: &std::path::Path) -> String {
    let bytes = std::fs::read(path).unwrap();
    let docx = docx_rs::read_docx(&bytes).expect("valid docx");
    serde_json::to_string(&docx).unwrap()
}

#[tokio::test]
async fn every_page_reaches_the_document() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("memo_recompiled.pdf");
    std::fs::write(&pdf, common::text_pdf(&["Hello page one", "Second page"], "Memo")).unwrap();

    let docx = convert_document(&DocxConverter, &pdf, dir.path(), "memo")
        .await
        .unwrap();
    assert_eq!(docx, dir.path().join("memo.docx"));

    let json = docx_json(&docx);
    let first = json.find("Hello page one").expect("page 1 text");
    let second = json.find("Second page").expect("page 2 text");
    assert!(first < second);
}

#[tokio::test]
async fn tex_ligatures_survive_conversion() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("memo_recompiled.pdf");
    std::fs::write(&pdf, common::cm_font_pdf(b"\x0Cnal of\x0Bce")).unwrap();

    let docx = convert_document(&DocxConverter, &pdf, dir.path(), "memo")
        .await
        .unwrap();

    let json = docx_json(&docx);
    assert!(json.contains("final office"), "docx: {json}");
}

#[tokio::test]
async fn not_a_pdf_fails_conversion() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("x.pdf");
    std::fs::write(&pdf, b"plain text, not a pdf").unwrap();

    let err = convert_document(&DocxConverter, &pdf, dir.path(), "x")
        .await
        .unwrap_err();
    assert!(matches!(err, StageError::ConversionFailed { .. }));
}

#[tokio::test]
async fn inspect_reads_info_dictionary() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("memo.pdf");
    std::fs::write(&pdf, common::text_pdf(&["a", "b", "c"], "Quarterly memo")).unwrap();

    let meta = inspect(pdf.to_str().unwrap(), &PipelineConfig::default()).await.unwrap();
    assert_eq!(meta.page_count, 3);
    assert_eq!(meta.pdf_version, "1.5");
    assert_eq!(meta.title.as_deref(), Some("Quarterly memo"));
    assert_eq!(meta.producer.as_deref(), Some("lopdf"));
    assert!(meta.author.is_none());
}

#[tokio::test]
async fn inspect_rejects_non_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.pdf");
    std::fs::write(&path, b"just notes").unwrap();

    let err = inspect(path.to_str().unwrap(), &PipelineConfig::default()).await.unwrap_err();
    assert!(matches!(err, Pdf2LatexError::NotAPdf { .. }));
}

#[tokio::test]
async fn inspect_honours_download_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(common::text_pdf(&["late"], "Late"))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let config = PipelineConfig::builder()
        .download_timeout_secs(1)
        .build()
        .unwrap();
    let url = format!("{}/slow.pdf", server.uri());
    let err = inspect(&url, &config).await.unwrap_err();
    match err {
        Pdf2LatexError::DownloadTimeout { secs, .. } => assert_eq!(secs, 1),
        other => panic!("unexpected: {other}"),
    }
}
