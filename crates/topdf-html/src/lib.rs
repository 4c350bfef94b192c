//! HTML structural sanitizer.
//!
//! Reduces arbitrary HTML to a small set of text-bearing tags before it is
//! handed to a headless renderer: attributes, styles and scripts are dropped,
//! entities are decoded, and nested tables are flattened into their
//! outermost table.

pub mod tables;
pub mod tree;

use std::path::Path;

use topdf_core::error::SanitizeError;
use topdf_utils::encoding::decode_to_utf8;

pub use tables::{resolve_nested_tables, TableOverlapMatrix, TableReport};
pub use tree::{HtmlTree, NodeId, NodeKind, Tag};

/// Sanitize an HTML string.
pub fn clean_html(html: &str) -> (String, TableReport) {
    let mut tree = HtmlTree::parse(html);
    let report = resolve_nested_tables(&mut tree);
    (tree.to_html(), report)
}

/// Sanitize an HTML document, rejecting blank input.
pub fn sanitize_str(html: &str) -> Result<String, SanitizeError> {
    if html.trim().is_empty() {
        return Err(SanitizeError::Empty);
    }
    let (html, report) = clean_html(html);
    if report.demoted > 0 {
        log::info!(
            "flattened {} nested table(s), kept {}",
            report.demoted,
            report.kept
        );
    }
    Ok(html)
}

/// Sanitize raw bytes of unknown encoding.
pub fn sanitize_bytes(raw: &[u8]) -> Result<String, SanitizeError> {
    let (text, encoding) = decode_to_utf8(raw);
    log::debug!("decoded HTML as {}", encoding);
    sanitize_str(&text)
}

/// Read `input`, sanitize it and write the result to `output`.
pub fn sanitize(input: &Path, output: &Path) -> Result<(), SanitizeError> {
    let raw = std::fs::read(input)?;
    let html = sanitize_bytes(&raw)?;
    std::fs::write(output, html)?;
    log::debug!("sanitized {} -> {}", input.display(), output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("page.html");
        let output = dir.path().join("page.clean.html");
        std::fs::write(
            &input,
            r#"<!DOCTYPE html><html><head><meta charset="utf-8"><title>Report</title>
            <link rel="stylesheet" href="x.css"></head>
            <body onload="go()"><h2 style="color:red">Summary &amp; notes</h2>
            <ul><li>one</li><li>two</li></ul>
            <table border="1"><tr><td>outer<table><tr><td>inner</td></tr></table></td></tr></table>
            </body></html>"#,
        )
        .unwrap();

        sanitize(&input, &output).unwrap();
        let html = std::fs::read_to_string(&output).unwrap();

        assert!(html.contains("<title>Report</title>"));
        assert!(html.contains("<h2>Summary &amp; notes</h2>"));
        assert!(html.contains("<li>one</li><li>two</li>"));
        assert!(!html.contains("<ul"));
        assert!(!html.contains("onload"));
        assert!(!html.contains("border"));
        assert!(!html.contains("<meta"));
        assert!(!html.contains("DOCTYPE"));
        assert_eq!(html.matches("<table>").count(), 1);
        assert!(html.contains("inner"));
    }

    #[test]
    fn test_legacy_encoding() {
        let raw = b"<html><head><meta charset=\"windows-1252\"></head><body><p>na\xefve</p></body></html>";
        let html = sanitize_bytes(raw).unwrap();
        assert!(html.contains("<p>naïve</p>"));
    }

    #[test]
    fn test_empty_document() {
        assert!(matches!(sanitize_bytes(b"  \n\t "), Err(SanitizeError::Empty)));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = sanitize(&dir.path().join("absent.html"), &dir.path().join("out.html"))
            .unwrap_err();
        assert!(matches!(err, SanitizeError::Io(_)));
    }
}
