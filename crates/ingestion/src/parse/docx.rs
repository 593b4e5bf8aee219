//! DOCX/DOC extraction
//!
//! Raw text extraction that discards formatting. The format has no hard
//! page boundaries, so logical pages of 50 paragraphs are synthesized;
//! short documents collapse to one page. Engine warnings (skipped
//! constructs) are preserved in metadata.

use super::ParsedDocument;
use crate::errors::IngestionError;
use docx_rs::{DocumentChild, ParagraphChild, RunChild};

/// Paragraphs per logical page
const PARAGRAPHS_PER_PAGE: usize = 50;

pub fn parse(bytes: &[u8]) -> Result<ParsedDocument, IngestionError> {
    let docx = docx_rs::read_docx(bytes)
        .map_err(|e| IngestionError::ParseError(format!("invalid docx: {:?}", e)))?;

    let mut paragraphs: Vec<String> = Vec::new();
    let mut skipped_tables = 0usize;

    for child in &docx.document.children {
        match child {
            DocumentChild::Paragraph(paragraph) => {
                let text = paragraph_text(&paragraph.children);
                if !text.trim().is_empty() {
                    paragraphs.push(text.trim().to_string());
                }
            }
            DocumentChild::Table(_) => skipped_tables += 1,
            _ => {}
        }
    }

    let mut warnings: Vec<String> = Vec::new();
    if skipped_tables > 0 {
        warnings.push(format!("{} table(s) skipped", skipped_tables));
    }

    let pages: Vec<String> = paragraphs
        .chunks(PARAGRAPHS_PER_PAGE)
        .map(|chunk| chunk.join("\n\n"))
        .collect();

    let metadata = serde_json::json!({
        "paragraphCount": paragraphs.len(),
        "warnings": warnings,
    });

    Ok(ParsedDocument::from_pages(pages, metadata, "docx"))
}

fn paragraph_text(children: &[ParagraphChild]) -> String {
    let mut text = String::new();
    for child in children {
        match child {
            ParagraphChild::Run(run) => {
                for run_child in &run.children {
                    match run_child {
                        RunChild::Text(t) => text.push_str(&t.text),
                        RunChild::Tab(_) => text.push('\t'),
                        RunChild::Break(_) => text.push('\n'),
                        _ => {}
                    }
                }
            }
            ParagraphChild::Hyperlink(link) => {
                text.push_str(&paragraph_text(&link.children));
            }
            _ => {}
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use docx_rs::{Docx, Paragraph, Run};

    fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
        let mut docx = Docx::new();
        for text in paragraphs {
            docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(*text)));
        }
        let mut buf = std::io::Cursor::new(Vec::new());
        docx.build().pack(&mut buf).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_short_document_collapses_to_one_page() {
        let bytes = docx_bytes(&["First paragraph.", "Second paragraph."]);
        let doc = parse(&bytes).unwrap();
        assert_eq!(doc.page_count, 1);
        assert!(doc.pages[0].content.contains("First paragraph."));
        assert!(doc.pages[0].content.contains("\n\n"));
        assert_eq!(doc.metadata["paragraphCount"], 2);
    }

    #[test]
    fn test_pagination_at_50_paragraphs() {
        let texts: Vec<String> = (0..120).map(|i| format!("Paragraph number {}.", i)).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let bytes = docx_bytes(&refs);
        let doc = parse(&bytes).unwrap();
        assert_eq!(doc.page_count, 3);
    }

    #[test]
    fn test_garbage_bytes_are_parse_error() {
        assert!(parse(b"not a zip archive").is_err());
    }

    #[test]
    fn test_empty_document_yields_zero_pages() {
        let bytes = docx_bytes(&[]);
        let doc = parse(&bytes).unwrap();
        assert_eq!(doc.page_count, 0);
    }
}
