//! Parser router and normalized output model
//!
//! Dispatch is a MIME -> parser table with a secondary source-type ->
//! canonical-MIME table. Adding a format adds one entry to each. Every
//! parser normalizes its output to the same page-oriented model so
//! chunking provenance is uniform across formats.

pub mod csv;
pub mod docx;
pub mod html;
pub mod pdf;
pub mod txt;
pub mod xlsx;

use crate::errors::IngestionError;
use docforge_common::db::models::SourceType;
use serde_json::Value;

/// One extracted page. Page numbers are 1-based and contiguous; formats
/// without native paging synthesize logical pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPage {
    pub page_number: i32,
    pub content: String,
}

/// Normalized parser output
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub pages: Vec<ParsedPage>,
    pub page_count: usize,
    pub char_count: usize,
    pub word_count: usize,

    /// Opaque per-format metadata (title, truncated, warnings, ...)
    pub metadata: Value,

    /// Which parser produced this document
    pub parser: &'static str,
}

impl ParsedDocument {
    /// Assemble a document from raw page texts, assigning contiguous page
    /// numbers and computing totals. Empty input yields zero pages and zero
    /// counts; that is not an error at this layer.
    pub fn from_pages(page_texts: Vec<String>, metadata: Value, parser: &'static str) -> Self {
        let pages: Vec<ParsedPage> = page_texts
            .into_iter()
            .enumerate()
            .map(|(i, content)| ParsedPage {
                page_number: (i + 1) as i32,
                content,
            })
            .collect();

        let char_count = pages.iter().map(|p| p.content.chars().count()).sum();
        let word_count = pages
            .iter()
            .map(|p| p.content.split_whitespace().count())
            .sum();

        Self {
            page_count: pages.len(),
            char_count,
            word_count,
            pages,
            metadata,
            parser,
        }
    }
}

/// A format-specific extractor
pub type ParserFn = fn(&[u8]) -> Result<ParsedDocument, IngestionError>;

/// MIME -> parser dispatch table
pub fn parser_for_mime(mime: &str) -> Option<ParserFn> {
    let parser: ParserFn = match mime {
        "application/pdf" => pdf::parse,
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        | "application/msword" => docx::parse,
        "text/plain" => txt::parse,
        "text/csv" | "application/csv" => csv::parse,
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        | "application/vnd.ms-excel" => xlsx::parse,
        "text/html" | "application/xhtml+xml" => html::parse,
        _ => return None,
    };
    Some(parser)
}

/// Source-type -> canonical MIME table, used when the declared MIME has no
/// parser entry
pub fn canonical_mime(source_type: SourceType) -> &'static str {
    match source_type {
        SourceType::Pdf => "application/pdf",
        SourceType::Docx => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        SourceType::Txt => "text/plain",
        SourceType::Csv => "text/csv",
        SourceType::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        SourceType::Html => "text/html",
    }
}

/// Resolve a parser: declared MIME first (parameters stripped), then the
/// source type's canonical MIME.
pub fn route(mime: &str, source_type: SourceType) -> Option<ParserFn> {
    let bare_mime = mime.split(';').next().unwrap_or(mime).trim();
    parser_for_mime(bare_mime).or_else(|| parser_for_mime(canonical_mime(source_type)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pages_counts() {
        let doc = ParsedDocument::from_pages(
            vec!["one two three".to_string(), "four five".to_string()],
            serde_json::json!({}),
            "test",
        );
        assert_eq!(doc.page_count, 2);
        assert_eq!(doc.word_count, 5);
        assert_eq!(doc.char_count, 13 + 9);
        assert_eq!(doc.pages[0].page_number, 1);
        assert_eq!(doc.pages[1].page_number, 2);
    }

    #[test]
    fn test_empty_document_is_not_an_error() {
        let doc = ParsedDocument::from_pages(vec![], serde_json::json!({}), "test");
        assert_eq!(doc.page_count, 0);
        assert_eq!(doc.char_count, 0);
        assert_eq!(doc.word_count, 0);
    }

    #[test]
    fn test_mime_dispatch() {
        assert!(parser_for_mime("application/pdf").is_some());
        assert!(parser_for_mime("text/csv").is_some());
        assert!(parser_for_mime("application/octet-stream").is_none());
    }

    #[test]
    fn test_route_falls_back_to_source_type() {
        // Unknown declared MIME, but the source type resolves
        assert!(route("application/octet-stream", SourceType::Pdf).is_some());
        // MIME parameters are stripped before lookup
        assert!(route("text/html; charset=utf-8", SourceType::Html).is_some());
    }
}
