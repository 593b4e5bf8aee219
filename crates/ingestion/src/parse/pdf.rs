//! PDF text extraction
//!
//! Primary extractor: structural per-page extraction with lopdf, operating
//! purely on the in-memory bytes (no font loading, no network fetches).
//! Individual page failures degrade to empty pages and never abort the
//! document.
//!
//! Fallback extractor: layout-based extraction via pdf-extract, used iff
//! the primary run yields zero total characters or fails to load the
//! document. Its output is re-split on form-feed page sentinels.

use super::ParsedDocument;
use crate::errors::IngestionError;
use tracing::{debug, warn};

pub fn parse(bytes: &[u8]) -> Result<ParsedDocument, IngestionError> {
    match structural_extract(bytes) {
        Ok(pages) if pages.iter().any(|p| !p.trim().is_empty()) => {
            let metadata = serde_json::json!({
                "variant": "structural",
                "pageCount": pages.len(),
            });
            Ok(ParsedDocument::from_pages(pages, metadata, "pdf"))
        }
        Ok(pages) => {
            debug!(
                page_count = pages.len(),
                "Structural extraction produced no text, trying layout fallback"
            );
            layout_extract(bytes)
        }
        Err(e) => {
            warn!(error = %e, "Structural extraction failed, trying layout fallback");
            layout_extract(bytes)
        }
    }
}

/// Per-page extraction preserving the document's own page boundaries.
fn structural_extract(bytes: &[u8]) -> Result<Vec<String>, IngestionError> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| IngestionError::ParseError(format!("invalid pdf: {}", e)))?;

    let page_ids: Vec<_> = doc.page_iter().collect();
    debug!(page_count = page_ids.len(), "Extracting text from PDF");

    let mut pages = Vec::with_capacity(page_ids.len());
    for (index, page_id) in page_ids.into_iter().enumerate() {
        match doc.get_page_content(page_id) {
            Ok(content) => pages.push(clean_text(&extract_text_from_content(&content))),
            Err(e) => {
                warn!(page = index + 1, error = %e, "Page extraction failed, degrading to empty page");
                pages.push(String::new());
            }
        }
    }

    Ok(pages)
}

/// Layout-based whole-document extraction; page boundaries come back as
/// form-feed sentinels.
fn layout_extract(bytes: &[u8]) -> Result<ParsedDocument, IngestionError> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| IngestionError::ParseError(format!("invalid pdf: {}", e)))?;

    let pages: Vec<String> = if text.contains('\u{000C}') {
        text.split('\u{000C}').map(clean_text).collect()
    } else {
        vec![clean_text(&text)]
    };

    let metadata = serde_json::json!({
        "variant": "layout",
        "pageCount": pages.len(),
    });
    Ok(ParsedDocument::from_pages(pages, metadata, "pdf"))
}

/// Extract text from a PDF content stream by scanning BT/ET blocks for the
/// text-showing operators (Tj, TJ, ', ").
fn extract_text_from_content(content: &[u8]) -> String {
    let content_str = String::from_utf8_lossy(content);
    let mut text = String::new();
    let mut in_text_block = false;
    let mut current_text = String::new();

    for line in content_str.lines() {
        let trimmed = line.trim();

        if trimmed == "BT" {
            in_text_block = true;
            continue;
        }

        if trimmed == "ET" {
            in_text_block = false;
            if !current_text.is_empty() {
                text.push_str(&current_text);
                text.push(' ');
                current_text.clear();
            }
            continue;
        }

        if in_text_block {
            if let Some(text_content) = extract_text_from_operator(trimmed) {
                current_text.push_str(&text_content);
            }
        }
    }

    text
}

/// Extract text from a PDF text operator line
fn extract_text_from_operator(line: &str) -> Option<String> {
    // Handle (text) Tj operator
    if line.ends_with("Tj") || line.ends_with('\'') || line.ends_with('"') {
        if let Some(start) = line.find('(') {
            if let Some(end) = line.rfind(')') {
                let text = &line[start + 1..end];
                return Some(decode_pdf_string(text));
            }
        }
    }

    // Handle [(text) num (text) num] TJ operator (array of text)
    if line.ends_with("TJ") {
        let mut result = String::new();
        let mut in_paren = false;
        let mut current = String::new();

        for ch in line.chars() {
            match ch {
                '(' => {
                    in_paren = true;
                }
                ')' => {
                    in_paren = false;
                    result.push_str(&decode_pdf_string(&current));
                    current.clear();
                }
                _ if in_paren => {
                    current.push(ch);
                }
                _ => {}
            }
        }

        if !result.is_empty() {
            return Some(result);
        }
    }

    None
}

/// Decode PDF string escapes
fn decode_pdf_string(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some('\\') => result.push('\\'),
                Some('(') => result.push('('),
                Some(')') => result.push(')'),
                Some(c) => result.push(c),
                None => {}
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Collapse runs of whitespace and strip BOM artifacts
fn clean_text(text: &str) -> String {
    text.replace('\u{FEFF}', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text() {
        let input = "Hello   World\n\nTest";
        assert_eq!(clean_text(input), "Hello World Test");
    }

    #[test]
    fn test_decode_pdf_string() {
        assert_eq!(decode_pdf_string("Hello\\nWorld"), "Hello\nWorld");
        assert_eq!(decode_pdf_string("Test\\(paren\\)"), "Test(paren)");
    }

    #[test]
    fn test_extract_tj_operator() {
        assert_eq!(
            extract_text_from_operator("(Hello World) Tj"),
            Some("Hello World".to_string())
        );
        assert_eq!(
            extract_text_from_operator("[(Hel) -20 (lo)] TJ"),
            Some("Hello".to_string())
        );
        assert_eq!(extract_text_from_operator("1 0 0 1 50 700 Tm"), None);
    }

    #[test]
    fn test_extract_content_stream() {
        let content = b"BT\n(First line) Tj\nET\nBT\n(Second) Tj\nET\n";
        let text = extract_text_from_content(content);
        assert!(text.contains("First line"));
        assert!(text.contains("Second"));
    }

    #[test]
    fn test_garbage_bytes_are_parse_error() {
        let result = parse(b"this is not a pdf at all");
        assert!(result.is_err());
        let message = result.err().unwrap().to_string();
        assert!(message.to_lowercase().contains("pdf"));
    }
}
