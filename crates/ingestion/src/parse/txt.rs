//! Plain text extraction
//!
//! UTF-8 decoding with CRLF/CR normalization. Logical pages of 100 lines;
//! empty files yield zero pages.

use super::ParsedDocument;
use crate::errors::IngestionError;

/// Lines per logical page
const LINES_PER_PAGE: usize = 100;

pub fn parse(bytes: &[u8]) -> Result<ParsedDocument, IngestionError> {
    let text = String::from_utf8_lossy(bytes);
    let normalized = normalize_newlines(&text);

    if normalized.is_empty() {
        return Ok(ParsedDocument::from_pages(
            vec![],
            serde_json::json!({ "lineCount": 0 }),
            "txt",
        ));
    }

    let lines: Vec<&str> = normalized.split('\n').collect();
    let pages: Vec<String> = lines
        .chunks(LINES_PER_PAGE)
        .map(|chunk| chunk.join("\n"))
        .collect();

    let metadata = serde_json::json!({ "lineCount": lines.len() });
    Ok(ParsedDocument::from_pages(pages, metadata, "txt"))
}

fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_yields_zero_pages() {
        let doc = parse(b"").unwrap();
        assert_eq!(doc.page_count, 0);
        assert_eq!(doc.char_count, 0);
    }

    #[test]
    fn test_newline_normalization() {
        let doc = parse(b"one\r\ntwo\rthree\n").unwrap();
        assert_eq!(doc.page_count, 1);
        assert!(!doc.pages[0].content.contains('\r'));
        assert!(doc.pages[0].content.contains("one\ntwo\nthree"));
    }

    #[test]
    fn test_pagination_at_100_lines() {
        let text = (0..250).map(|i| format!("line {}", i)).collect::<Vec<_>>().join("\n");
        let doc = parse(text.as_bytes()).unwrap();
        assert_eq!(doc.page_count, 3);
        assert_eq!(doc.pages[0].content.lines().count(), 100);
        assert_eq!(doc.pages[2].content.lines().count(), 50);
        assert_eq!(doc.metadata["lineCount"], 250);
    }

    #[test]
    fn test_short_file_is_one_page() {
        let doc = parse(b"just one line").unwrap();
        assert_eq!(doc.page_count, 1);
        assert_eq!(doc.word_count, 3);
    }
}
