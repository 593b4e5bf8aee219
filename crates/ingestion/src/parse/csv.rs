//! CSV extraction
//!
//! Header-row parsing; each data row becomes one line of
//! `Header: value | Header: value | ...`, omitting empty fields. Logical
//! pages of 100 rows, hard cap of 10 000 rows. Row-level parse errors are
//! collected into metadata and do not abort the document.

use super::ParsedDocument;
use crate::errors::IngestionError;
use tracing::warn;

/// Rows per logical page
const ROWS_PER_PAGE: usize = 100;

/// Hard cap; rows past this are dropped and reported via `truncated`
const MAX_ROWS: usize = 10_000;

pub fn parse(bytes: &[u8]) -> Result<ParsedDocument, IngestionError> {
    let mut reader = ::csv::ReaderBuilder::new()
        .flexible(true)
        .trim(::csv::Trim::All)
        .from_reader(bytes);

    let headers: Vec<String> = match reader.headers() {
        Ok(headers) => headers.iter().map(String::from).collect(),
        Err(e) => return Err(IngestionError::ParseError(format!("invalid csv header: {}", e))),
    };

    let mut rows: Vec<String> = Vec::new();
    let mut errors: Vec<String> = Vec::new();
    let mut truncated = false;
    let mut total_rows = 0usize;

    for record in reader.records() {
        match record {
            Ok(record) => {
                total_rows += 1;
                if rows.len() >= MAX_ROWS {
                    truncated = true;
                    continue;
                }
                rows.push(format_row(&headers, &record));
            }
            Err(e) => {
                warn!(error = %e, "Skipping malformed CSV row");
                errors.push(e.to_string());
            }
        }
    }

    let pages: Vec<String> = rows
        .chunks(ROWS_PER_PAGE)
        .map(|chunk| chunk.join("\n"))
        .collect();

    let metadata = serde_json::json!({
        "rowCount": total_rows.min(MAX_ROWS),
        "columnCount": headers.len(),
        "truncated": truncated,
        "errors": errors,
    });

    Ok(ParsedDocument::from_pages(pages, metadata, "csv"))
}

fn format_row(headers: &[String], record: &::csv::StringRecord) -> String {
    let mut fields = Vec::with_capacity(headers.len());
    for (i, header) in headers.iter().enumerate() {
        let value = record.get(i).unwrap_or("").trim();
        if value.is_empty() {
            continue;
        }
        fields.push(format!("{}: {}", header, value));
    }
    fields.join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_pagination() {
        let mut csv = String::from("name,role,city,notes\n");
        for i in 0..250 {
            csv.push_str(&format!("person{},dev,berlin,note {}\n", i, i));
        }
        let doc = parse(csv.as_bytes()).unwrap();
        assert_eq!(doc.page_count, 3);
        assert_eq!(doc.pages[0].content.lines().count(), 100);
        assert_eq!(doc.pages[2].content.lines().count(), 50);
        assert_eq!(doc.metadata["rowCount"], 250);
        assert_eq!(doc.metadata["truncated"], false);
    }

    #[test]
    fn test_row_formatting_omits_empty_fields() {
        let csv = "name,role,city\nalice,,berlin\n";
        let doc = parse(csv.as_bytes()).unwrap();
        assert_eq!(doc.pages[0].content, "name: alice | city: berlin");
    }

    #[test]
    fn test_row_cap_sets_truncated() {
        let mut csv = String::from("n\n");
        for i in 0..10_050 {
            csv.push_str(&format!("{}\n", i));
        }
        let doc = parse(csv.as_bytes()).unwrap();
        assert_eq!(doc.metadata["truncated"], true);
        assert_eq!(doc.metadata["rowCount"], 10_000);
        assert_eq!(doc.page_count, 100);
    }

    #[test]
    fn test_header_only_yields_zero_pages() {
        let doc = parse(b"a,b,c\n").unwrap();
        assert_eq!(doc.page_count, 0);
    }
}
