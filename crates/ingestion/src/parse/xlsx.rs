//! XLSX/XLS extraction
//!
//! Each sheet becomes one logical page prefixed with `[Sheet: <name>]`:
//! header row plus up to 5 000 data rows rendered as
//! `Header: value | Header: value | ...`. Empty or header-only sheets are
//! skipped. Dates are rendered as dates; formula cells render their cached
//! values.

use super::ParsedDocument;
use crate::errors::IngestionError;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;

/// Data rows per sheet; the rest is dropped and recorded per sheet
const MAX_ROWS_PER_SHEET: usize = 5_000;

pub fn parse(bytes: &[u8]) -> Result<ParsedDocument, IngestionError> {
    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook = open_workbook_auto_from_rs(cursor)
        .map_err(|e| IngestionError::ParseError(format!("invalid workbook: {}", e)))?;

    let sheet_names = workbook.sheet_names().to_owned();
    let mut pages: Vec<String> = Vec::new();
    let mut truncated_sheets: Vec<String> = Vec::new();

    for name in &sheet_names {
        let range = match workbook.worksheet_range(name) {
            Ok(range) => range,
            Err(e) => {
                return Err(IngestionError::ParseError(format!(
                    "failed to read sheet {}: {}",
                    name, e
                )))
            }
        };

        let mut rows = range.rows();
        let Some(header_row) = rows.next() else {
            continue; // empty sheet
        };
        let headers: Vec<String> = header_row.iter().map(render_cell).collect();

        let mut lines: Vec<String> = Vec::new();
        for row in rows {
            if lines.len() >= MAX_ROWS_PER_SHEET {
                truncated_sheets.push(name.clone());
                break;
            }
            let line = format_row(&headers, row);
            if !line.is_empty() {
                lines.push(line);
            }
        }

        if lines.is_empty() {
            continue; // header-only sheet
        }

        pages.push(format!("[Sheet: {}]\n{}", name, lines.join("\n")));
    }

    let metadata = serde_json::json!({
        "sheetCount": sheet_names.len(),
        "processedSheets": pages.len(),
        "truncatedSheets": truncated_sheets,
    });

    Ok(ParsedDocument::from_pages(pages, metadata, "xlsx"))
}

fn format_row(headers: &[String], row: &[Data]) -> String {
    let mut fields = Vec::with_capacity(headers.len());
    for (i, header) in headers.iter().enumerate() {
        let value = row.get(i).map(render_cell).unwrap_or_default();
        if value.is_empty() || header.is_empty() {
            continue;
        }
        fields.push(format!("{}: {}", header, value));
    }
    fields.join(" | ")
}

fn render_cell(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => {
            // Render whole floats without the trailing ".0" Excel hides
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) => naive.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => dt.as_f64().to_string(),
        },
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_cells() {
        assert_eq!(render_cell(&Data::String("  hello ".into())), "hello");
        assert_eq!(render_cell(&Data::Float(42.0)), "42");
        assert_eq!(render_cell(&Data::Float(1.5)), "1.5");
        assert_eq!(render_cell(&Data::Int(7)), "7");
        assert_eq!(render_cell(&Data::Bool(true)), "true");
        assert_eq!(render_cell(&Data::Empty), "");
    }

    #[test]
    fn test_format_row_omits_empty_fields() {
        let headers = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let row = vec![
            Data::String("one".into()),
            Data::Empty,
            Data::Int(3),
        ];
        assert_eq!(format_row(&headers, &row), "a: one | c: 3");
    }

    #[test]
    fn test_garbage_bytes_are_parse_error() {
        assert!(parse(b"definitely not a spreadsheet").is_err());
    }
}
