//! HTML extraction
//!
//! Boilerplate (scripts, chrome, forms, ARIA landmark regions) is stripped
//! before text extraction. Content is taken from `<main>`, `<article>`, or
//! `[role=main]` when present, falling back to `<body>`. Whitespace is
//! normalized while preserving paragraph breaks; logical pages of ~5 000
//! characters prefer a paragraph boundary when one falls in the final 30%
//! of a page.

use super::ParsedDocument;
use crate::errors::IngestionError;
use scraper::{ElementRef, Html, Selector};

/// Target characters per logical page
const PAGE_SIZE: usize = 5_000;

/// A paragraph boundary is preferred when it lies in this final fraction
/// of a page
const BOUNDARY_WINDOW: f64 = 0.3;

const EXCLUDED_TAGS: &[&str] = &[
    "script", "style", "noscript", "iframe", "svg", "nav", "footer", "header", "aside", "form",
    "input", "button",
];

const EXCLUDED_ROLES: &[&str] = &["banner", "navigation", "contentinfo"];

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "main", "h1", "h2", "h3", "h4", "h5", "h6", "li", "ul",
    "ol", "table", "tr", "blockquote", "pre",
];

pub fn parse(bytes: &[u8]) -> Result<ParsedDocument, IngestionError> {
    let html = String::from_utf8_lossy(bytes);
    let document = Html::parse_document(&html);

    let title = extract_title(&document);

    let root = content_root(&document);
    let mut raw = String::new();
    if let Some(root) = root {
        collect_text(root, &mut raw);
    }

    let text = normalize_whitespace(&raw);
    let pages = paginate(&text);

    let metadata = serde_json::json!({
        "title": title,
        "pageCount": pages.len(),
    });

    Ok(ParsedDocument::from_pages(pages, metadata, "html"))
}

/// Prefer the page's main content region over the full body.
fn content_root(document: &Html) -> Option<ElementRef<'_>> {
    for selector in ["main", "article", "*[role=\"main\"]", "body"] {
        let selector = Selector::parse(selector).ok()?;
        if let Some(element) = document.select(&selector).next() {
            return Some(element);
        }
    }
    Some(document.root_element())
}

fn extract_title(document: &Html) -> Option<String> {
    for selector in ["title", "h1"] {
        let selector = Selector::parse(selector).ok()?;
        if let Some(element) = document.select(&selector).next() {
            let text: String = element.text().collect::<Vec<_>>().join(" ");
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            continue;
        }

        let Some(child_element) = ElementRef::wrap(child) else {
            continue;
        };
        let tag = child_element.value().name();

        if EXCLUDED_TAGS.contains(&tag) {
            continue;
        }
        if let Some(role) = child_element.value().attr("role") {
            if EXCLUDED_ROLES.contains(&role) {
                continue;
            }
        }

        if tag == "br" {
            out.push('\n');
            continue;
        }

        let is_block = BLOCK_TAGS.contains(&tag);
        if is_block {
            out.push_str("\n\n");
        }
        collect_text(child_element, out);
        if is_block {
            out.push_str("\n\n");
        }
    }
}

/// Collapse horizontal whitespace per line and runs of blank lines to one
/// (a single paragraph break).
fn normalize_whitespace(raw: &str) -> String {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();

    for line in raw.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&collapsed);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }

    paragraphs.join("\n\n")
}

/// Split normalized text into ~PAGE_SIZE-character pages with an explicit
/// two-pointer scan. A page ends at the last paragraph boundary inside its
/// window when that boundary lies in the window's final 30%; otherwise it
/// ends at the hard size limit.
fn paginate(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let mut pages = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let window_end = (start + PAGE_SIZE).min(chars.len());
        let mut cut = window_end;

        if window_end < chars.len() {
            let earliest = start + ((PAGE_SIZE as f64) * (1.0 - BOUNDARY_WINDOW)) as usize;
            if let Some(boundary) = last_paragraph_break(&chars, earliest, window_end) {
                cut = boundary;
            }
        }

        let page: String = chars[start..cut].iter().collect();
        let page = page.trim().to_string();
        if !page.is_empty() {
            pages.push(page);
        }
        start = cut;
    }

    pages
}

/// Position just past the last "\n\n" in `chars[from..to]`, if any.
fn last_paragraph_break(chars: &[char], from: usize, to: usize) -> Option<usize> {
    if from + 1 >= to {
        return None;
    }
    let mut i = to - 1;
    while i > from {
        if chars[i] == '\n' && chars[i - 1] == '\n' {
            return Some(i + 1);
        }
        i -= 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_boilerplate() {
        let html = br#"<html><head><title>Docs</title><script>var x=1;</script>
            <style>body{}</style></head>
            <body><nav>menu items</nav>
            <div role="banner">top banner</div>
            <main><p>Real content here.</p><p>More content.</p></main>
            <footer>copyright</footer></body></html>"#;
        let doc = parse(html).unwrap();
        let text = &doc.pages[0].content;
        assert!(text.contains("Real content here."));
        assert!(text.contains("More content."));
        assert!(!text.contains("menu items"));
        assert!(!text.contains("top banner"));
        assert!(!text.contains("copyright"));
        assert!(!text.contains("var x"));
    }

    #[test]
    fn test_prefers_main_over_body() {
        let html = b"<body><div>outside</div><main><p>inside</p></main></body>";
        let doc = parse(html).unwrap();
        assert!(doc.pages[0].content.contains("inside"));
        assert!(!doc.pages[0].content.contains("outside"));
    }

    #[test]
    fn test_title_from_title_tag_then_h1() {
        let doc = parse(b"<html><head><title>The Title</title></head><body><p>x</p></body></html>")
            .unwrap();
        assert_eq!(doc.metadata["title"], "The Title");

        let doc = parse(b"<body><h1>Heading Title</h1><p>x</p></body>").unwrap();
        assert_eq!(doc.metadata["title"], "Heading Title");
    }

    #[test]
    fn test_whitespace_normalization_preserves_paragraphs() {
        let html = b"<body><p>one   two</p><p>three</p></body>";
        let doc = parse(html).unwrap();
        assert_eq!(doc.pages[0].content, "one two\n\nthree");
    }

    #[test]
    fn test_pagination_prefers_paragraph_boundary() {
        // Paragraphs of ~400 chars; the 5000-char window ends mid-paragraph,
        // and a boundary falls in the final 30% of the window.
        let paragraph = "word ".repeat(80);
        let html = format!(
            "<body>{}</body>",
            (0..40)
                .map(|_| format!("<p>{}</p>", paragraph.trim()))
                .collect::<String>()
        );
        let doc = parse(html.as_bytes()).unwrap();
        assert!(doc.page_count > 1);
        for page in &doc.pages {
            assert!(page.content.chars().count() <= PAGE_SIZE);
            // Pages end on whole paragraphs
            assert!(page.content.ends_with("word"));
        }
    }

    #[test]
    fn test_empty_html_yields_zero_pages() {
        let doc = parse(b"<html><body></body></html>").unwrap();
        assert_eq!(doc.page_count, 0);
    }
}
