//! Quality gates and error classification
//!
//! The gates judge whether extraction produced enough text to continue,
//! with page-count-aware thresholds. The classifier maps raw error text to
//! the closed code set by ordered substring match; it is total, defaulting
//! to `parse_failed`.

use crate::parse::ParsedPage;
use docforge_common::errors::ErrorCode;

/// Pages with at most this many characters count as empty
const EMPTY_PAGE_THRESHOLD: usize = 10;

/// Extraction statistics the gates are computed from
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionStats {
    pub total_chars: usize,
    pub page_count: usize,
    pub non_empty_pages: usize,
    pub non_empty_ratio: f64,
    pub avg_chars_per_page: f64,
}

impl ExtractionStats {
    pub fn from_pages(pages: &[ParsedPage]) -> Self {
        let page_count = pages.len();
        let total_chars: usize = pages.iter().map(|p| p.content.chars().count()).sum();
        let non_empty_pages = pages
            .iter()
            .filter(|p| p.content.chars().count() > EMPTY_PAGE_THRESHOLD)
            .count();
        let non_empty_ratio = if page_count == 0 {
            0.0
        } else {
            non_empty_pages as f64 / page_count as f64
        };
        let avg_chars_per_page = if page_count == 0 {
            0.0
        } else {
            total_chars as f64 / page_count as f64
        };

        Self {
            total_chars,
            page_count,
            non_empty_pages,
            non_empty_ratio,
            avg_chars_per_page,
        }
    }
}

/// Gate verdict
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    Pass { warnings: Vec<String> },
    Fail { code: ErrorCode, message: String },
}

impl GateOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, GateOutcome::Pass { .. })
    }
}

/// Apply the quality gates to a normalized page list.
///
/// Hard failures short-circuit; soft issues accumulate and fail the
/// document only when two or more apply.
pub fn evaluate(pages: &[ParsedPage]) -> GateOutcome {
    let stats = ExtractionStats::from_pages(pages);

    if stats.total_chars == 0 {
        return GateOutcome::Fail {
            code: ErrorCode::ExtractionEmpty,
            message: "no text extracted".to_string(),
        };
    }

    if stats.page_count > 1 && stats.total_chars < 100 && stats.non_empty_ratio < 0.3 {
        return GateOutcome::Fail {
            code: ErrorCode::NeedsOcr,
            message: format!(
                "{} of {} pages carry text ({} chars total); document likely needs OCR",
                stats.non_empty_pages, stats.page_count, stats.total_chars
            ),
        };
    }

    let mut issues: Vec<String> = Vec::new();

    let min_total_chars = if stats.page_count == 1 {
        20
    } else {
        50 * stats.page_count
    };
    if stats.total_chars < min_total_chars {
        issues.push(format!(
            "low text volume: {} chars, expected at least {}",
            stats.total_chars, min_total_chars
        ));
    }

    if stats.page_count > 3 && stats.non_empty_ratio < 0.5 {
        issues.push(format!(
            "only {:.0}% of pages carry text",
            stats.non_empty_ratio * 100.0
        ));
    }

    if stats.page_count > 5 && stats.avg_chars_per_page < 20.0 {
        issues.push(format!(
            "average of {:.1} chars per page",
            stats.avg_chars_per_page
        ));
    }

    if issues.len() >= 2 {
        return GateOutcome::Fail {
            code: ErrorCode::ExtractionLowQuality,
            message: issues.join("; "),
        };
    }

    GateOutcome::Pass { warnings: issues }
}

/// Map raw error text to a stable code. Ordered substring match over the
/// lowercased message; every input maps to exactly one code.
pub fn classify_error(message: &str) -> ErrorCode {
    let lower = message.to_lowercase();

    const PATTERNS: &[(&[&str], ErrorCode)] = &[
        (&["rate limit", "429", "too many"], ErrorCode::ProviderRateLimited),
        (&["timeout", "timed out", "aborted"], ErrorCode::Timeout),
        (&["invalid pdf", "corrupt", "bad xref"], ErrorCode::FileCorrupted),
        (
            &["unsupported", "unknown format", "not supported"],
            ErrorCode::UnsupportedFormat,
        ),
        (&["too large", "size limit", "memory"], ErrorCode::FileTooLarge),
    ];

    for (needles, code) in PATTERNS {
        if needles.iter().any(|needle| lower.contains(needle)) {
            return *code;
        }
    }

    ErrorCode::ParseFailed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(contents: &[&str]) -> Vec<ParsedPage> {
        contents
            .iter()
            .enumerate()
            .map(|(i, content)| ParsedPage {
                page_number: (i + 1) as i32,
                content: content.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_empty_extraction_fails() {
        let outcome = evaluate(&pages(&["", ""]));
        assert_eq!(
            outcome,
            GateOutcome::Fail {
                code: ErrorCode::ExtractionEmpty,
                message: "no text extracted".to_string(),
            }
        );

        // Zero pages is the same failure
        assert!(!evaluate(&[]).is_pass());
    }

    #[test]
    fn test_scanned_multipage_needs_ocr() {
        // 5 pages, each <= 5 chars: under 100 total, no page over the
        // empty threshold
        let outcome = evaluate(&pages(&["abc", "de", "f", "gh", "ij"]));
        match outcome {
            GateOutcome::Fail { code, .. } => assert_eq!(code, ErrorCode::NeedsOcr),
            other => panic!("expected needs_ocr, got {:?}", other),
        }
    }

    #[test]
    fn test_healthy_document_passes() {
        let content = "This page has a comfortable amount of extracted text on it.";
        let outcome = evaluate(&pages(&[content, content, content]));
        assert!(outcome.is_pass());
    }

    #[test]
    fn test_single_issue_passes_with_warning() {
        // Single page below the 20-char minimum: one issue only
        let outcome = evaluate(&pages(&["short text."]));
        match outcome {
            GateOutcome::Pass { warnings } => assert_eq!(warnings.len(), 1),
            other => panic!("expected pass with warning, got {:?}", other),
        }
    }

    #[test]
    fn test_two_issues_fail_low_quality() {
        // 6 pages, one decent page, the rest near-empty. Total stays over
        // 100 chars so the OCR gate does not trip, but the volume and
        // ratio issues both apply.
        let full_page = "This single page carries all of the extracted text in the whole \
                         file, and it is long enough to clear the OCR heuristic.";
        let outcome = evaluate(&pages(&[full_page, "x", "x", "x", "x", "x"]));
        match outcome {
            GateOutcome::Fail { code, .. } => {
                assert_eq!(code, ErrorCode::ExtractionLowQuality)
            }
            other => panic!("expected low quality failure, got {:?}", other),
        }
    }

    #[test]
    fn test_gates_are_idempotent() {
        let input = pages(&["some reasonable page content here", "and a second page of it"]);
        assert_eq!(evaluate(&input), evaluate(&input));
    }

    #[test]
    fn test_classifier_patterns_in_order() {
        assert_eq!(
            classify_error("HTTP 429 Too Many Requests"),
            ErrorCode::ProviderRateLimited
        );
        assert_eq!(classify_error("request timed out"), ErrorCode::Timeout);
        assert_eq!(classify_error("operation aborted"), ErrorCode::Timeout);
        assert_eq!(classify_error("Invalid PDF structure"), ErrorCode::FileCorrupted);
        assert_eq!(classify_error("bad xref table"), ErrorCode::FileCorrupted);
        assert_eq!(
            classify_error("unknown format: .xyz"),
            ErrorCode::UnsupportedFormat
        );
        assert_eq!(classify_error("exceeds size limit"), ErrorCode::FileTooLarge);
        assert_eq!(classify_error("out of memory"), ErrorCode::FileTooLarge);
    }

    #[test]
    fn test_classifier_order_matters() {
        // "rate limit" wins over "timeout" because it is checked first
        assert_eq!(
            classify_error("rate limit hit, request timed out"),
            ErrorCode::ProviderRateLimited
        );
    }

    #[test]
    fn test_classifier_is_total() {
        assert_eq!(classify_error(""), ErrorCode::ParseFailed);
        assert_eq!(classify_error("something inexplicable"), ErrorCode::ParseFailed);
        assert_eq!(classify_error("%$#@!"), ErrorCode::ParseFailed);
    }
}
