//! Phone number normalization (messaging-routing boundary)
//!
//! Normalizes user-entered numbers to E.164. German numbers are the common
//! case, so bare national numbers ("0171...") get the +49 country code.

/// Normalize a raw phone number to E.164.
///
/// Returns `None` when the input has no usable digits or is implausibly
/// short/long after cleanup.
pub fn normalize(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let has_plus = trimmed.starts_with('+');
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }

    let normalized = if has_plus {
        format!("+{}", digits)
    } else if let Some(rest) = digits.strip_prefix("00") {
        // International dialing prefix
        format!("+{}", rest)
    } else if let Some(rest) = digits.strip_prefix('0') {
        // Bare national number: default country code
        format!("+49{}", rest)
    } else {
        format!("+{}", digits)
    };

    // E.164: up to 15 digits after the plus
    let digit_count = normalized.len() - 1;
    if !(8..=15).contains(&digit_count) {
        return None;
    }

    Some(normalized)
}

/// Format a number for display. Input already in E.164 is returned
/// unchanged; anything else is normalized first.
pub fn format(number: &str) -> String {
    if is_e164(number) {
        return number.to_string();
    }
    normalize(number).unwrap_or_else(|| number.to_string())
}

fn is_e164(number: &str) -> bool {
    let Some(rest) = number.strip_prefix('+') else {
        return false;
    };
    (8..=15).contains(&rest.len()) && rest.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_national_number() {
        assert_eq!(normalize("0171 2345678"), Some("+491712345678".to_string()));
        assert_eq!(normalize("030/123456"), Some("+4930123456".to_string()));
    }

    #[test]
    fn test_normalize_international() {
        assert_eq!(normalize("+49 171 2345678"), Some("+491712345678".to_string()));
        assert_eq!(normalize("0049 171 2345678"), Some("+491712345678".to_string()));
        assert_eq!(normalize("+1 (415) 555-0100"), Some("+14155550100".to_string()));
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert_eq!(normalize(""), None);
        assert_eq!(normalize("not a number"), None);
        assert_eq!(normalize("12"), None);
    }

    #[test]
    fn test_format_is_identity_on_e164() {
        // For all inputs already in E.164, format returns the same string.
        for number in ["+491712345678", "+14155550100", "+442071838750"] {
            assert_eq!(format(number), number);
        }
    }

    #[test]
    fn test_format_normalizes_other_input() {
        assert_eq!(format("0171 2345678"), "+491712345678");
    }
}
