use chrono::{DateTime, Utc};

/// Formats a sale timestamp as "dd-mm-yyyy HH:MM" (UTC).
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%d-%m-%Y %H:%M").to_string()
}

pub fn format_price(price: f64) -> String {
    format!("${:.2}", price)
}

/// Helper function to escape special characters for Markdown
///
/// Every character with a meaning in Telegram's MarkdownV2 syntax is prefixed
/// with a backslash so it renders literally.
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if "\\_*[]()~`>#+-=|{}.!".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Splits a `;`-separated command payload into exactly `expected` trimmed fields.
///
/// Returns `None` when the count does not match, so callers can reply with usage help.
pub fn parse_fields(payload: &str, expected: usize) -> Option<Vec<String>> {
    let fields: Vec<String> = payload.split(';').map(|f| f.trim().to_string()).collect();
    (fields.len() == expected).then_some(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_values() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
        assert_eq!(format_timestamp(at), "09-03-2024 14:05");
        assert_eq!(format_price(2.5), "$2.50");
    }

    #[test]
    fn escapes_markdown_specials() {
        assert_eq!(escape_markdown("Vitamin C (500mg)."), "Vitamin C \\(500mg\\)\\.");
        assert_eq!(escape_markdown("plain"), "plain");
    }

    #[test]
    fn parses_semicolon_fields() {
        assert_eq!(
            parse_fields(" Jane ; 12 Nile St;555 ", 3),
            Some(vec!["Jane".to_string(), "12 Nile St".to_string(), "555".to_string()])
        );
        assert_eq!(parse_fields("Jane; 12 Nile St", 3), None);
    }
}
