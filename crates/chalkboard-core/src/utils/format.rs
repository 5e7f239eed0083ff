/// Truncate a string to a maximum number of characters, adding an ellipsis
/// if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format a date string to a more readable format
pub fn format_date(date: &str) -> String {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(date) {
        dt.format("%b %d, %Y").to_string()
    } else if date.len() >= 10 && date.is_char_boundary(10) {
        // YYYY-MM-DD prefix
        date[..10].to_string()
    } else {
        date.to_string()
    }
}

/// Case-insensitive substring test
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
        assert_eq!(truncate_string("Olá, mundo", 6), "Olá...");
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date("2025-07-16T12:00:00Z"), "Jul 16, 2025");
        assert_eq!(format_date("2025-07-16 garbage"), "2025-07-16");
        assert_eq!(format_date("soon"), "soon");
    }

    #[test]
    fn test_contains_ignore_case() {
        assert!(contains_ignore_case("Rust Ownership", "ownership"));
        assert!(!contains_ignore_case("Rust", "go"));
    }
}
