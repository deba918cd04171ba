//! String utilities for the domain layer.

/// Maximum number of characters kept in a derived session title.
pub const TITLE_MAX_CHARS: usize = 48;

/// Truncate a string to a maximum number of characters with an ellipsis.
///
/// Counts `char`s rather than bytes so multibyte text is never split.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{}…", kept.trim_end())
}

/// Derive a session title from the first user message.
///
/// Collapses internal whitespace (including newlines) so multi-line prompts
/// produce a single-line title. Returns `None` for blank input.
pub fn derive_title(first_message: &str) -> Option<String> {
    let collapsed = first_message.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    Some(truncate_chars(&collapsed, TITLE_MAX_CHARS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_ascii() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello world", 6), "hello…");
    }

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate_chars("日本語テスト", 30), "日本語テスト");
        assert_eq!(truncate_chars("日本語テスト文字列", 5), "日本語テ…");
    }

    #[test]
    fn test_derive_title_collapses_whitespace() {
        assert_eq!(
            derive_title("  How do I\n  reset   my password?  "),
            Some("How do I reset my password?".to_string())
        );
    }

    #[test]
    fn test_derive_title_blank() {
        assert_eq!(derive_title("   \n\t"), None);
    }

    #[test]
    fn test_derive_title_long_message() {
        let title = derive_title(&"word ".repeat(40)).unwrap();
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS);
        assert!(title.ends_with('…'));
    }
}
