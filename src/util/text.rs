/// Notion rejects rich text objects longer than this many characters.
pub const NOTION_TEXT_LIMIT: usize = 2000;

/// Truncate to at most `max` characters, never splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
