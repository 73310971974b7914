//! Plate text cleanup and length validation

use crate::config::NormalizeParams;

/// Clean `text` with the default 6-12 character bounds
pub fn clean_plate_text(text: &str) -> String {
    clean_with(text, NormalizeParams::default())
}

/// Uppercase, drop everything but `A-Z`, `0-9` and separators, collapse
/// whitespace runs to a single space and trim. Returns an empty string when
/// the result falls outside `params` length bounds.
pub fn clean_with(text: &str, params: NormalizeParams) -> String {
    if text.is_empty() {
        return String::new();
    }

    let upper = text.to_uppercase();
    let kept: String = upper
        .chars()
        .filter_map(|c| {
            if is_separator(c) {
                Some(' ')
            } else if c.is_ascii_uppercase() || c.is_ascii_digit() {
                Some(c)
            } else {
                None
            }
        })
        .collect();
    let cleaned = kept.split_whitespace().collect::<Vec<_>>().join(" ");

    let len = cleaned.chars().count();
    if len >= params.min_len && len <= params.max_len {
        cleaned
    } else {
        String::new()
    }
}

/// Unicode whitespace plus the ASCII information separators (U+001C to
/// U+001F), which regex `\s` classes also treat as spaces
fn is_separator(c: char) -> bool {
    c.is_whitespace() || ('\u{1c}'..='\u{1f}').contains(&c)
}
