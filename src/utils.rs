//! Small string helpers shared by the store and the title generator

use regex::Regex;

lazy_static::lazy_static! {
    static ref UNSAFE_FILENAME_CHARS: Regex = Regex::new(r"[^\w\s-]").expect("static regex");
}

/// Truncate a string to max_chars characters (not bytes)
///
/// # Examples
/// ```
/// use skatteret_assistant::utils::truncate_str;
///
/// assert_eq!(truncate_str("skattepligt", 5), "skatt");
/// assert_eq!(truncate_str("æøå", 2), "æø");
/// ```
#[inline]
pub fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

/// Turn a conversation title into a filename stem.
///
/// Drops every character that is not a word character, whitespace or `-`,
/// then replaces spaces with underscores. Other whitespace is kept as-is.
pub fn sanitize_title(title: &str) -> String {
    UNSAFE_FILENAME_CHARS.replace_all(title, "").replace(' ', "_")
}
