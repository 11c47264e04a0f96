//! Shared string helpers.

/// Truncate a string to at most `max_chars` characters, appending "..."
/// if truncated. Safe on multi-byte UTF-8 input because it cuts at
/// character boundaries, never byte indices.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => {
            let truncated = &s[..idx];
            format!("{}...", truncated.trim_end())
        }
        None => s.to_string(),
    }
}
