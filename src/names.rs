//! Sanitization of externally visible table and sheet identifiers.

/// Maximum sheet-name length enforced by the local Excel export.
pub const LOCAL_NAME_MAX: usize = 31;
/// Maximum worksheet-title length used for the remote spreadsheet store.
pub const REMOTE_NAME_MAX: usize = 100;

const INVALID_CHARS: [char; 7] = ['/', '\\', '?', '*', '[', ']', ':'];

/// Cleans a table name for use as a sheet or worksheet title: characters
/// invalid in sheet names become underscores, whitespace runs collapse to a
/// single underscore, and the result is truncated to `max_len` characters.
/// An empty input yields `"sheet"`.
pub fn sanitize_name(raw: &str, max_len: usize) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    let mut in_whitespace = false;

    for ch in raw.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                cleaned.push('_');
                in_whitespace = true;
            }
        } else {
            in_whitespace = false;
            cleaned.push(if INVALID_CHARS.contains(&ch) { '_' } else { ch });
        }
    }

    if cleaned.is_empty() {
        return "sheet".to_string();
    }

    cleaned.chars().take(max_len).collect()
}
