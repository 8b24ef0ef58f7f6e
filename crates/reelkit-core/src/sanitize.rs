//! Central sanitization for user-origin strings.
//!
//! Every user-supplied string that reaches a prompt, a filename or a
//! pattern must pass through here; call sites never inline their own
//! escaping.

/// Maximum chat message length fed into a prompt.
pub const MAX_MESSAGE_LEN: usize = 4000;

/// Maximum caller-supplied additional context length.
pub const MAX_CONTEXT_LEN: usize = 2000;

/// Maximum length of a single history entry.
pub const MAX_HISTORY_ENTRY_LEN: usize = 2000;

/// Maximum title length.
pub const MAX_TITLE_LEN: usize = 500;

/// Strip control bytes (keeping `\n` and `\t`) and cap at `max_len` chars.
pub fn clean_text(input: &str, max_len: usize) -> String {
    input
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .take(max_len)
        .collect()
}

/// Sanitize a title: trim, strip control bytes, cap length.
pub fn clean_title(input: &str) -> String {
    clean_text(input.trim(), MAX_TITLE_LEN)
}

/// Sanitize a string destined for a filename component. Rejects path
/// separators and traversal rather than escaping them.
pub fn is_safe_file_stem(name: &str) -> bool {
    if name.is_empty() || name.len() > 256 {
        return false;
    }
    if name.contains("..") || name.contains('/') || name.contains('\\') {
        return false;
    }
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}
