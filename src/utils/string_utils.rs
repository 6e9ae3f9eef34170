//! UTF-8-safe string truncation utilities
//!
//! Filename stems are cropped twice: first to a byte budget that must land on
//! a character boundary, then to a character budget. Both crops must never
//! split a multi-byte character.

/// Safely truncate a string to a maximum number of CHARACTERS (not bytes).
///
/// # Examples
/// ```
/// # use kodegen_tools_pagecapture::utils::string_utils::safe_truncate_chars;
/// assert_eq!(safe_truncate_chars("Hello, World!", 5), "Hello");
/// assert_eq!(safe_truncate_chars("日本語テキスト", 3), "日本語");
/// assert_eq!(safe_truncate_chars("Hi", 100), "Hi");
/// ```
#[inline]
pub fn safe_truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        None => s,
        Some((byte_idx, _)) => &s[..byte_idx],
    }
}

/// Safely truncate a string to at most `max_bytes` BYTES.
///
/// The cut moves backwards to the nearest character boundary, so the result
/// may be shorter than `max_bytes` when the limit falls inside a character.
///
/// # Examples
/// ```
/// # use kodegen_tools_pagecapture::utils::string_utils::safe_truncate_bytes;
/// assert_eq!(safe_truncate_bytes("abcdef", 4), "abcd");
/// // "é" is two bytes; a 3-byte budget keeps "a" and the whole "é"
/// assert_eq!(safe_truncate_bytes("aéb", 3), "aé");
/// // a 2-byte budget would split "é", so only "a" survives
/// assert_eq!(safe_truncate_bytes("aéb", 2), "a");
/// ```
pub fn safe_truncate_bytes(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut idx = max_bytes;
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    &s[..idx]
}

/// Insert a zero-width space between consecutive hyphens so that `text` can
/// sit inside an HTML comment without closing it early.
pub fn escape_html_comment(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        out.push(c);
        if c == '-' && chars.peek() == Some(&'-') {
            out.push('\u{200B}');
        }
    }
    out
}

/// Unescape CSS escape sequences (`\26 `, `\"`, ...) in a url() or string token.
pub fn unescape_css(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let mut hex = String::new();
        while hex.len() < 6 {
            match chars.peek() {
                Some(h) if h.is_ascii_hexdigit() => {
                    hex.push(*h);
                    chars.next();
                }
                _ => break,
            }
        }
        if hex.is_empty() {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
            continue;
        }
        // one whitespace terminates a hex escape and is swallowed
        if matches!(chars.peek(), Some(' ' | '\t' | '\n')) {
            chars.next();
        }
        let decoded = u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .unwrap_or('\u{FFFD}');
        out.push(decoded);
    }
    out
}

/// Escape text for a double-quoted CSS string.
pub fn escape_css_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\a "),
            '\r' => out.push_str("\\d "),
            '\0' => out.push('\u{FFFD}'),
            _ => out.push(c),
        }
    }
    out
}
