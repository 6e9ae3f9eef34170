//! Text decoding for fetched documents and stylesheets
//!
//! Encodings are resolved through `encoding_rs` labels. Stylesheets of an
//! unknown encoding are handled as byte strings, one char per byte, which
//! round-trips the original bytes exactly through [`byte_string_to_bytes`].

use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE, WINDOWS_1252};
use once_cell::sync::Lazy;
use regex::bytes::Regex;

/// How far into a document a `<meta>` charset declaration is looked for
const META_PRESCAN_LIMIT: usize = 1024;

static META_CHARSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta\s[^>]*?charset\s*=\s*["']?\s*([a-z0-9_:.\-]+)"#)
        .unwrap_or_else(|e| panic!("invalid meta charset pattern: {e}"))
});

/// Encoding for a charset label from a header, `@charset` rule or `<meta>`.
#[must_use]
pub fn encoding_for_label(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
}

/// Detect a byte order mark, returning the encoding and the BOM length.
#[must_use]
pub fn sniff_bom(bytes: &[u8]) -> Option<(&'static Encoding, usize)> {
    Encoding::for_bom(bytes)
}

/// Decode `bytes`, dropping a leading BOM of the same encoding.
#[must_use]
pub fn decode(bytes: &[u8], encoding: &'static Encoding) -> String {
    encoding.decode_with_bom_removal(bytes).0.into_owned()
}

/// Charset declared by a `<meta charset>` or `<meta http-equiv>` element
/// near the start of a document.
#[must_use]
pub fn sniff_meta_charset(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = &bytes[..bytes.len().min(META_PRESCAN_LIMIT)];
    let label = META_CHARSET.captures(head)?.get(1)?;
    let encoding = Encoding::for_label(label.as_bytes())?;
    // a UTF-16 declaration in an ASCII-compatible prefix is wrong by construction
    if encoding == UTF_16BE || encoding == UTF_16LE {
        return Some(UTF_8);
    }
    if encoding.name() == "x-user-defined" {
        return Some(WINDOWS_1252);
    }
    Some(encoding)
}

/// Map every byte to the char with the same code point.
#[must_use]
pub fn bytes_to_byte_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Inverse of [`bytes_to_byte_string`].
///
/// Chars above U+00FF can only come from text inserted during rewriting
/// (localized URLs); they are written as UTF-8.
#[must_use]
pub fn byte_string_to_bytes(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        match u8::try_from(u32::from(c)) {
            Ok(b) => out.push(b),
            Err(_) => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out
}

/// Decode an HTML body: BOM, else header charset, else `<meta>`
/// declaration, else UTF-8.
#[must_use]
pub fn decode_document(bytes: &[u8], header_charset: Option<&str>) -> String {
    if let Some((encoding, len)) = sniff_bom(bytes) {
        return encoding.decode_without_bom_handling(&bytes[len..]).0.into_owned();
    }
    let encoding = header_charset
        .and_then(encoding_for_label)
        .or_else(|| sniff_meta_charset(bytes))
        .unwrap_or(UTF_8);
    decode(bytes, encoding)
}
