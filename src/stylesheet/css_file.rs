//! Downloaded stylesheet handling
//!
//! A stylesheet's charset is taken from, in order: the `Content-Type`
//! header, a byte order mark, an `@charset` rule. Sheets with a known
//! charset are rewritten and stored as UTF-8; a sheet that declared its
//! charset only through `@charset` gets a UTF-8 BOM so the stale rule is
//! ignored on replay. Sheets of unknown charset are processed as byte
//! strings and written back byte for byte, leaving the encoding for the
//! reader to fix.

use super::CssLocalizer;
use crate::utils::encoding::{
    byte_string_to_bytes, bytes_to_byte_string, decode, encoding_for_label, sniff_bom,
};

/// Charset label of a leading `@charset "...";` rule
fn charset_rule(bytes: &[u8]) -> Option<&str> {
    let rest = bytes.strip_prefix(b"@charset ")?;
    let (&quote, rest) = rest.split_first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let end = rest.iter().position(|&b| b == quote)?;
    let label = &rest[..end];
    let well_formed = !label.is_empty()
        && label
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-'))
        && rest.get(end + 1) == Some(&b';');
    well_formed.then(|| std::str::from_utf8(label).ok()).flatten()
}

/// Decode, localize and re-encode a stylesheet.
///
/// Returns the bytes to store and their MIME type.
pub async fn process_css_file(
    bytes: Vec<u8>,
    header_charset: Option<&str>,
    ref_url: &str,
    localizer: &CssLocalizer<'_>,
) -> (Vec<u8>, String) {
    let decoded = if let Some(encoding) = header_charset.and_then(encoding_for_label) {
        Some(decode(&bytes, encoding))
    } else if let Some((encoding, _)) = sniff_bom(&bytes) {
        Some(decode(&bytes, encoding))
    } else {
        charset_rule(&bytes)
            .and_then(encoding_for_label)
            .map(|encoding| format!("\u{FEFF}{}", decode(&bytes, encoding)))
    };

    match decoded {
        Some(text) => {
            let rewritten = localizer.localize(&text, ref_url).await;
            (rewritten.into_bytes(), "text/css;charset=UTF-8".to_string())
        }
        None => {
            if let Some(label) = header_charset {
                log::debug!("Unsupported stylesheet charset '{label}' for {ref_url}, keeping bytes");
            }
            let text = bytes_to_byte_string(&bytes);
            let rewritten = localizer.localize(&text, ref_url).await;
            (byte_string_to_bytes(&rewritten), "text/css".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charset_rule_detection() {
        assert_eq!(charset_rule(b"@charset \"UTF-8\"; p{}"), Some("UTF-8"));
        assert_eq!(charset_rule(b"@charset 'latin1';"), Some("latin1"));
        assert_eq!(charset_rule(b"@charset \"UTF-8'; p{}"), None);
        assert_eq!(charset_rule(b" @charset \"UTF-8\";"), None);
        assert_eq!(charset_rule(b"p{}"), None);
    }
}
