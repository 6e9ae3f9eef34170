//! Filesystem-safe file names for archive members

use sanitize_filename::{Options, sanitize_with_options};

use super::constants::{
    FILENAME_EXTENSION_MAX_BYTES, FILENAME_STEM_MAX_BYTES, FILENAME_STEM_MAX_CHARS,
    UNTITLED_FILENAME,
};
use super::string_utils::{safe_truncate_bytes, safe_truncate_chars};

/// Replace control characters and `\/:*?"<>|` with `_` and neutralize names
/// that are special on common filesystems (`..`, `CON`, trailing dots).
#[must_use]
pub fn validate_filename(name: &str) -> String {
    let sanitized = sanitize_with_options(
        name,
        Options {
            windows: true,
            truncate: false,
            replacement: "_",
        },
    );
    if sanitized.is_empty() {
        UNTITLED_FILENAME.to_string()
    } else {
        sanitized
    }
}

/// Split a file name at its last dot into stem and extension (without dot).
#[must_use]
pub fn filename_parts(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) => (&name[..pos], &name[pos + 1..]),
        None => (name, ""),
    }
}

/// A sanitized candidate name, split so that collision suffixes can be
/// inserted between stem and extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameCandidate {
    pub stem: String,
    /// Extension including the leading dot, or empty
    pub extension: String,
}

impl FilenameCandidate {
    /// Sanitize `name` and crop its stem to the portable length budget.
    #[must_use]
    pub fn new(name: &str) -> Self {
        let name = if name.is_empty() { UNTITLED_FILENAME } else { name };
        let validated = validate_filename(name);
        let (stem, ext) = match filename_parts(&validated) {
            // a suffix this long is part of the name, not a file type
            (_, ext) if ext.len() > FILENAME_EXTENSION_MAX_BYTES => (validated.as_str(), ""),
            parts => parts,
        };
        let stem = safe_truncate_chars(
            safe_truncate_bytes(stem, FILENAME_STEM_MAX_BYTES),
            FILENAME_STEM_MAX_CHARS,
        );
        Self {
            stem: stem.to_string(),
            extension: if ext.is_empty() {
                String::new()
            } else {
                format!(".{ext}")
            },
        }
    }

    /// Render the name with an optional numeric collision suffix
    #[must_use]
    pub fn render(&self, seq: usize) -> String {
        if seq == 0 {
            format!("{}{}", self.stem, self.extension)
        } else {
            format!("{}-{}{}", self.stem, seq, self.extension)
        }
    }
}
