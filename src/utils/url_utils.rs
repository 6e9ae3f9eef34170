//! URL manipulation utilities.
//!
//! This module provides functions for resolving references found in captured
//! documents and for turning source URLs into archive file names.

use anyhow::{Context, Result};
use url::Url;

use super::constants::ERROR_URI_PREFIX;

/// Resolve a potentially relative URL against a base URL
///
/// Absolute references (including `data:`, `javascript:` and `about:`) come
/// back unchanged apart from normalization by the `url` crate.
pub fn resolve_url(base_url: &str, url: &str) -> Result<String> {
    let trimmed = url.trim();
    if let Ok(absolute) = Url::parse(trimmed) {
        return Ok(absolute.to_string());
    }
    let base = Url::parse(base_url).context("Invalid base URL")?;
    let resolved = base.join(trimmed).context("Failed to resolve URL")?;
    Ok(resolved.to_string())
}

/// Resolve a reference, falling back to the raw value when it cannot be
/// resolved (an unparseable base such as `about:srcdoc`, or a malformed URL).
pub fn absolutize(base_url: &str, url: &str) -> String {
    match resolve_url(base_url, url) {
        Ok(resolved) => resolved,
        Err(e) => {
            log::debug!("Keeping unresolvable reference '{url}' against '{base_url}': {e}");
            url.to_string()
        }
    }
}

/// Split a URL into the part before the fragment and the fragment itself
/// (including the leading `#`, empty when there is none).
#[must_use]
pub fn split_url_by_anchor(url: &str) -> (&str, &str) {
    match url.find('#') {
        Some(pos) => (&url[..pos], &url[pos..]),
        None => (url, ""),
    }
}

/// Derive a candidate file name from the last path segment of a URL.
///
/// The query and fragment are dropped and the segment is percent-decoded on
/// a best-effort basis. A URL ending with `/` yields `index.html`, which the
/// filename registry then moves off the reserved name.
#[must_use]
pub fn url_to_filename(url: &str) -> String {
    let mut name = url;
    if let Some(pos) = name.find('?') {
        name = &name[..pos];
    }
    if let Some(pos) = name.find('#') {
        name = &name[..pos];
    }
    if let Some(pos) = name.rfind('/') {
        name = &name[pos + 1..];
    }
    if name.is_empty() {
        return "index.html".to_string();
    }
    match urlencoding::decode(name) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => name.to_string(),
    }
}

/// Mark a URL as a failed download when the audit option asks for it.
///
/// The marker is applied at most once.
#[must_use]
pub fn get_error_url(source_url: &str, record_error_uri: bool) -> String {
    if record_error_uri && !source_url.starts_with(ERROR_URI_PREFIX) {
        format!("{ERROR_URI_PREFIX}{source_url}")
    } else {
        source_url.to_string()
    }
}

/// Turn an archive file name into a relative reference usable in `src`,
/// `href` or CSS `url()` values.
#[must_use]
pub fn filename_to_reference(filename: &str) -> String {
    urlencoding::encode(filename).into_owned()
}

/// Whether the URL has a scheme the capture can retrieve content from
#[must_use]
pub fn is_fetchable(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    lower.starts_with("http:")
        || lower.starts_with("https:")
        || lower.starts_with("file:")
        || lower.starts_with("data:")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_url_resolution() {
        let result = resolve_url("https://example.com/css/style.css", "../images/bg.png").unwrap();
        assert_eq!(result, "https://example.com/images/bg.png");
    }

    #[test]
    fn test_absolute_reference_is_kept() {
        let result = resolve_url("https://example.com/", "data:,hello").unwrap();
        assert_eq!(result, "data:,hello");
        let result = resolve_url("https://example.com/", "javascript:void(0)").unwrap();
        assert_eq!(result, "javascript:void(0)");
    }

    #[test]
    fn test_query_string_is_preserved_verbatim() {
        let result = resolve_url("https://example.com/", "/a.png?v=1&flag").unwrap();
        assert_eq!(result, "https://example.com/a.png?v=1&flag");
    }

    #[test]
    fn test_split_url_by_anchor() {
        assert_eq!(split_url_by_anchor("http://x/a.png#frag"), ("http://x/a.png", "#frag"));
        assert_eq!(split_url_by_anchor("http://x/a.png"), ("http://x/a.png", ""));
    }

    #[test]
    fn test_url_to_filename() {
        assert_eq!(url_to_filename("http://x/dir/a.png?x=1#y"), "a.png");
        assert_eq!(url_to_filename("http://x/dir/my%20file.css"), "my file.css");
        assert_eq!(url_to_filename("http://x/dir/"), "index.html");
    }

    #[test]
    fn test_error_url_marker_applied_once() {
        let once = get_error_url("http://x/a.png", true);
        assert_eq!(once, "urn:scrapbook:download:error:http://x/a.png");
        assert_eq!(get_error_url(&once, true), once);
        assert_eq!(get_error_url("http://x/a.png", false), "http://x/a.png");
    }

    #[test]
    fn test_filename_reference_encoding() {
        assert_eq!(filename_to_reference("a-1.png"), "a-1.png");
        assert_eq!(filename_to_reference("my file.png"), "my%20file.png");
    }
}
