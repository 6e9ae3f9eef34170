//! `srcset` attribute values: comma-separated `url [descriptor]` candidates

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static CANDIDATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\s*)([^ ,][^ ]*[^ ,])(\s*(?: [^ ,]+)?\s*(?:,|$))")
        .unwrap_or_else(|e| panic!("srcset pattern failed to compile: {e}"))
});

/// Map every candidate URL through `rewrite`, keeping descriptors and
/// separators as they are.
pub fn rewrite_srcset(srcset: &str, mut rewrite: impl FnMut(&str) -> String) -> String {
    CANDIDATE
        .replace_all(srcset, |caps: &Captures<'_>| {
            format!("{}{}{}", &caps[1], rewrite(&caps[2]), &caps[3])
        })
        .into_owned()
}

/// Candidate URLs in order
#[must_use]
pub fn srcset_urls(srcset: &str) -> Vec<String> {
    CANDIDATE
        .captures_iter(srcset)
        .map(|caps| caps[2].to_string())
        .collect()
}
