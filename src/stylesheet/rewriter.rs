//! Regex lexer for URL references in CSS text
//!
//! Not a CSS parser. The patterns are tolerant of comments, whitespace
//! and both quoting styles, which covers the references a capture needs to
//! localize: `@import`, `@font-face` sources and bare `url()` values.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::config::{CaptureOptions, Policy, ResourceCategory};
use crate::fetcher::RewriteKind;
use crate::utils::constants::BLANK_URI;
use crate::utils::string_utils::{escape_css_string, unescape_css};
use crate::utils::absolutize;

const COMMENT: &str = r"(?:/\*[\s\S]*?\*/)";
const SPACE: &str = r"(?:[ \t\r\n\v\f]*)";
const CHAR: &str = r"(?:\\.|[^\\])";

struct Patterns {
    /// comment | @import (3 groups) | @font-face block (1 group) | url() (1 group)
    tokens: Regex,
    /// `url(` prefix, quoted or bare value, `)` suffix
    url: Regex,
}

static PATTERNS: Lazy<Patterns> = Lazy::new(|| {
    let cm_sp = format!("(?:(?:{COMMENT}|{SPACE})*)");
    let string = format!("(?:{CHAR}*?)");
    let spaced = format!("(?:{cm_sp}{string}{cm_sp})");
    let dq = format!("(?:\"{string}\")");
    let sq = format!("(?:'{string}')");
    let embedded = format!("(?:(?:{COMMENT}|{dq}|{sq}|{CHAR})*?)");
    let url = format!(r"(?:url\({SPACE}(?:{dq}|{sq}|{spaced}){SPACE}\))");
    let url_parts = format!(r"(?i)(url\({SPACE})({dq}|{sq}|{spaced})({SPACE}\))");
    let import = format!("(@import{cm_sp})({url}|{dq}|{sq})({cm_sp};)");
    let font_face = format!(r"(@font-face{cm_sp}\{{{embedded}\}})");
    let tokens = format!("(?i){COMMENT}|{import}|{font_face}|({url})");

    Patterns {
        tokens: Regex::new(&tokens).unwrap_or_else(|e| panic!("invalid CSS token pattern: {e}")),
        url: Regex::new(&url_parts).unwrap_or_else(|e| panic!("invalid CSS url pattern: {e}")),
    }
});

/// Which construct a CSS reference was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CssRefKind {
    Import,
    FontFace,
    Background,
}

impl CssRefKind {
    #[must_use]
    pub fn category(self) -> ResourceCategory {
        match self {
            Self::Import => ResourceCategory::Style,
            Self::FontFace => ResourceCategory::Font,
            Self::Background => ResourceCategory::ImageBackground,
        }
    }

    /// Imported sheets are stylesheets themselves and get rewritten too
    #[must_use]
    pub fn rewrite_kind(self) -> Option<RewriteKind> {
        match self {
            Self::Import => Some(RewriteKind::Css),
            Self::FontFace | Self::Background => None,
        }
    }
}

fn strip_quotes(value: &str) -> Option<&str> {
    let bytes = value.as_bytes();
    let quoted = bytes.len() >= 2
        && matches!(bytes[0], b'"' | b'\'')
        && bytes[bytes.len() - 1] == bytes[0];
    quoted.then(|| &value[1..value.len() - 1])
}

fn rewrite_url_functions(text: &str, on_url: &mut dyn FnMut(&str) -> String) -> String {
    PATTERNS
        .url
        .replace_all(text, |caps: &Captures| {
            let raw = &caps[2];
            let inner = strip_quotes(raw).unwrap_or_else(|| raw.trim());
            format!("{}\"{}\"{}", &caps[1], escape_css_string(&on_url(inner)), &caps[3])
        })
        .into_owned()
}

/// Replace every URL reference with `handler(kind, raw_url)`.
///
/// `raw_url` is the still-escaped text between the quotes or parentheses.
/// Comments are passed through untouched, and every replaced value is
/// written back, escaped, as `url("...")`.
pub fn rewrite_css_urls(text: &str, mut handler: impl FnMut(CssRefKind, &str) -> String) -> String {
    PATTERNS
        .tokens
        .replace_all(text, |caps: &Captures| {
            if let Some(target) = caps.get(2) {
                let target = target.as_str();
                let replaced = match strip_quotes(target) {
                    Some(inner) => format!(
                        "url(\"{}\")",
                        escape_css_string(&handler(CssRefKind::Import, inner))
                    ),
                    None => rewrite_url_functions(target, &mut |u| handler(CssRefKind::Import, u)),
                };
                format!("{}{}{}", &caps[1], replaced, &caps[3])
            } else if caps.get(4).is_some() {
                rewrite_url_functions(&caps[0], &mut |u| handler(CssRefKind::FontFace, u))
            } else if caps.get(5).is_some() {
                rewrite_url_functions(&caps[0], &mut |u| handler(CssRefKind::Background, u))
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// Apply the capture policies to the URL references of a stylesheet.
///
/// `link` keeps the absolute URL, `blank`/`remove` neutralize it and `save`
/// asks `on_save` for a replacement (normally a pending-fetch placeholder).
pub fn rewrite_css(
    text: &str,
    base_url: &str,
    options: &CaptureOptions,
    mut on_save: impl FnMut(&str, Option<RewriteKind>) -> String,
) -> String {
    rewrite_css_urls(text, |kind, raw| {
        let url = absolutize(base_url, &unescape_css(raw));
        match options.policy(kind.category()) {
            Policy::Link => url,
            Policy::Blank | Policy::Remove | Policy::Comment => BLANK_URI.to_string(),
            Policy::Save => on_save(&url, kind.rewrite_kind()),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(text: &str) -> (String, Vec<(CssRefKind, String)>) {
        let mut seen = Vec::new();
        let out = rewrite_css_urls(text, |kind, url| {
            seen.push((kind, url.to_string()));
            format!("X{}", seen.len())
        });
        (out, seen)
    }

    #[test]
    fn test_bare_url_forms() {
        let (out, seen) = collect("a{background:url(a.png)} b{background:URL( 'b.png' )} c{x:url(\"c.png\")}");
        assert_eq!(
            out,
            "a{background:url(\"X1\")} b{background:URL( \"X2\" )} c{x:url(\"X3\")}"
        );
        assert!(seen.iter().all(|(k, _)| *k == CssRefKind::Background));
        assert_eq!(seen[1].1, "b.png");
    }

    #[test]
    fn test_import_forms() {
        let (out, seen) =
            collect("@import \"a.css\";\n@import url(b.css);\n@import 'c.css' ;");
        assert_eq!(
            seen,
            vec![
                (CssRefKind::Import, "a.css".to_string()),
                (CssRefKind::Import, "b.css".to_string()),
                (CssRefKind::Import, "c.css".to_string()),
            ]
        );
        assert_eq!(
            out,
            "@import url(\"X1\");\n@import url(\"X2\");\n@import url(\"X3\") ;"
        );
    }

    #[test]
    fn test_import_with_media_query_falls_back_to_url() {
        let (_, seen) = collect("@import url(print.css) print;");
        assert_eq!(seen, vec![(CssRefKind::Background, "print.css".to_string())]);
    }

    #[test]
    fn test_font_face_sources() {
        let css = "@font-face { font-family: 'x'; src: url(a.woff2) format('woff2'), url(\"a.woff\"); }";
        let (_, seen) = collect(css);
        assert_eq!(
            seen,
            vec![
                (CssRefKind::FontFace, "a.woff2".to_string()),
                (CssRefKind::FontFace, "a.woff".to_string()),
            ]
        );
    }

    #[test]
    fn test_commented_references_are_ignored() {
        let (out, seen) = collect("/* url(hidden.png) @import 'x.css'; */ p{}");
        assert!(seen.is_empty());
        assert_eq!(out, "/* url(hidden.png) @import 'x.css'; */ p{}");
    }

    #[test]
    fn test_policy_mapping() {
        let options = CaptureOptions::builder()
            .policy(ResourceCategory::Font, Policy::Link)
            .policy(ResourceCategory::ImageBackground, Policy::Blank)
            .build()
            .expect("valid options");
        let css = "@font-face{src:url(f.woff)} p{background:url(bg.png)} @import 'i.css';";
        let mut saved = Vec::new();
        let out = rewrite_css(css, "http://h/css/main.css", &options, |url, kind| {
            saved.push((url.to_string(), kind));
            "SAVED".to_string()
        });
        assert!(out.contains("url(\"http://h/css/f.woff\")"));
        assert!(out.contains("url(\"about:blank\")"));
        assert!(out.contains("@import url(\"SAVED\");"));
        assert_eq!(
            saved,
            vec![("http://h/css/i.css".to_string(), Some(RewriteKind::Css))]
        );
    }

    #[test]
    fn test_escaped_url_is_unescaped_before_resolving() {
        let options = CaptureOptions::builder()
            .policy(ResourceCategory::ImageBackground, Policy::Link)
            .build()
            .expect("valid options");
        let out = rewrite_css("p{background:url(a\\(1\\).png)}", "http://h/", &options, |_, _| {
            unreachable!("link policy never saves")
        });
        assert_eq!(out, "p{background:url(\"http://h/a(1).png\")}");
    }

    #[test]
    fn test_replacements_are_escaped_inside_quotes() {
        let options = CaptureOptions::builder()
            .policy(ResourceCategory::ImageBackground, Policy::Link)
            .policy(ResourceCategory::Style, Policy::Link)
            .build()
            .expect("valid options");
        let css = "p{background:url('odd\\\"name\\\\.png')} @import 'x\\\"y.css';";
        let out = rewrite_css(css, "not a base", &options, |_, _| {
            unreachable!("link policy never saves")
        });
        assert_eq!(
            out,
            "p{background:url(\"odd\\\"name\\\\.png\")} @import url(\"x\\\"y.css\");"
        );
    }
}
