//! Stylesheet rewriting
//!
//! - [`rewriter`]: regex lexer and policy mapping for CSS references
//! - [`placeholders`]: deferred substitution of pending fetch results
//! - [`css_file`]: charset handling for downloaded stylesheets

pub mod css_file;
pub mod placeholders;
pub mod rewriter;

use std::sync::Arc;

use crate::config::CaptureOptions;
use crate::fetcher::ResourceFetcher;
use crate::session::CaptureSession;

pub use css_file::process_css_file;
pub use placeholders::{PlaceholderSet, ResolvedPlaceholders};
pub use rewriter::{CssRefKind, rewrite_css, rewrite_css_urls};

/// Binds the CSS rewriter to a fetcher and a session so that saved
/// references turn into placeholders backed by real fetches.
pub struct CssLocalizer<'a> {
    fetcher: &'a ResourceFetcher,
    session: &'a Arc<CaptureSession>,
    options: &'a Arc<CaptureOptions>,
}

impl<'a> CssLocalizer<'a> {
    pub fn new(
        fetcher: &'a ResourceFetcher,
        session: &'a Arc<CaptureSession>,
        options: &'a Arc<CaptureOptions>,
    ) -> Self {
        Self {
            fetcher,
            session,
            options,
        }
    }

    /// Rewrite `text`, parking a fetch in `placeholders` for every saved URL.
    pub fn rewrite(&self, text: &str, base_url: &str, placeholders: &mut PlaceholderSet) -> String {
        rewrite_css(text, base_url, self.options, |url, kind| {
            placeholders.register(self.fetcher.fetch(
                Arc::clone(self.session),
                Arc::clone(self.options),
                url.to_string(),
                kind,
            ))
        })
    }

    /// Rewrite `text` and wait for every saved reference to be localized.
    pub async fn localize(&self, text: &str, base_url: &str) -> String {
        let mut placeholders = PlaceholderSet::new();
        let rewritten = self.rewrite(text, base_url, &mut placeholders);
        if placeholders.is_empty() {
            return rewritten;
        }
        placeholders.resolve().await.apply(&rewritten)
    }
}
