//! Placeholder tokens for text that references several pending fetches
//!
//! A stylesheet or `srcset` value can contain any number of URLs. Each one
//! to be saved is swapped for a `urn:scrapbook:url:<uuid>` token while its
//! fetch is pending; once all fetches settle, one pass replaces the tokens
//! with the final references.

use std::collections::HashMap;

use futures::future::{BoxFuture, join_all};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use uuid::Uuid;

use crate::fetcher::FetchOutcome;
use crate::utils::constants::PLACEHOLDER_URI_PREFIX;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        "{}([0-9a-f]{{8}}-(?:[0-9a-f]{{4}}-){{3}}[0-9a-f]{{12}})",
        regex::escape(PLACEHOLDER_URI_PREFIX)
    ))
    .unwrap_or_else(|e| panic!("invalid placeholder pattern: {e}"))
});

/// Pending fetches keyed by placeholder id
#[derive(Default)]
pub struct PlaceholderSet {
    pending: Vec<(String, BoxFuture<'static, FetchOutcome>)>,
}

impl std::fmt::Debug for PlaceholderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaceholderSet")
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl PlaceholderSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Park `fetch` and return the token standing in for its result.
    pub fn register(&mut self, fetch: BoxFuture<'static, FetchOutcome>) -> String {
        let id = Uuid::new_v4().to_string();
        let token = format!("{PLACEHOLDER_URI_PREFIX}{id}");
        self.pending.push((id, fetch));
        token
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drive every parked fetch to completion.
    pub async fn resolve(self) -> ResolvedPlaceholders {
        let (ids, fetches): (Vec<_>, Vec<_>) = self.pending.into_iter().unzip();
        let outcomes = join_all(fetches).await;
        ResolvedPlaceholders {
            urls: ids
                .into_iter()
                .zip(outcomes)
                .map(|(id, outcome)| (id, outcome.url))
                .collect(),
        }
    }
}

/// Final references for a set of placeholder tokens
#[derive(Debug, Default, Clone)]
pub struct ResolvedPlaceholders {
    urls: HashMap<String, String>,
}

impl ResolvedPlaceholders {
    /// Substitute every known token in `text`.
    ///
    /// Token-shaped strings this set never issued are left as they are.
    #[must_use]
    pub fn apply(&self, text: &str) -> String {
        TOKEN_RE
            .replace_all(text, |caps: &Captures| {
                self.urls
                    .get(&caps[1])
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}
