//! Collision-free archive file names for one capture session

use std::collections::HashMap;

use crate::utils::{FilenameCandidate, RESERVED_FILENAMES, split_url_by_anchor};

/// What a reserved file name is bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilenameToken {
    /// Anchor-stripped source URL; equal URLs share one file
    Url(String),
    /// Generated content that must never be shared with anything
    Unique,
    /// Container-level names seeded at session start
    Reserved,
}

impl FilenameToken {
    /// Token for a resource URL, with its fragment stripped.
    #[must_use]
    pub fn url(url: &str) -> Self {
        Self::Url(split_url_by_anchor(url).0.to_string())
    }

    fn shares_with(&self, other: &FilenameToken) -> bool {
        match (self, other) {
            (Self::Url(a), Self::Url(b)) => a == b,
            _ => false,
        }
    }
}

/// Outcome of a reservation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub filename: String,
    /// The name was already bound to the same URL; nothing needs saving
    pub is_duplicate: bool,
}

/// Case-insensitive `filename -> token` table
#[derive(Debug)]
pub struct FilenameRegistry {
    bindings: HashMap<String, FilenameToken>,
}

impl Default for FilenameRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FilenameRegistry {
    /// A table seeded with the archive's reserved names.
    #[must_use]
    pub fn new() -> Self {
        let bindings = RESERVED_FILENAMES
            .iter()
            .map(|name| (name.to_string(), FilenameToken::Reserved))
            .collect();
        Self { bindings }
    }

    /// Bind a sanitized variant of `candidate` to `token`.
    ///
    /// Returns the existing name when it is already bound to the same URL.
    /// Otherwise walks `stem-1.ext`, `stem-2.ext`, ... until a free slot
    /// is found and binds it.
    pub fn reserve(&mut self, candidate: &str, token: FilenameToken) -> Reservation {
        let candidate = FilenameCandidate::new(candidate);
        let mut seq = 0;
        loop {
            let filename = candidate.render(seq);
            let folded = filename.to_lowercase();
            match self.bindings.get(&folded) {
                None => {
                    self.bindings.insert(folded, token);
                    return Reservation {
                        filename,
                        is_duplicate: false,
                    };
                }
                Some(bound) if bound.shares_with(&token) => {
                    return Reservation {
                        filename,
                        is_duplicate: true,
                    };
                }
                Some(_) => seq += 1,
            }
        }
    }

    /// Whether `filename` is one of the container-level names.
    #[must_use]
    pub fn is_reserved(&self, filename: &str) -> bool {
        matches!(
            self.bindings.get(&filename.to_lowercase()),
            Some(FilenameToken::Reserved)
        )
    }

    /// Number of bound names, reserved seeds included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_suffix_monotonicity() {
        let mut registry = FilenameRegistry::new();
        let a = registry.reserve("a.png", FilenameToken::url("http://x/a.png"));
        let b = registry.reserve("a.png", FilenameToken::url("http://y/a.png"));
        let c = registry.reserve("a.png", FilenameToken::url("http://z/a.png"));
        assert_eq!(a.filename, "a.png");
        assert_eq!(b.filename, "a-1.png");
        assert_eq!(c.filename, "a-2.png");
        assert!(!a.is_duplicate && !b.is_duplicate && !c.is_duplicate);
    }

    #[test]
    fn test_dedup_idempotence() {
        let mut registry = FilenameRegistry::new();
        let first = registry.reserve("foo.png", FilenameToken::url("http://x/foo.png"));
        let second = registry.reserve("foo.png", FilenameToken::url("http://x/foo.png#frag"));
        assert_eq!(first.filename, second.filename);
        assert!(!first.is_duplicate);
        assert!(second.is_duplicate);
    }

    #[test]
    fn test_dedup_finds_suffixed_binding() {
        let mut registry = FilenameRegistry::new();
        registry.reserve("a.png", FilenameToken::url("http://x/a.png"));
        registry.reserve("a.png", FilenameToken::url("http://y/a.png"));
        let again = registry.reserve("A.PNG", FilenameToken::url("http://y/a.png"));
        assert_eq!(again.filename, "A-1.PNG");
        assert!(again.is_duplicate);
    }

    #[test]
    fn test_reserved_names_are_never_issued() {
        let mut registry = FilenameRegistry::new();
        for name in RESERVED_FILENAMES {
            let r = registry.reserve(name, FilenameToken::url("http://x/"));
            assert_ne!(r.filename, name);
            assert!(!r.is_duplicate);
        }
        let upper = registry.reserve("INDEX.HTML", FilenameToken::Unique);
        assert_eq!(upper.filename, "INDEX-2.HTML");
    }

    #[test]
    fn test_unique_token_never_dedups() {
        let mut registry = FilenameRegistry::new();
        let a = registry.reserve("doc.html", FilenameToken::Unique);
        let b = registry.reserve("doc.html", FilenameToken::Unique);
        assert_eq!(a.filename, "doc.html");
        assert_eq!(b.filename, "doc-1.html");
        assert!(!b.is_duplicate);
    }

    proptest! {
        #[test]
        fn prop_distinct_tokens_get_distinct_names(
            requests in proptest::collection::vec(("[a-cA-C]{1,2}(\\.png)?", 0usize..6), 1..60)
        ) {
            let mut registry = FilenameRegistry::new();
            let mut issued: std::collections::HashMap<String, String> = std::collections::HashMap::new();
            for (name, url_id) in requests {
                let url = format!("http://host/{url_id}");
                let r = registry.reserve(&name, FilenameToken::url(&url));
                let folded = r.filename.to_lowercase();
                match issued.get(&folded) {
                    Some(owner) => {
                        prop_assert_eq!(owner, &url);
                        prop_assert!(r.is_duplicate);
                    }
                    None => {
                        prop_assert!(!r.is_duplicate);
                        issued.insert(folded, url);
                    }
                }
            }
        }

        #[test]
        fn prop_names_are_filesystem_safe(name in "\\PC{0,600}") {
            let mut registry = FilenameRegistry::new();
            let r = registry.reserve(&name, FilenameToken::Unique);
            prop_assert!(!r.filename.is_empty());
            prop_assert!(!r.filename.chars().any(|c| c.is_control() || "\\/:*?\"<>|".contains(c)));
            prop_assert!(r.filename.len() <= 255);
            let names: HashSet<&str> = RESERVED_FILENAMES.into_iter().collect();
            prop_assert!(!names.contains(r.filename.to_lowercase().as_str()));
        }
    }
}
