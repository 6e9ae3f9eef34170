//! Capture sessions
//!
//! A session is the explicit context shared by every document, frame and
//! resource of one top-level capture. It is created on first access and
//! disposed when the capture completes or is re-triggered for the same key.

mod key;
mod manager;

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::fetcher::FetchOutcome;
use crate::registry::{DocumentNameTable, FilenameRegistry, FilenameToken, Reservation};
use crate::storage::DownloadTracker;

pub use key::SessionKey;
pub use manager::SessionManager;

/// Result of claiming a URL for fetching
#[derive(Debug)]
pub enum FetchClaim {
    /// First requester: performs the fetch and publishes the outcome
    Owner(watch::Sender<Option<FetchOutcome>>),
    /// Later requester: awaits the owner's outcome
    Waiter(watch::Receiver<Option<FetchOutcome>>),
}

/// Shared state of one capture session
#[derive(Debug)]
pub struct CaptureSession {
    key: SessionKey,
    filenames: Mutex<FilenameRegistry>,
    documents: Mutex<DocumentNameTable>,
    downloads: DownloadTracker,
    fetches: Mutex<HashMap<String, watch::Receiver<Option<FetchOutcome>>>>,
}

impl CaptureSession {
    #[must_use]
    pub fn new(key: SessionKey) -> Self {
        Self {
            key,
            filenames: Mutex::new(FilenameRegistry::new()),
            documents: Mutex::new(DocumentNameTable::new()),
            downloads: DownloadTracker::new(),
            fetches: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    #[must_use]
    pub fn downloads(&self) -> &DownloadTracker {
        &self.downloads
    }

    pub fn reserve_filename(&self, candidate: &str, token: FilenameToken) -> Reservation {
        self.filenames.lock().reserve(candidate, token)
    }

    #[must_use]
    pub fn is_reserved_filename(&self, filename: &str) -> bool {
        self.filenames.lock().is_reserved(filename)
    }

    pub fn register_document_name(&self, name: &str) -> String {
        self.documents.lock().register(name)
    }

    /// Claim `url` (anchor already stripped). Exactly one caller per URL
    /// becomes the owner for the lifetime of the session.
    pub fn claim_fetch(&self, url: &str) -> FetchClaim {
        let mut fetches = self.fetches.lock();
        if let Some(rx) = fetches.get(url) {
            return FetchClaim::Waiter(rx.clone());
        }
        let (tx, rx) = watch::channel(None);
        fetches.insert(url.to_string(), rx);
        FetchClaim::Owner(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_first_claim_owns() {
        let session = CaptureSession::new(SessionKey::from("20240101000000000"));
        assert!(matches!(session.claim_fetch("http://h/a"), FetchClaim::Owner(_)));
        assert!(matches!(session.claim_fetch("http://h/a"), FetchClaim::Waiter(_)));
        assert!(matches!(session.claim_fetch("http://h/b"), FetchClaim::Owner(_)));
    }

    #[test]
    fn test_reserved_seed_names() {
        let session = CaptureSession::new(SessionKey::new());
        assert!(session.is_reserved_filename("index.html"));
        assert!(session.is_reserved_filename("INDEX.XHTML"));
        assert!(!session.is_reserved_filename("a.png"));
    }
}
