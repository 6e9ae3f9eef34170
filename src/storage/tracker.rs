//! Pending download table
//!
//! Every save runs as a tracked download. When the sink reports completion
//! the entry is dropped and, for transient saves, the sink's history record
//! is erased as well.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::{SaveRequest, SinkError, StorageSink, StoredFile};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDownload {
    pub url: String,
    pub auto_erase: bool,
}

#[derive(Debug, Default)]
pub struct DownloadTracker {
    next_handle: AtomicU64,
    pending: Mutex<HashMap<u64, PendingDownload>>,
}

impl DownloadTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of saves that have not reached a terminal state
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Save through `sink`, tracking the download until it settles.
    pub async fn save(
        &self,
        sink: &dyn StorageSink,
        url: &str,
        auto_erase: bool,
        request: SaveRequest,
    ) -> Result<StoredFile, SinkError> {
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.pending.lock().insert(
            handle,
            PendingDownload {
                url: url.to_string(),
                auto_erase,
            },
        );

        let result = sink.save(request).await;

        let entry = self.pending.lock().remove(&handle);
        match (&result, entry) {
            (Ok(stored), Some(entry)) if entry.auto_erase => sink.erase_record(stored),
            (Err(e), Some(entry)) => {
                log::debug!("Download of {} failed: {e}", entry.url);
            }
            _ => {}
        }
        result
    }
}
