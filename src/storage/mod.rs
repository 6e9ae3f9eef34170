//! Storage sink seam
//!
//! The capture engine never touches the filesystem directly. Finished
//! documents and fetched resources are handed to a [`StorageSink`] as
//! `bytes + target path`, and the sink answers with the path it actually used.

pub mod fs_sink;
pub mod tracker;

use std::path::PathBuf;

use futures::future::BoxFuture;

pub use fs_sink::FsSink;
pub use tracker::{DownloadTracker, PendingDownload};

/// Bytes to persist at a path relative to the sink root
#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub bytes: Vec<u8>,
    pub mime: String,
    /// `<dataFolder>/<timeId>/<filename>`, always with `/` separators
    pub target_path: String,
}

/// A record of a completed save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub id: u64,
    pub path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("target path escapes the storage root: {0}")]
    InvalidPath(String),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("storage sink rejected {path}: {reason}")]
    Rejected { path: String, reason: String },
}

/// Destination for captured bytes.
///
/// Implementations must uniquify on conflict rather than overwrite.
pub trait StorageSink: Send + Sync {
    fn save(&self, request: SaveRequest) -> BoxFuture<'_, Result<StoredFile, SinkError>>;

    /// Forget the history record of a transient save. The file stays.
    fn erase_record(&self, file: &StoredFile);
}
