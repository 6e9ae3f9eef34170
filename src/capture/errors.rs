use crate::storage::SinkError;

/// Terminal failures of a document or file capture.
///
/// Resource fetch failures are not here: they are node-local and never
/// abort a capture.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("document not loaded: {url}")]
    DocumentNotReady { url: String },

    #[error("frame content unavailable: {0}")]
    FrameUnavailable(String),

    #[error("failed to store capture: {0}")]
    Storage(#[from] SinkError),

    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("failed to serialize document: {0}")]
    Serialize(String),
}
