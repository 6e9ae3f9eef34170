pub mod capture;
pub mod config;
pub mod dom;
pub mod fetcher;
pub mod registry;
pub mod session;
pub mod storage;
pub mod stylesheet;
pub mod utils;

pub use capture::{
    CaptureError, CaptureSettings, CaptureType, Capturer, FrameCoordinator, FrameHandle, SavedDocument,
    TabId,
};
pub use config::{CaptureOptions, CaptureOptionsBuilder, CssRewriteMode, Policy, ResourceCategory};
pub use dom::{FrameContent, ReadyState, SourceDocument};
pub use fetcher::{FetchOutcome, HttpClient, ReqwestClient, ResourceFetcher};
pub use session::{SessionKey, SessionManager};
pub use storage::{FsSink, StorageSink};

use std::sync::Arc;

/// Capture `url` into `options.data_folder()` below `root` with the
/// default network client.
///
/// # Errors
///
/// Fails when the HTTP client cannot be built or the capture fails.
pub async fn capture(
    url: &str,
    root: impl Into<std::path::PathBuf>,
    options: CaptureOptions,
) -> anyhow::Result<SavedDocument> {
    let client = ReqwestClient::new(options.user_agent(), options.fetch_timeout())?;
    let capturer = Capturer::new(Arc::new(client), Arc::new(FsSink::new(root)));
    let saved = capturer.capture_page(url, Arc::new(options)).await?;
    Ok(saved)
}
