//! Capture entry points
//!
//! [`Capturer`] ties the shared services together (session table, resource
//! fetcher, frame coordinator) and decides how a document is captured: as a
//! walked and rewritten DOM, or as a plain file.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::LocalBoxFuture;

use super::errors::CaptureError;
use super::frames::{FrameCommand, FrameCoordinator, FrameHandle, TabId};
use super::settings::{CaptureSettings, CaptureType, SavedDocument};
use super::walker;
use crate::config::CaptureOptions;
use crate::dom::{ReadyState, SourceDocument};
use crate::fetcher::data_uri::mime_for_filename;
use crate::fetcher::{FetchError, HttpClient, ResourceFetcher};
use crate::registry::FilenameToken;
use crate::session::{CaptureSession, SessionKey, SessionManager};
use crate::storage::{SaveRequest, StorageSink};
use crate::utils::encoding::decode_document;
use crate::utils::headers::parse_content_type;
use crate::utils::url_utils::filename_to_reference;
use crate::utils::{url_to_filename, validate_filename};

const XHTML_MIME: &str = "application/xhtml+xml";

/// Shared capture services. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Capturer {
    sessions: SessionManager,
    fetcher: ResourceFetcher,
    frames: FrameCoordinator,
}

impl Capturer {
    pub fn new(client: Arc<dyn HttpClient>, sink: Arc<dyn StorageSink>) -> Self {
        Self {
            sessions: SessionManager::new(),
            fetcher: ResourceFetcher::new(client, sink),
            frames: FrameCoordinator::default(),
        }
    }

    /// Use `frames` instead of a private coordinator.
    #[must_use]
    pub fn with_frames(mut self, frames: FrameCoordinator) -> Self {
        self.frames = frames;
        self
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    #[must_use]
    pub fn fetcher(&self) -> &ResourceFetcher {
        &self.fetcher
    }

    #[must_use]
    pub fn frames(&self) -> &FrameCoordinator {
        &self.frames
    }

    /// Capture `source` as a document, or as a file when it is not markup.
    ///
    /// # Errors
    ///
    /// `CaptureError::DocumentNotReady` for a document still loading; the
    /// terminal error of the document or file capture otherwise.
    pub fn capture_document_or_file<'a>(
        &'a self,
        source: &'a SourceDocument,
        settings: CaptureSettings,
        options: Arc<CaptureOptions>,
    ) -> LocalBoxFuture<'a, Result<SavedDocument, CaptureError>> {
        async move {
            log::debug!("capture_document_or_file: {}", source.url());
            if source.ready_state() == ReadyState::Loading {
                return Err(CaptureError::DocumentNotReady {
                    url: source.url().to_string(),
                });
            }
            if source.is_html() || options.save_inline_as_html() {
                self.capture_document(source, settings, options).await
            } else {
                self.capture_file(source.url(), settings, options).await
            }
        }
        .boxed_local()
    }

    /// Walk, rewrite and store `source`.
    ///
    /// # Errors
    ///
    /// Storage and serialization failures. Resource and frame failures are
    /// recorded in the document instead.
    pub async fn capture_document(
        &self,
        source: &SourceDocument,
        settings: CaptureSettings,
        options: Arc<CaptureOptions>,
    ) -> Result<SavedDocument, CaptureError> {
        walker::capture_document(self, source, settings, options).await
    }

    /// Store `url` as a plain file.
    ///
    /// A main frame additionally gets an HTML document redirecting to the
    /// file, so the archive always has an index.
    ///
    /// # Errors
    ///
    /// `CaptureError::Fetch` when the file cannot be retrieved;
    /// `CaptureError::Storage` when the redirect document cannot be stored.
    pub async fn capture_file(
        &self,
        url: &str,
        settings: CaptureSettings,
        options: Arc<CaptureOptions>,
    ) -> Result<SavedDocument, CaptureError> {
        log::debug!("capture_file: {url}");
        let session = self.sessions.get_or_create(&settings.session_key);
        let outcome = self
            .fetcher
            .fetch(Arc::clone(&session), Arc::clone(&options), url.to_string(), None)
            .await;
        if let Some(reason) = outcome.error {
            return Err(CaptureError::Fetch {
                url: url.to_string(),
                reason,
            });
        }

        if !settings.frame_is_main {
            return Ok(SavedDocument {
                filename: outcome.url,
                target_dir: target_dir(&options, &session),
                frame_url: url.to_string(),
                path: None,
            });
        }

        let redirect = format!(
            "<html><head><meta charset=\"UTF-8\"><meta http-equiv=\"refresh\" content=\"0;URL={}\"></head><body></body></html>",
            outcome.url
        );
        let document_name = settings.document_name.clone();
        self.save_document(&session, &settings, &options, url, &document_name, "text/html", redirect)
            .await
    }

    /// Fetch `url`, parse it and capture it as a ready document. Non-markup
    /// responses are captured as files.
    ///
    /// # Errors
    ///
    /// `CaptureError::FrameUnavailable` when the URL (or its redirect target)
    /// is one of the enclosing frames; `CaptureError::Fetch` when it cannot
    /// be retrieved; the document capture's own errors otherwise.
    pub fn capture_url<'a>(
        &'a self,
        url: String,
        settings: CaptureSettings,
        options: Arc<CaptureOptions>,
    ) -> LocalBoxFuture<'a, Result<SavedDocument, CaptureError>> {
        async move {
            log::debug!("capture_url: {url}");
            if settings.is_frame_loop(&url) {
                return Err(frame_loop(&url));
            }
            let fetch_error = |e: FetchError| CaptureError::Fetch {
                url: url.clone(),
                reason: e.to_string(),
            };

            let timeout = options.fetch_timeout();
            let response = tokio::time::timeout(timeout, self.fetcher.client().get(&url))
                .await
                .map_err(|_| fetch_error(FetchError::Timeout(timeout)))?
                .map_err(fetch_error)?;
            if !response.is_success() {
                return Err(fetch_error(FetchError::Status(response.status)));
            }

            let content_type = response
                .content_type
                .as_deref()
                .map(parse_content_type)
                .unwrap_or_default();
            let final_url = response.final_url.clone();
            if final_url != url && settings.is_frame_loop(&final_url) {
                return Err(frame_loop(&final_url));
            }
            let mime = if content_type.mime.is_empty() {
                mime_for_filename(&url_to_filename(&final_url)).to_string()
            } else {
                content_type.mime
            };

            if mime != "text/html" && mime != XHTML_MIME {
                drop(response);
                return self.capture_file(&url, settings, options).await;
            }

            let bytes = tokio::time::timeout(timeout, response.bytes(options.max_resource_size()))
                .await
                .map_err(|_| fetch_error(FetchError::Timeout(timeout)))?
                .map_err(fetch_error)?;
            let text = decode_document(&bytes, content_type.charset.as_deref());
            let source = SourceDocument::parse_html(final_url, &text).with_content_type(&mime);
            self.capture_document(&source, settings, options).await
        }
        .boxed_local()
    }

    /// Name and store a serialized document.
    #[allow(clippy::too_many_arguments)]
    pub(super) async fn save_document(
        &self,
        session: &CaptureSession,
        settings: &CaptureSettings,
        options: &CaptureOptions,
        frame_url: &str,
        document_name: &str,
        content_type: &str,
        content: String,
    ) -> Result<SavedDocument, CaptureError> {
        let (ext, mime) = if content_type == XHTML_MIME {
            ("xhtml", XHTML_MIME)
        } else {
            ("html", "text/html")
        };
        let candidate = validate_filename(&format!("{document_name}.{ext}"));

        // the main document takes the container's reserved index name
        let filename = if settings.frame_is_main && session.is_reserved_filename(&candidate) {
            candidate
        } else {
            session.reserve_filename(&candidate, FilenameToken::Unique).filename
        };

        let target_dir = target_dir(options, session);
        let stored = session
            .downloads()
            .save(
                self.fetcher.sink().as_ref(),
                frame_url,
                !settings.frame_is_main,
                SaveRequest {
                    bytes: content.into_bytes(),
                    mime: mime.to_string(),
                    target_path: format!("{target_dir}/{filename}"),
                },
            )
            .await?;

        let stored_name = stored
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or(filename);
        log::info!("Saved {frame_url} as {target_dir}/{stored_name}");

        Ok(SavedDocument {
            filename: filename_to_reference(&stored_name),
            target_dir,
            frame_url: frame_url.to_string(),
            path: Some(stored.path),
        })
    }

    /// Register `source` as a live frame of `tab` and answer capture
    /// commands for it.
    ///
    /// The serving task runs on the current `LocalSet` until the returned
    /// handle is dropped.
    pub fn attach_frame(&self, tab: TabId, source: SourceDocument, is_main: bool) -> FrameHandle {
        let source = source.with_tab(tab);
        let (handle, mut commands) = self.frames.register(tab, source.url(), is_main);
        let capturer = self.clone();

        tokio::task::spawn_local(async move {
            while let Some(command) = commands.recv().await {
                let (settings, options, reply) = match command {
                    FrameCommand::BeginCapture {
                        settings,
                        options,
                        reply,
                    } => {
                        log::debug!("Frame {} starts capture {}", source.url(), settings.session_key);
                        (settings, options, reply)
                    }
                    FrameCommand::CaptureFrame {
                        settings,
                        options,
                        reply,
                    } => (settings, options, reply),
                };
                let result = capturer
                    .capture_document_or_file(&source, settings, options)
                    .await;
                if reply.send(result).is_err() {
                    log::debug!("Requester of {} went away before the reply", source.url());
                }
            }
        });
        handle
    }

    /// Capture a tab in a fresh session through its main frame.
    ///
    /// # Errors
    ///
    /// `CaptureError::FrameUnavailable` when the tab has no live main frame;
    /// the capture's terminal error otherwise.
    pub async fn capture_tab(
        &self,
        tab: TabId,
        options: Arc<CaptureOptions>,
    ) -> Result<SavedDocument, CaptureError> {
        let key = SessionKey::new();
        self.sessions.begin(&key);
        log::info!("Capturing {tab} as {key}");

        let settings = CaptureSettings::main(key.clone(), CaptureType::Tab);
        let result = self.frames.begin_capture(tab, settings, options).await;
        self.finish_session(&key, &result);
        result
    }

    /// Capture `url` in a fresh session.
    ///
    /// # Errors
    ///
    /// As [`capture_url`](Self::capture_url).
    pub async fn capture_page(
        &self,
        url: &str,
        options: Arc<CaptureOptions>,
    ) -> Result<SavedDocument, CaptureError> {
        let key = SessionKey::new();
        self.sessions.begin(&key);
        log::info!("Capturing {url} as {key}");

        let settings = CaptureSettings::main(key.clone(), CaptureType::Url);
        let result = self.capture_url(url.to_string(), settings, options).await;
        self.finish_session(&key, &result);
        result
    }

    fn finish_session(&self, key: &SessionKey, result: &Result<SavedDocument, CaptureError>) {
        self.sessions.dispose(key);
        match result {
            Ok(saved) => log::info!("Capture {key} done: {}/{}", saved.target_dir, saved.filename),
            Err(e) => log::error!("Capture {key} failed: {e}"),
        }
    }
}

fn frame_loop(url: &str) -> CaptureError {
    CaptureError::FrameUnavailable(format!("{url} would re-enter an enclosing frame or nest too deep"))
}

fn target_dir(options: &CaptureOptions, session: &CaptureSession) -> String {
    format!("{}/{}", options.data_folder().to_string_lossy(), session.key())
}
