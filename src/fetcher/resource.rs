use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::watch;

use super::data_uri::{DataUri, mime_for_filename, to_data_uri};
use super::{FetchError, FetchOutcome, HttpClient, RewriteKind};
use crate::config::CaptureOptions;
use crate::registry::FilenameToken;
use crate::session::{CaptureSession, FetchClaim};
use crate::storage::{SaveRequest, StorageSink};
use crate::stylesheet::{CssLocalizer, process_css_file};
use crate::utils::headers::{parse_content_disposition, parse_content_type};
use crate::utils::url_utils::filename_to_reference;
use crate::utils::{split_url_by_anchor, url_to_filename};

/// Fetched body and what is known about it, before post-processing
struct Retrieved {
    bytes: Vec<u8>,
    mime: String,
    charset: Option<String>,
    final_url: String,
    /// `None` when the body becomes a `data:` URL instead of a file
    filename: Option<String>,
}

enum Retrieval {
    Fresh(Retrieved),
    Duplicate(String),
}

/// Fetches resources into the archive of a capture session.
///
/// Cheap to clone. Every fetch is an independent `'static` future, so
/// callers may `tokio::spawn` it or poll it in place.
#[derive(Clone)]
pub struct ResourceFetcher {
    client: Arc<dyn HttpClient>,
    sink: Arc<dyn StorageSink>,
}

impl std::fmt::Debug for ResourceFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceFetcher").finish_non_exhaustive()
    }
}

impl ResourceFetcher {
    pub fn new(client: Arc<dyn HttpClient>, sink: Arc<dyn StorageSink>) -> Self {
        Self { client, sink }
    }

    #[must_use]
    pub fn client(&self) -> &Arc<dyn HttpClient> {
        &self.client
    }

    #[must_use]
    pub fn sink(&self) -> &Arc<dyn StorageSink> {
        &self.sink
    }

    /// Localize `url` into the session archive.
    ///
    /// Never fails: problems resolve to an outcome carrying the (optionally
    /// error-marked) source URL and a description of the error.
    pub fn fetch(
        &self,
        session: Arc<CaptureSession>,
        options: Arc<CaptureOptions>,
        url: String,
        kind: Option<RewriteKind>,
    ) -> BoxFuture<'static, FetchOutcome> {
        let this = self.clone();
        async move {
            log::debug!("fetch: {url}");
            if is_data_uri(&url) {
                if options.save_data_uri_as_file() && !options.save_file_as_data_uri() {
                    return this.save_data_uri(&session, &options, &url, kind).await;
                }
                return FetchOutcome::passthrough(url);
            }

            let (source_url, anchor) = split_url_by_anchor(&url);
            let outcome = this.fetch_shared(&session, &options, source_url, kind).await;
            with_anchor(outcome, anchor)
        }
        .boxed()
    }

    /// One download per anchor-stripped URL and session; later callers
    /// share the first outcome.
    async fn fetch_shared(
        &self,
        session: &Arc<CaptureSession>,
        options: &Arc<CaptureOptions>,
        source_url: &str,
        kind: Option<RewriteKind>,
    ) -> FetchOutcome {
        match session.claim_fetch(source_url) {
            FetchClaim::Owner(tx) => {
                let outcome = self.download(session, options, source_url, kind, &tx).await;
                tx.send_replace(Some(outcome.clone()));
                outcome
            }
            FetchClaim::Waiter(mut rx) => {
                let shared = rx
                    .wait_for(Option::is_some)
                    .await
                    .ok()
                    .and_then(|outcome| outcome.clone());
                match shared {
                    Some(outcome) => FetchOutcome {
                        is_duplicate: !outcome.is_error(),
                        ..outcome
                    },
                    None => failure(source_url, options, &FetchError::Abandoned),
                }
            }
        }
    }

    async fn download(
        &self,
        session: &Arc<CaptureSession>,
        options: &Arc<CaptureOptions>,
        source_url: &str,
        kind: Option<RewriteKind>,
        claim: &watch::Sender<Option<FetchOutcome>>,
    ) -> FetchOutcome {
        let timeout = options.fetch_timeout();
        let retrieval =
            match tokio::time::timeout(timeout, self.retrieve(session, options, source_url)).await
            {
                Ok(Ok(retrieval)) => retrieval,
                Ok(Err(e)) => return failure(source_url, options, &e),
                Err(_) => return failure(source_url, options, &FetchError::Timeout(timeout)),
            };

        match retrieval {
            Retrieval::Duplicate(filename) => FetchOutcome {
                url: filename_to_reference(&filename),
                is_duplicate: true,
                error: None,
            },
            Retrieval::Fresh(retrieved) => {
                // import cycles wait on this claim while the sheet is being
                // rewritten: publish the reserved name before rewriting
                if kind == Some(RewriteKind::Css) {
                    if let Some(filename) = &retrieved.filename {
                        claim.send_replace(Some(FetchOutcome::passthrough(filename_to_reference(filename))));
                    }
                }
                match self.finish(session, options, source_url, retrieved, kind).await {
                    Ok(outcome) => outcome,
                    Err(e) => failure(source_url, options, &e),
                }
            }
        }
    }

    /// Network half of a download: headers, name reservation, body.
    async fn retrieve(
        &self,
        session: &CaptureSession,
        options: &CaptureOptions,
        source_url: &str,
    ) -> Result<Retrieval, FetchError> {
        let response = self.client.get(source_url).await?;
        if !response.is_success() {
            return Err(FetchError::Status(response.status));
        }

        let content_type = response.content_type.as_deref().map(parse_content_type);
        let filename = response
            .content_disposition
            .as_deref()
            .map(parse_content_disposition)
            .and_then(|cd| cd.filename)
            .unwrap_or_else(|| url_to_filename(source_url));

        let filename = if options.save_file_as_data_uri() {
            None
        } else {
            let reservation = session.reserve_filename(&filename, FilenameToken::url(source_url));
            if reservation.is_duplicate {
                // dropping the response aborts the transfer
                drop(response);
                return Ok(Retrieval::Duplicate(reservation.filename));
            }
            Some(reservation.filename)
        };

        let final_url = response.final_url.clone();
        let bytes = response.bytes(options.max_resource_size()).await?;
        if bytes.is_empty() {
            return Err(FetchError::EmptyBody);
        }

        let (mime, charset) = match content_type {
            Some(ct) if !ct.mime.is_empty() => (ct.mime, ct.charset),
            other => (
                mime_for_filename(filename.as_deref().unwrap_or(source_url)).to_string(),
                other.and_then(|ct| ct.charset),
            ),
        };

        Ok(Retrieval::Fresh(Retrieved {
            bytes,
            mime,
            charset,
            final_url,
            filename,
        }))
    }

    /// Rewrite and store a retrieved body.
    async fn finish(
        &self,
        session: &Arc<CaptureSession>,
        options: &Arc<CaptureOptions>,
        source_url: &str,
        retrieved: Retrieved,
        kind: Option<RewriteKind>,
    ) -> Result<FetchOutcome, FetchError> {
        let Retrieved {
            mut bytes,
            mut mime,
            charset,
            final_url,
            filename,
        } = retrieved;

        if kind == Some(RewriteKind::Css) {
            let localizer = CssLocalizer::new(self, session, options);
            let (css, css_mime) =
                process_css_file(bytes, charset.as_deref(), &final_url, &localizer).await;
            bytes = css;
            mime = css_mime;
        }

        match filename {
            None => Ok(FetchOutcome::passthrough(to_data_uri(&bytes, &mime))),
            Some(filename) => self.store(session, options, source_url, &filename, bytes, mime).await,
        }
    }

    async fn store(
        &self,
        session: &CaptureSession,
        options: &CaptureOptions,
        source_url: &str,
        filename: &str,
        bytes: Vec<u8>,
        mime: String,
    ) -> Result<FetchOutcome, FetchError> {
        let target_path = format!(
            "{}/{}/{}",
            options.data_folder().to_string_lossy(),
            session.key(),
            filename
        );
        let stored = session
            .downloads()
            .save(
                self.sink.as_ref(),
                source_url,
                true,
                SaveRequest {
                    bytes,
                    mime,
                    target_path,
                },
            )
            .await?;

        // the sink may have uniquified the name on disk
        let stored_name = stored
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| filename.to_string());
        Ok(FetchOutcome::passthrough(filename_to_reference(&stored_name)))
    }

    async fn save_data_uri(
        &self,
        session: &Arc<CaptureSession>,
        options: &Arc<CaptureOptions>,
        url: &str,
        kind: Option<RewriteKind>,
    ) -> FetchOutcome {
        let Some(data) = DataUri::parse(url) else {
            return failure(url, options, &FetchError::InvalidDataUri);
        };

        let filename = data.filename.clone().unwrap_or_else(|| {
            format!(
                "{:016x}.{}",
                xxhash_rust::xxh3::xxh3_64(url.as_bytes()),
                data.extension()
            )
        });
        let reservation = session.reserve_filename(&filename, FilenameToken::Url(url.to_string()));
        if reservation.is_duplicate {
            return FetchOutcome {
                url: filename_to_reference(&reservation.filename),
                is_duplicate: true,
                error: None,
            };
        }

        let retrieved = Retrieved {
            bytes: data.bytes,
            mime: data.mime,
            charset: None,
            final_url: url.to_string(),
            filename: Some(reservation.filename),
        };
        match self.finish(session, options, url, retrieved, kind).await {
            Ok(outcome) => outcome,
            Err(e) => failure(url, options, &e),
        }
    }
}

fn is_data_uri(url: &str) -> bool {
    url.get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
}

/// Local references keep the fragment of the original reference.
fn with_anchor(outcome: FetchOutcome, anchor: &str) -> FetchOutcome {
    if anchor.is_empty() || outcome.is_error() || is_data_uri(&outcome.url) {
        return outcome;
    }
    FetchOutcome {
        url: format!("{}{anchor}", outcome.url),
        ..outcome
    }
}

fn failure(source_url: &str, options: &CaptureOptions, error: &FetchError) -> FetchOutcome {
    log::warn!("Failed to fetch {source_url}: {error}");
    FetchOutcome::failed(source_url, options, error)
}
