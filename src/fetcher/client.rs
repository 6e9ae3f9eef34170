//! Network fetch primitive
//!
//! [`HttpClient`] is the narrow seam between the capture engine and the
//! network: URL in, status + headers + body stream out. [`ReqwestClient`] is
//! the production implementation; tests plug in in-memory doubles.

use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt, TryStreamExt};
use reqwest::Client;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};

use super::FetchError;
use crate::utils::constants::CHROME_USER_AGENT;

/// Response head plus a lazily pulled body.
///
/// Dropping the value before the body is drained aborts the transfer.
pub struct HttpResponse {
    /// HTTP status, or `0` for non-HTTP schemes
    pub status: u16,
    /// URL after redirects
    pub final_url: String,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    pub body: BoxStream<'static, Result<Vec<u8>, FetchError>>,
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("final_url", &self.final_url)
            .field("content_type", &self.content_type)
            .field("content_disposition", &self.content_disposition)
            .finish_non_exhaustive()
    }
}

impl HttpResponse {
    /// 2xx, or `0` for schemes without a status line
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == 0 || (200..300).contains(&self.status)
    }

    /// Drain the body, failing once more than `max_size` bytes arrive.
    pub async fn bytes(self, max_size: usize) -> Result<Vec<u8>, FetchError> {
        let mut buffer = Vec::new();
        let mut stream = self.body;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            let new_total = buffer.len() + chunk.len();
            if new_total > max_size {
                return Err(FetchError::TooLarge {
                    size: new_total,
                    limit: max_size,
                });
            }
            buffer.extend_from_slice(&chunk);
        }
        Ok(buffer)
    }
}

pub trait HttpClient: Send + Sync {
    fn get(&self, url: &str) -> BoxFuture<'_, Result<HttpResponse, FetchError>>;
}

/// `reqwest` for `http(s):`, `tokio::fs` for `file:`
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn get_http(&self, url: &str) -> Result<HttpResponse, FetchError> {
        let response = self
            .client
            .get(url)
            .header("Accept", "*/*")
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let header = |name| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let content_type = header(CONTENT_TYPE);
        let content_disposition = header(CONTENT_DISPOSITION);
        let status = response.status().as_u16();
        let final_url = response.url().to_string();

        let body = response
            .bytes_stream()
            .map_ok(|chunk| chunk.to_vec())
            .map_err(|e| FetchError::Network(e.to_string()))
            .boxed();

        Ok(HttpResponse {
            status,
            final_url,
            content_type,
            content_disposition,
            body,
        })
    }

    async fn get_file(url: &str) -> Result<HttpResponse, FetchError> {
        let parsed =
            url::Url::parse(url).map_err(|_| FetchError::UnsupportedScheme(url.to_string()))?;
        let path = parsed
            .to_file_path()
            .map_err(|()| FetchError::UnsupportedScheme(url.to_string()))?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| FetchError::Network(format!("{}: {e}", path.display())))?;
        Ok(HttpResponse {
            status: 0,
            final_url: url.to_string(),
            content_type: None,
            content_disposition: None,
            body: futures::stream::once(async move { Ok(bytes) }).boxed(),
        })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str) -> BoxFuture<'_, Result<HttpResponse, FetchError>> {
        let url = url.to_string();
        async move {
            let scheme = url.split(':').next().unwrap_or_default().to_ascii_lowercase();
            match scheme.as_str() {
                "http" | "https" => self.get_http(&url).await,
                "file" => Self::get_file(&url).await,
                _ => Err(FetchError::UnsupportedScheme(url)),
            }
        }
        .boxed()
    }
}

impl Default for ReqwestClient {
    fn default() -> Self {
        Self::with_client(
            Client::builder()
                .user_agent(CHROME_USER_AGENT)
                .build()
                .unwrap_or_default(),
        )
    }
}
