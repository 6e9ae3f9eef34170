//! Resource fetching and localization
//!
//! Turns a reference found in a captured document into a reference to a
//! local archive member: fetch, name, optionally rewrite, store.

pub mod client;
pub mod data_uri;
mod resource;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::CaptureOptions;
use crate::storage::SinkError;
use crate::utils::get_error_url;

pub use client::{HttpClient, HttpResponse, ReqwestClient};
pub use data_uri::DataUri;
pub use resource::ResourceFetcher;

/// Post-processing applied to a fetched body before it is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RewriteKind {
    /// Decode as a stylesheet and localize its `url()` references
    Css,
}

/// What a reference becomes once its fetch settles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOutcome {
    /// Local reference, `data:` URL, pass-through URL or error-marked URL
    pub url: String,
    /// The resource was already stored under this name in this session
    pub is_duplicate: bool,
    pub error: Option<String>,
}

impl FetchOutcome {
    #[must_use]
    pub fn passthrough(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            is_duplicate: false,
            error: None,
        }
    }

    /// Outcome of a failed fetch of `source_url`
    #[must_use]
    pub fn failed(source_url: &str, options: &CaptureOptions, error: impl std::fmt::Display) -> Self {
        Self {
            url: get_error_url(source_url, options.record_error_uri()),
            is_duplicate: false,
            error: Some(error.to_string()),
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("empty response body")]
    EmptyBody,

    #[error("resource exceeds size limit: {size} bytes (max: {limit})")]
    TooLarge { size: usize, limit: usize },

    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("data URI cannot be read as file")]
    InvalidDataUri,

    #[error("fetch abandoned before completion")]
    Abandoned,

    #[error(transparent)]
    Storage(#[from] SinkError),
}
