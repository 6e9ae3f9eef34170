//! Per-document capture settings and results

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::session::SessionKey;
use crate::utils::constants::{DEFAULT_DOCUMENT_NAME, MAX_FRAME_DEPTH};
use crate::utils::split_url_by_anchor;

/// How a capture was started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureType {
    /// A document displayed in a browser tab
    #[default]
    Tab,
    /// A document fetched by URL
    Url,
}

/// Settings of one walker pass, fixed for its duration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSettings {
    #[serde(rename = "timeId")]
    pub session_key: SessionKey,
    pub capture_type: CaptureType,
    pub frame_is_main: bool,
    /// Logical name, disambiguated per session before use
    pub document_name: String,
    /// URLs of the enclosing documents, outermost first, without anchors
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub frame_ancestors: Vec<String>,
}

impl CaptureSettings {
    /// Settings for the top document of a capture.
    #[must_use]
    pub fn main(session_key: SessionKey, capture_type: CaptureType) -> Self {
        Self {
            session_key,
            capture_type,
            frame_is_main: true,
            document_name: DEFAULT_DOCUMENT_NAME.to_string(),
            frame_ancestors: Vec::new(),
        }
    }

    /// Settings handed down to a child frame of the document at `parent_url`.
    #[must_use]
    pub fn for_subframe(&self, parent_url: &str) -> Self {
        let mut frame_ancestors = self.frame_ancestors.clone();
        frame_ancestors.push(split_url_by_anchor(parent_url).0.to_string());
        Self {
            frame_is_main: false,
            frame_ancestors,
            ..self.clone()
        }
    }

    /// Whether capturing `url` here would re-enter an enclosing document,
    /// or nest frames deeper than [`MAX_FRAME_DEPTH`].
    #[must_use]
    pub fn is_frame_loop(&self, url: &str) -> bool {
        let url = split_url_by_anchor(url).0;
        self.frame_ancestors.len() >= MAX_FRAME_DEPTH
            || self.frame_ancestors.iter().any(|ancestor| ancestor == url)
    }
}

/// Where a captured document (or file) ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedDocument {
    /// Reference the parent document should use for this capture
    pub filename: String,
    /// `<dataFolder>/<timeId>`
    pub target_dir: String,
    pub frame_url: String,
    /// Path reported by the storage sink, when something was stored
    pub path: Option<PathBuf>,
}
