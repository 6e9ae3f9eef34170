//! Core configuration types for page capture
//!
//! This module contains the `CaptureOptions` struct and the closed sets of
//! resource categories and policy verbs that drive every rewrite decision.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// How a category of references is treated during capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    /// Fetch the resource and point the reference at the local copy
    Save,
    /// Keep the reference as an absolute URL, never fetched
    Link,
    /// Replace the reference with an inert value
    Blank,
    /// Delete the node or attribute
    Remove,
    /// Replace the node with an HTML comment holding its markup
    Comment,
}

impl Policy {
    /// Parse a policy verb as it appears in the flat option map.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "save" => Some(Self::Save),
            "link" => Some(Self::Link),
            "blank" => Some(Self::Blank),
            "remove" => Some(Self::Remove),
            "comment" => Some(Self::Comment),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Save => "save",
            Self::Link => "link",
            Self::Blank => "blank",
            Self::Remove => "remove",
            Self::Comment => "comment",
        }
    }
}

impl std::fmt::Display for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of capturable reference classes, each with its own policy key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceCategory {
    Image,
    Audio,
    Video,
    Frame,
    Script,
    Noscript,
    Style,
    StyleInline,
    Font,
    Object,
    Embed,
    Applet,
    Canvas,
    ImageBackground,
    ScriptAttr,
    ScriptAnchor,
    Base,
}

impl ResourceCategory {
    pub const ALL: [ResourceCategory; 17] = [
        Self::Image,
        Self::Audio,
        Self::Video,
        Self::Frame,
        Self::Script,
        Self::Noscript,
        Self::Style,
        Self::StyleInline,
        Self::Font,
        Self::Object,
        Self::Embed,
        Self::Applet,
        Self::Canvas,
        Self::ImageBackground,
        Self::ScriptAttr,
        Self::ScriptAnchor,
        Self::Base,
    ];

    /// Key suffix in the flat option map (`capture.<key>`)
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Frame => "frame",
            Self::Script => "script",
            Self::Noscript => "noscript",
            Self::Style => "style",
            Self::StyleInline => "styleInline",
            Self::Font => "font",
            Self::Object => "object",
            Self::Embed => "embed",
            Self::Applet => "applet",
            Self::Canvas => "canvas",
            Self::ImageBackground => "imageBackground",
            Self::ScriptAttr => "scriptAttr",
            Self::ScriptAnchor => "scriptAnchor",
            Self::Base => "base",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key() == key)
    }

    /// Policy used when the option map has no (valid) entry for the category.
    ///
    /// Event-handler attributes and `javascript:` links are stripped unless
    /// explicitly kept.
    #[must_use]
    pub fn default_policy(self) -> Policy {
        match self {
            Self::ScriptAttr | Self::ScriptAnchor => Policy::Remove,
            _ => Policy::Save,
        }
    }

    /// Whether the category governs whole nodes, so that `comment` can
    /// replace the node with its markup. Attribute-level categories treat
    /// `comment` as `remove`.
    #[must_use]
    pub fn supports_comment(self) -> bool {
        matches!(
            self,
            Self::Image
                | Self::Audio
                | Self::Video
                | Self::Frame
                | Self::Script
                | Self::Noscript
                | Self::Style
                | Self::Object
                | Self::Embed
                | Self::Applet
                | Self::Canvas
        )
    }
}

impl std::fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Whether CSS text (files, `<style>`, `style=`) has its URLs rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CssRewriteMode {
    #[default]
    Url,
    None,
}

impl CssRewriteMode {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "url" => Some(Self::Url),
            "none" => Some(Self::None),
            _ => None,
        }
    }
}

/// Main configuration struct for capture operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureOptions {
    /// Archive root. Each session writes into `<data_folder>/<timeId>/`.
    pub(crate) data_folder: PathBuf,

    /// Per-category policy overrides; missing entries use the category default
    pub(crate) policies: BTreeMap<ResourceCategory, Policy>,

    pub(crate) rewrite_css: CssRewriteMode,

    /// Capture only the current selection when one exists
    pub(crate) save_selection_only: bool,

    /// Record the source URL on the root element
    pub(crate) record_document_meta: bool,

    /// Leave an HTML comment holding the markup of removed nodes
    pub(crate) record_removed_node: bool,

    /// Keep the previous value of rewritten attributes and text content
    pub(crate) record_removed_attr: bool,

    /// Keep the previous value of rewritten resource references
    pub(crate) record_source_uri: bool,

    /// Prefix failed references with the error marker
    pub(crate) record_error_uri: bool,

    /// Strip `integrity` attributes, which no longer match rewritten content
    pub(crate) remove_integrity: bool,

    /// Decode `data:` references into archive files
    pub(crate) save_data_uri_as_file: bool,

    /// Inline fetched resources as `data:` URLs instead of archive files
    pub(crate) save_file_as_data_uri: bool,

    /// Capture non-HTML documents as documents instead of files
    pub(crate) save_inline_as_html: bool,

    /// Timeout for one resource fetch
    ///
    /// A timeout only affects the reference being fetched.
    ///
    /// Default: 30 seconds
    pub(crate) fetch_timeout_secs: u64,

    /// Largest accepted resource body (bytes)
    pub(crate) max_resource_size: usize,

    pub(crate) user_agent: String,
}

/// Error types for option loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read options file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Options file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Options file must contain a JSON object")]
    NotAnObject,

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}
