//! Shared configuration constants for page capture
//!
//! This module contains default values and configuration constants used
//! throughout the codebase to ensure consistency and avoid magic numbers.

/// Default archive root: every session writes into `<data folder>/<timeId>/`
pub const DEFAULT_DATA_FOLDER: &str = "WebScrapBook";

/// Default document name for a top-level capture.
///
/// Registered once per session; later documents with the same logical name
/// become `index_1`, `index_2`, and so on.
pub const DEFAULT_DOCUMENT_NAME: &str = "index";

/// Deepest frame nesting captured; deeper frames are left unavailable
pub const MAX_FRAME_DEPTH: usize = 32;

/// Per-resource fetch timeout: 30 seconds
///
/// A timeout is a node-local failure. The referencing attribute is rewritten
/// and the rest of the capture proceeds.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Maximum size of a single fetched resource (bytes)
///
/// Typical pages reference resources well below 1MB; video and font
/// payloads are the usual offenders near this limit.
pub const DEFAULT_MAX_RESOURCE_SIZE: usize = 64 * 1024 * 1024;

/// How long a frame coordinator waits for a frame to answer a capture request
pub const FRAME_REPLY_TIMEOUT_SECS: u64 = 120;

/// Capacity of each frame instance's command queue
pub const FRAME_COMMAND_QUEUE_CAPACITY: usize = 16;

/// Initial capacity for the capture session table
pub const SESSION_CACHE_INITIAL_CAPACITY: usize = 16;

/// Names that belong to the archive container and are never issued to a
/// fetched resource.
pub const RESERVED_FILENAMES: [&str; 4] = ["index.html", "index.xhtml", "index.dat", "index.rdf"];

/// Stem byte cap applied before the char cap when sanitizing filenames
pub const FILENAME_STEM_MAX_BYTES: usize = 240;

/// Stem char cap applied after the byte cap
pub const FILENAME_STEM_MAX_CHARS: usize = 128;

/// Longest suffix after the last dot still treated as an extension
pub const FILENAME_EXTENSION_MAX_BYTES: usize = 12;

/// Fallback name for resources whose URL yields no usable file name
pub const UNTITLED_FILENAME: &str = "untitled";

/// Prefix marking a reference whose fetch failed
pub const ERROR_URI_PREFIX: &str = "urn:scrapbook:download:error:";

/// Prefix of the placeholder tokens used while a bulk text rewrite is pending
pub const PLACEHOLDER_URI_PREFIX: &str = "urn:scrapbook:url:";

/// Inert value written in place of a blanked reference
pub const BLANK_URI: &str = "about:blank";

/// Chrome user agent string sent with every resource fetch
///
/// Updated: 2025-01-29 to Chrome 132 (current stable)
///
/// Reference: https://chromiumdash.appspot.com/schedule
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";
