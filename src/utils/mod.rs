pub mod constants;
pub mod encoding;
pub mod filename;
pub mod headers;
pub mod string_utils;
pub mod url_utils;

pub use constants::*;
pub use filename::{FilenameCandidate, validate_filename};
pub use url_utils::{absolutize, get_error_url, resolve_url, split_url_by_anchor, url_to_filename};
