//! Fluent builder for `CaptureOptions`
//!
//! Every field has a default, so `CaptureOptions::builder().build()` is a
//! valid configuration; `build` only rejects values that would make fetches
//! impossible.

use std::collections::BTreeMap;
use std::path::PathBuf;

use super::types::{CaptureOptions, ConfigError, CssRewriteMode, Policy, ResourceCategory};
use crate::utils::{
    CHROME_USER_AGENT, DEFAULT_DATA_FOLDER, DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_MAX_RESOURCE_SIZE,
};

pub struct CaptureOptionsBuilder {
    pub(crate) data_folder: PathBuf,
    pub(crate) policies: BTreeMap<ResourceCategory, Policy>,
    pub(crate) rewrite_css: CssRewriteMode,
    pub(crate) save_selection_only: bool,
    pub(crate) record_document_meta: bool,
    pub(crate) record_removed_node: bool,
    pub(crate) record_removed_attr: bool,
    pub(crate) record_source_uri: bool,
    pub(crate) record_error_uri: bool,
    pub(crate) remove_integrity: bool,
    pub(crate) save_data_uri_as_file: bool,
    pub(crate) save_file_as_data_uri: bool,
    pub(crate) save_inline_as_html: bool,
    pub(crate) fetch_timeout_secs: u64,
    pub(crate) max_resource_size: usize,
    pub(crate) user_agent: String,
}

impl Default for CaptureOptionsBuilder {
    fn default() -> Self {
        Self {
            data_folder: PathBuf::from(DEFAULT_DATA_FOLDER),
            policies: BTreeMap::new(),
            rewrite_css: CssRewriteMode::Url,
            save_selection_only: false,
            record_document_meta: true,
            record_removed_node: false,
            record_removed_attr: false,
            record_source_uri: false,
            record_error_uri: false,
            remove_integrity: true,
            save_data_uri_as_file: false,
            save_file_as_data_uri: false,
            save_inline_as_html: false,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            max_resource_size: DEFAULT_MAX_RESOURCE_SIZE,
            user_agent: CHROME_USER_AGENT.to_string(),
        }
    }
}

impl CaptureOptionsBuilder {
    #[must_use]
    pub fn data_folder(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_folder = dir.into();
        self
    }

    #[must_use]
    pub fn policy(mut self, category: ResourceCategory, policy: Policy) -> Self {
        self.policies.insert(category, policy);
        self
    }

    #[must_use]
    pub fn rewrite_css(mut self, mode: CssRewriteMode) -> Self {
        self.rewrite_css = mode;
        self
    }

    #[must_use]
    pub fn save_selection_only(mut self, enabled: bool) -> Self {
        self.save_selection_only = enabled;
        self
    }

    #[must_use]
    pub fn record_document_meta(mut self, enabled: bool) -> Self {
        self.record_document_meta = enabled;
        self
    }

    #[must_use]
    pub fn record_removed_node(mut self, enabled: bool) -> Self {
        self.record_removed_node = enabled;
        self
    }

    #[must_use]
    pub fn record_removed_attr(mut self, enabled: bool) -> Self {
        self.record_removed_attr = enabled;
        self
    }

    #[must_use]
    pub fn record_source_uri(mut self, enabled: bool) -> Self {
        self.record_source_uri = enabled;
        self
    }

    #[must_use]
    pub fn record_error_uri(mut self, enabled: bool) -> Self {
        self.record_error_uri = enabled;
        self
    }

    #[must_use]
    pub fn remove_integrity(mut self, enabled: bool) -> Self {
        self.remove_integrity = enabled;
        self
    }

    #[must_use]
    pub fn save_data_uri_as_file(mut self, enabled: bool) -> Self {
        self.save_data_uri_as_file = enabled;
        self
    }

    #[must_use]
    pub fn save_file_as_data_uri(mut self, enabled: bool) -> Self {
        self.save_file_as_data_uri = enabled;
        self
    }

    #[must_use]
    pub fn save_inline_as_html(mut self, enabled: bool) -> Self {
        self.save_inline_as_html = enabled;
        self
    }

    #[must_use]
    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.fetch_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn max_resource_size(mut self, bytes: usize) -> Self {
        self.max_resource_size = bytes;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Build the final `CaptureOptions`
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch timeout or the size limit is zero.
    pub fn build(self) -> Result<CaptureOptions, ConfigError> {
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "capture.fetchTimeout".to_string(),
                reason: "timeout must be at least one second".to_string(),
            });
        }
        if self.max_resource_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "capture.maxResourceSize".to_string(),
                reason: "size limit must be positive".to_string(),
            });
        }

        Ok(self.into_options())
    }

    fn into_options(self) -> CaptureOptions {
        CaptureOptions {
            data_folder: self.data_folder,
            policies: self.policies,
            rewrite_css: self.rewrite_css,
            save_selection_only: self.save_selection_only,
            record_document_meta: self.record_document_meta,
            record_removed_node: self.record_removed_node,
            record_removed_attr: self.record_removed_attr,
            record_source_uri: self.record_source_uri,
            record_error_uri: self.record_error_uri,
            remove_integrity: self.remove_integrity,
            save_data_uri_as_file: self.save_data_uri_as_file,
            save_file_as_data_uri: self.save_file_as_data_uri,
            save_inline_as_html: self.save_inline_as_html,
            fetch_timeout_secs: self.fetch_timeout_secs,
            max_resource_size: self.max_resource_size,
            user_agent: self.user_agent,
        }
    }
}

impl CaptureOptions {
    /// Start building a configuration from the defaults
    #[must_use]
    pub fn builder() -> CaptureOptionsBuilder {
        CaptureOptionsBuilder::default()
    }
}

impl Default for CaptureOptions {
    fn default() -> Self {
        CaptureOptionsBuilder::default().into_options()
    }
}
