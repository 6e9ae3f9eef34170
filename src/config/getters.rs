//! Getter methods for `CaptureOptions`

use std::path::Path;
use std::time::Duration;

use super::types::{CaptureOptions, CssRewriteMode, Policy, ResourceCategory};

impl CaptureOptions {
    #[must_use]
    pub fn data_folder(&self) -> &Path {
        &self.data_folder
    }

    /// Effective policy for a category.
    ///
    /// Falls back to the category default when unset, and maps `comment` to
    /// `remove` for categories that only govern attributes.
    #[must_use]
    pub fn policy(&self, category: ResourceCategory) -> Policy {
        let policy = self
            .policies
            .get(&category)
            .copied()
            .unwrap_or_else(|| category.default_policy());
        if policy == Policy::Comment && !category.supports_comment() {
            Policy::Remove
        } else {
            policy
        }
    }

    #[must_use]
    pub fn rewrite_css(&self) -> CssRewriteMode {
        self.rewrite_css
    }

    #[must_use]
    pub fn save_selection_only(&self) -> bool {
        self.save_selection_only
    }

    #[must_use]
    pub fn record_document_meta(&self) -> bool {
        self.record_document_meta
    }

    #[must_use]
    pub fn record_removed_node(&self) -> bool {
        self.record_removed_node
    }

    #[must_use]
    pub fn record_removed_attr(&self) -> bool {
        self.record_removed_attr
    }

    #[must_use]
    pub fn record_source_uri(&self) -> bool {
        self.record_source_uri
    }

    #[must_use]
    pub fn record_error_uri(&self) -> bool {
        self.record_error_uri
    }

    #[must_use]
    pub fn remove_integrity(&self) -> bool {
        self.remove_integrity
    }

    #[must_use]
    pub fn save_data_uri_as_file(&self) -> bool {
        self.save_data_uri_as_file
    }

    #[must_use]
    pub fn save_file_as_data_uri(&self) -> bool {
        self.save_file_as_data_uri
    }

    #[must_use]
    pub fn save_inline_as_html(&self) -> bool {
        self.save_inline_as_html
    }

    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    #[must_use]
    pub fn max_resource_size(&self) -> usize {
        self.max_resource_size
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}
