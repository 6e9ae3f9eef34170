//! Flat option map support for `CaptureOptions`
//!
//! Options are persisted as a flat `key -> value` JSON object such as
//! `{"dataFolder": "Archive", "capture.image": "link"}`. Unknown keys are
//! ignored and invalid values leave the current setting untouched, so a
//! stale or partial options file never prevents a capture.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use super::types::{CaptureOptions, ConfigError, CssRewriteMode, Policy, ResourceCategory};

const CAPTURE_PREFIX: &str = "capture.";

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_u64().map(|n| n != 0),
        _ => None,
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_str(value: &Value) -> Option<&str> {
    value.as_str()
}

impl CaptureOptions {
    /// Build options from a flat map, starting from the defaults.
    #[must_use]
    pub fn from_flat_map(map: &Map<String, Value>) -> Self {
        let mut options = Self::default();
        options.apply_flat_map(map);
        options
    }

    /// Overlay every entry of a flat map onto these options.
    pub fn apply_flat_map(&mut self, map: &Map<String, Value>) {
        for (key, value) in map {
            if let Err(e) = self.apply_setting(key, value) {
                log::warn!("Ignoring option: {e}");
            }
        }
    }

    /// Apply one flat-map entry.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` when the value has the wrong shape
    /// for a known key. Unknown keys are skipped.
    pub fn apply_setting(&mut self, key: &str, value: &Value) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("{reason}, got {value}"),
        };

        if key == "dataFolder" {
            let dir = as_str(value).ok_or_else(|| invalid("expected a path string"))?;
            self.data_folder = PathBuf::from(dir);
            return Ok(());
        }

        let Some(name) = key.strip_prefix(CAPTURE_PREFIX) else {
            log::debug!("Skipping unknown option key: {key}");
            return Ok(());
        };

        if let Some(category) = ResourceCategory::from_key(name) {
            let policy = as_str(value)
                .and_then(Policy::parse)
                .ok_or_else(|| invalid("expected save, link, blank, remove or comment"))?;
            self.policies.insert(category, policy);
            return Ok(());
        }

        let flag = |target: &mut bool| -> Result<(), ConfigError> {
            *target = as_bool(value).ok_or_else(|| invalid("expected a boolean"))?;
            Ok(())
        };

        match name {
            "rewriteCss" => {
                self.rewrite_css = as_str(value)
                    .and_then(CssRewriteMode::parse)
                    .ok_or_else(|| invalid("expected url or none"))?;
            }
            "saveSelectionOnly" => flag(&mut self.save_selection_only)?,
            "recordDocumentMeta" => flag(&mut self.record_document_meta)?,
            "recordRemovedNode" => flag(&mut self.record_removed_node)?,
            "recordRemovedAttr" => flag(&mut self.record_removed_attr)?,
            "recordSourceUri" => flag(&mut self.record_source_uri)?,
            "recordErrorUri" => flag(&mut self.record_error_uri)?,
            "removeIntegrity" => flag(&mut self.remove_integrity)?,
            "saveDataUriAsFile" => flag(&mut self.save_data_uri_as_file)?,
            "saveFileAsDataUri" => flag(&mut self.save_file_as_data_uri)?,
            "saveInlineAsHtml" => flag(&mut self.save_inline_as_html)?,
            "fetchTimeout" => {
                self.fetch_timeout_secs = as_u64(value)
                    .filter(|secs| *secs > 0)
                    .ok_or_else(|| invalid("expected a positive number of seconds"))?;
            }
            "maxResourceSize" => {
                self.max_resource_size = as_u64(value)
                    .and_then(|n| usize::try_from(n).ok())
                    .filter(|n| *n > 0)
                    .ok_or_else(|| invalid("expected a positive byte count"))?;
            }
            "userAgent" => {
                self.user_agent = as_str(value)
                    .ok_or_else(|| invalid("expected a string"))?
                    .to_string();
            }
            _ => log::debug!("Skipping unknown option key: {key}"),
        }
        Ok(())
    }

    /// Render the effective options as a flat map, every category included.
    #[must_use]
    pub fn to_flat_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(
            "dataFolder".to_string(),
            Value::String(self.data_folder.to_string_lossy().into_owned()),
        );
        for category in ResourceCategory::ALL {
            map.insert(
                format!("{CAPTURE_PREFIX}{}", category.key()),
                Value::String(self.policy(category).as_str().to_string()),
            );
        }
        let rewrite = match self.rewrite_css {
            CssRewriteMode::Url => "url",
            CssRewriteMode::None => "none",
        };
        map.insert("capture.rewriteCss".to_string(), Value::String(rewrite.to_string()));
        for (key, flag) in [
            ("saveSelectionOnly", self.save_selection_only),
            ("recordDocumentMeta", self.record_document_meta),
            ("recordRemovedNode", self.record_removed_node),
            ("recordRemovedAttr", self.record_removed_attr),
            ("recordSourceUri", self.record_source_uri),
            ("recordErrorUri", self.record_error_uri),
            ("removeIntegrity", self.remove_integrity),
            ("saveDataUriAsFile", self.save_data_uri_as_file),
            ("saveFileAsDataUri", self.save_file_as_data_uri),
            ("saveInlineAsHtml", self.save_inline_as_html),
        ] {
            map.insert(format!("{CAPTURE_PREFIX}{key}"), Value::Bool(flag));
        }
        map.insert(
            "capture.fetchTimeout".to_string(),
            Value::from(self.fetch_timeout_secs),
        );
        map.insert(
            "capture.maxResourceSize".to_string(),
            Value::from(self.max_resource_size as u64),
        );
        map.insert(
            "capture.userAgent".to_string(),
            Value::String(self.user_agent.clone()),
        );
        map
    }

    /// Load options from a JSON file holding a flat map.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read, is not JSON, or is not an object.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match serde_json::from_str::<Value>(&text)? {
            Value::Object(map) => Ok(Self::from_flat_map(&map)),
            _ => Err(ConfigError::NotAnObject),
        }
    }
}
