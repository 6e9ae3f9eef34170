use std::fmt;

use serde::{Deserialize, Serialize};

/// Session identifier: capture start time as `yyyyMMddHHmmssSSS` (UTC).
///
/// Doubles as the archive directory name and as the infix of the audit
/// attributes (`data-sb-<key>-...`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    /// Key for a capture starting now
    #[must_use]
    pub fn new() -> Self {
        Self(chrono::Utc::now().format("%Y%m%d%H%M%S%3f").to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_shape() {
        let key = SessionKey::new();
        assert_eq!(key.as_str().len(), 17);
        assert!(key.as_str().chars().all(|c| c.is_ascii_digit()));
    }
}
