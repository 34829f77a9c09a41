//! Configuration provider for Preflight
//!
//! The probe core only needs a flat mapping from string keys to string
//! values. Values come from the process environment, optionally overlaid on
//! a dotenv-style file. Absent keys read as unset rather than erroring, and
//! values are cleaned on read: trailing inline `# comment` text is stripped
//! and a value that is empty after cleaning counts as unset.

use crate::{CoreError, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Flat key → value configuration map
#[derive(Debug, Clone, Default)]
pub struct ConfigMap {
    values: HashMap<String, String>,
}

impl ConfigMap {
    /// Empty map, mainly useful in tests
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the process environment
    pub fn from_env() -> Self {
        Self {
            values: std::env::vars().collect(),
        }
    }

    /// Build from a dotenv-style file, overlaid with the process
    /// environment (a variable set in the environment wins over the file)
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read_to_string(&path).map_err(|e| {
            CoreError::ConfigurationError(format!(
                "Failed to read env file {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;
        let mut map = Self::parse_env_str(&data);
        map.values.extend(std::env::vars());
        Ok(map)
    }

    /// Parse `KEY=VALUE` lines; `#` lines and blanks are ignored and
    /// surrounding quotes are stripped from values
    pub fn parse_env_str(input: &str) -> Self {
        let mut values = HashMap::new();
        for line in input.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim().trim_start_matches("export ").trim();
            if key.is_empty() {
                continue;
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            values.insert(key.to_string(), value.to_string());
        }
        Self { values }
    }

    /// Set a value programmatically (tests, overrides)
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Cleaned value for a key; `None` when unset or empty after cleaning
    pub fn get(&self, key: &str) -> Option<&str> {
        let raw = self.values.get(key)?;
        // Strip inline comments ("value  # comment" → "value")
        let cleaned = raw.split('#').next().unwrap_or("").trim();
        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned)
        }
    }

    /// Cleaned value or a default
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Whether a key holds a non-empty value
    pub fn is_set(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_key_is_unset() {
        let map = ConfigMap::new();
        assert_eq!(map.get("ADGUARD_HOST"), None);
        assert!(!map.is_set("ADGUARD_HOST"));
        assert_eq!(map.get_or("ADGUARD_PORT", "443"), "443");
    }

    #[test]
    fn test_inline_comment_stripped() {
        let mut map = ConfigMap::new();
        map.set("SNMP_COMMUNITY", "public  # default community");
        assert_eq!(map.get("SNMP_COMMUNITY"), Some("public"));
    }

    #[test]
    fn test_empty_value_counts_as_unset() {
        let mut map = ConfigMap::new();
        map.set("PFSENSE_HOST", "");
        map.set("UNIFI_HOST", "   # only a comment");
        assert!(!map.is_set("PFSENSE_HOST"));
        assert!(!map.is_set("UNIFI_HOST"));
    }

    #[test]
    fn test_parse_env_str() {
        let map = ConfigMap::parse_env_str(
            r#"
            # homelab credentials
            ADGUARD_HOST=10.0.0.2
            ADGUARD_USERNAME="admin"
            ADGUARD_PASSWORD='hunter2'
            export UNIFI_HOST=10.0.0.3

            not a pair
            "#,
        );
        assert_eq!(map.get("ADGUARD_HOST"), Some("10.0.0.2"));
        assert_eq!(map.get("ADGUARD_USERNAME"), Some("admin"));
        assert_eq!(map.get("ADGUARD_PASSWORD"), Some("hunter2"));
        assert_eq!(map.get("UNIFI_HOST"), Some("10.0.0.3"));
        assert_eq!(map.get("not a pair"), None);
    }

    #[test]
    fn test_missing_env_file_errors() {
        let err = ConfigMap::from_env_file("/nonexistent/.env").unwrap_err();
        assert!(err.to_string().contains("Failed to read env file"));
    }
}
