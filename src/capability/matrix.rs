//! Capability matrix and descriptor resolution

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{HubError, Result};

/// The triple a cloud-browser session reports about itself
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CapabilityDescriptor {
    /// Browser name (e.g. "chrome")
    pub browser: String,
    /// Operating system (e.g. "OS X")
    pub os: String,
    /// OS version (e.g. "10.12")
    pub os_version: String,
}

/// One configured capability entry, carrying the machine id it resolves to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityEntry {
    /// Machine identifier assigned to sessions matching this entry
    pub id: String,
    /// Browser name to match
    #[serde(rename = "browserName")]
    pub browser_name: String,
    /// Operating system to match
    pub os: String,
    /// OS version to match
    pub os_version: String,
}

impl CapabilityEntry {
    fn matches(&self, descriptor: &CapabilityDescriptor) -> bool {
        self.browser_name == descriptor.browser
            && self.os == descriptor.os
            && self.os_version == descriptor.os_version
    }
}

/// Immutable list of configured capability entries
///
/// Resolution is a first-match scan; an unmatched descriptor is an explicit
/// `NoMatchingCapability`, never a panic.
#[derive(Debug, Clone, Default)]
pub struct CapabilityMatrix {
    entries: Vec<CapabilityEntry>,
}

impl CapabilityMatrix {
    /// Build a matrix from configured entries
    pub fn new(entries: Vec<CapabilityEntry>) -> Self {
        Self { entries }
    }

    /// Load a matrix from a JSON file containing an array of entries
    ///
    /// Startup-time only; a malformed file is fatal like any other startup
    /// I/O failure.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let entries: Vec<CapabilityEntry> = serde_json::from_str(&raw).map_err(|e| {
            HubError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        Ok(Self::new(entries))
    }

    /// Number of configured entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the matrix has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a descriptor to the first matching entry
    pub fn resolve(&self, descriptor: &CapabilityDescriptor) -> Result<&CapabilityEntry> {
        self.entries
            .iter()
            .find(|entry| entry.matches(descriptor))
            .ok_or(HubError::NoMatchingCapability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, browser: &str, os: &str, version: &str) -> CapabilityEntry {
        CapabilityEntry {
            id: id.into(),
            browser_name: browser.into(),
            os: os.into(),
            os_version: version.into(),
        }
    }

    fn descriptor(browser: &str, os: &str, version: &str) -> CapabilityDescriptor {
        CapabilityDescriptor {
            browser: browser.into(),
            os: os.into(),
            os_version: version.into(),
        }
    }

    #[test]
    fn test_resolve_first_match() {
        let matrix = CapabilityMatrix::new(vec![
            entry("5", "chrome", "OS X", "10.12"),
            entry("6", "chrome", "OS X", "10.12"),
        ]);

        let resolved = matrix.resolve(&descriptor("chrome", "OS X", "10.12")).unwrap();
        assert_eq!(resolved.id, "5");
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let matrix = CapabilityMatrix::new(vec![
            entry("5", "chrome", "OS X", "10.12"),
            entry("7", "firefox", "Windows", "10"),
        ]);
        let d = descriptor("firefox", "Windows", "10");

        for _ in 0..3 {
            assert_eq!(matrix.resolve(&d).unwrap().id, "7");
        }
    }

    #[test]
    fn test_resolve_requires_all_three_fields() {
        let matrix = CapabilityMatrix::new(vec![entry("5", "chrome", "OS X", "10.12")]);

        let result = matrix.resolve(&descriptor("chrome", "OS X", "10.13"));
        assert!(matches!(result, Err(HubError::NoMatchingCapability)));
    }

    #[test]
    fn test_resolve_empty_matrix() {
        let matrix = CapabilityMatrix::default();

        let result = matrix.resolve(&descriptor("chrome", "OS X", "10.12"));
        assert!(matches!(result, Err(HubError::NoMatchingCapability)));
    }

    #[test]
    fn test_entry_deserializes_browser_name_key() {
        let entry: CapabilityEntry = serde_json::from_str(
            r#"{"id":"5","browserName":"chrome","os":"OS X","os_version":"10.12"}"#,
        )
        .unwrap();

        assert_eq!(entry.browser_name, "chrome");
        assert_eq!(entry.id, "5");
    }
}
