//! Manifest types for recorded install state.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::InstallMethod;

/// Manifest format version written by this build.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Durable record of what gearbox installed on this host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: u32,

    #[serde(default)]
    pub installations: BTreeMap<String, InstallationRecord>,
}

impl Manifest {
    /// Create a new empty manifest at the current schema version
    pub fn new() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            installations: BTreeMap::new(),
        }
    }

    /// Add or replace an installation record
    pub fn add(&mut self, name: impl Into<String>, record: InstallationRecord) {
        self.installations.insert(name.into(), record);
    }

    /// Remove an installation record
    pub fn remove(&mut self, name: &str) -> Option<InstallationRecord> {
        self.installations.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&InstallationRecord> {
        self.installations.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.installations.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.installations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.installations.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.installations.keys().map(String::as_str)
    }
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

/// A single installed tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationRecord {
    pub method: InstallMethod,

    /// Version detected right after the install, or "unknown"
    pub version: String,

    pub installed_at: DateTime<Utc>,

    #[serde(default)]
    pub binary_paths: Vec<PathBuf>,

    /// Build variant used for source builds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_type: Option<String>,

    /// False when the tool was only pulled in as someone's dependency
    #[serde(default = "default_explicit")]
    pub explicit: bool,

    /// Catalog dependencies at install time
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

fn default_explicit() -> bool {
    true
}

impl InstallationRecord {
    pub fn new(method: InstallMethod, version: impl Into<String>) -> Self {
        Self {
            method,
            version: version.into(),
            installed_at: Utc::now(),
            binary_paths: Vec::new(),
            build_type: None,
            explicit: true,
            dependencies: Vec::new(),
        }
    }

    /// Record for a tool found on the host rather than built by gearbox
    pub fn pre_existing(version: impl Into<String>, binary_paths: Vec<PathBuf>) -> Self {
        Self {
            binary_paths,
            ..Self::new(InstallMethod::PreExisting, version)
        }
    }

    pub fn with_binary_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.binary_paths = paths;
        self
    }

    pub fn with_build_type(mut self, build_type: impl Into<String>) -> Self {
        self.build_type = Some(build_type.into());
        self
    }

    pub fn with_explicit(mut self, explicit: bool) -> Self {
        self.explicit = explicit;
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn is_pre_existing(&self) -> bool {
        self.method == InstallMethod::PreExisting
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_record_loads_with_defaults() {
        let json = r#"{
            "schema_version": 1,
            "installations": {
                "fd": {
                    "method": "source_build",
                    "version": "10.1.0",
                    "installed_at": "2024-05-01T10:00:00Z",
                    "binary_paths": ["/usr/local/bin/fd"]
                }
            }
        }"#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        let fd = manifest.get("fd").unwrap();
        assert!(fd.explicit);
        assert!(fd.dependencies.is_empty());
        assert_eq!(fd.build_type, None);
        assert_eq!(fd.binary_paths, vec![PathBuf::from("/usr/local/bin/fd")]);
    }

    #[test]
    fn add_and_remove() {
        let mut manifest = Manifest::new();
        manifest.add("bat", InstallationRecord::new(InstallMethod::SourceBuild, "0.24.0"));
        assert!(manifest.contains("bat"));
        assert_eq!(manifest.len(), 1);
        assert!(manifest.remove("bat").is_some());
        assert!(manifest.is_empty());
    }
}
