use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::catalog::ToolConfig;
use crate::manifest::InstallationRecord;
use crate::types::ToolSource;

use super::detect::{LiveDetection, meets_min_version};

/// Merged view of one tool: manifest record plus live detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolStatus {
    pub name: String,
    pub installed: bool,
    pub version: Option<String>,
    pub source: ToolSource,
    pub binary_paths: Vec<PathBuf>,
    pub in_manifest: bool,
    pub live_detected: bool,
    pub needs_sync: bool,
    /// False for manifest entries whose tool left the catalog.
    pub in_catalog: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meets_min_version: Option<bool>,
}

impl ToolStatus {
    /// Attach catalog facts: membership and the minimum version check.
    pub fn with_catalog_entry(mut self, tool: Option<&ToolConfig>) -> Self {
        self.in_catalog = tool.is_some();
        self.meets_min_version = match (tool.and_then(|t| t.min_version.as_deref()), &self.version) {
            (Some(min), Some(version)) => meets_min_version(version, min),
            _ => None,
        };
        self
    }

    /// Tracked in the manifest but gone from the host.
    pub fn is_missing(&self) -> bool {
        self.in_manifest && !self.live_detected
    }

    /// On the host but not tracked.
    pub fn is_untracked(&self) -> bool {
        !self.in_manifest && self.live_detected
    }
}

/// Combine what the manifest claims with what the host shows.
///
/// Neither side overwrites the other: the manifest version wins when the tool
/// is tracked, and binary paths are the union of both.
pub fn reconcile(
    name: &str,
    record: Option<&InstallationRecord>,
    live: &LiveDetection,
) -> ToolStatus {
    let in_manifest = record.is_some();
    let live_detected = live.is_detected();

    let source = match (in_manifest, live_detected) {
        (true, _) => ToolSource::GearboxManaged,
        (false, true) => ToolSource::SystemDetected,
        (false, false) => ToolSource::Unknown,
    };

    let version = record
        .map(|r| r.version.clone())
        .filter(|v| !v.is_empty())
        .or_else(|| live.version.clone());

    let mut binary_paths: Vec<PathBuf> = record
        .map(|r| r.binary_paths.clone())
        .unwrap_or_default();
    if let Some(path) = &live.binary_path {
        if !binary_paths.contains(path) {
            binary_paths.push(path.clone());
        }
    }

    ToolStatus {
        name: name.to_string(),
        installed: in_manifest || live_detected,
        version,
        source,
        binary_paths,
        in_manifest,
        live_detected,
        needs_sync: in_manifest != live_detected,
        in_catalog: false,
        meets_min_version: None,
    }
}
