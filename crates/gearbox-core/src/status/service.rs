use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::{GearboxError, Result};
use crate::manifest::{InstallationRecord, Manifest, ManifestStore};

use super::detect::{Detector, LiveDetection, SystemDetector};
use super::reconcile::{ToolStatus, reconcile};

/// Outcome of adopting live-detected tools into the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Tools recorded as pre-existing by this sync.
    pub added: Vec<String>,
    /// Manifest entries that are no longer on the host. Left untouched.
    pub untracked_missing: Vec<String>,
    /// Backup taken before writing, if anything was written.
    pub backup: Option<String>,
}

impl SyncReport {
    pub fn changed(&self) -> bool {
        !self.added.is_empty()
    }
}

/// Summary counts for quick overview
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub total: usize,
    pub installed: usize,
    pub needs_sync: usize,
    pub stale: usize,
}

impl StatusSummary {
    pub fn from_statuses(statuses: &[ToolStatus]) -> Self {
        Self {
            total: statuses.len(),
            installed: statuses.iter().filter(|s| s.installed).count(),
            needs_sync: statuses.iter().filter(|s| s.needs_sync).count(),
            stale: statuses.iter().filter(|s| !s.in_catalog).count(),
        }
    }
}

/// Reconciles the manifest with what is actually on the host.
pub struct StatusService<'a, D: Detector = SystemDetector> {
    catalog: &'a Catalog,
    store: ManifestStore,
    detector: D,
}

impl<'a, D: Detector> StatusService<'a, D> {
    pub fn new(catalog: &'a Catalog, store: ManifestStore, detector: D) -> Self {
        Self {
            catalog,
            store,
            detector,
        }
    }

    pub fn store(&self) -> &ManifestStore {
        &self.store
    }

    /// Status of a single tool from the catalog or the manifest.
    pub fn get_tool_status(&self, name: &str) -> Result<ToolStatus> {
        let manifest = self.store.load()?;
        let tool = self.catalog.tool(name);
        if tool.is_none() && !manifest.contains(name) {
            return Err(GearboxError::UnknownTool(name.to_string()));
        }
        Ok(self.status_for(name, &manifest))
    }

    /// Every catalog tool in catalog order, followed by stale manifest entries.
    pub fn get_all_tools_status(&self) -> Result<Vec<ToolStatus>> {
        let manifest = self.store.load()?;
        let mut statuses: Vec<ToolStatus> = self
            .catalog
            .tools()
            .iter()
            .map(|tool| self.status_for(&tool.name, &manifest))
            .collect();

        for name in manifest.names() {
            if !self.catalog.contains_tool(name) {
                tracing::warn!(tool = %name, "Manifest entry is not in the catalog");
                statuses.push(self.status_for(name, &manifest));
            }
        }
        Ok(statuses)
    }

    /// Record live-only catalog tools as pre-existing installations.
    ///
    /// Never removes manifest entries; tracked tools missing from the host
    /// are reported instead.
    pub fn sync_manifest_with_system(&self) -> Result<SyncReport> {
        let mut manifest = self.store.load()?;
        let mut report = SyncReport::default();

        for tool in self.catalog.tools() {
            let live = self.detector.detect(tool);
            match (manifest.contains(&tool.name), live.binary_path) {
                (false, Some(path)) => {
                    let version = live.version.unwrap_or_else(|| "unknown".to_string());
                    tracing::info!(tool = %tool.name, %version, "Adopting pre-existing tool");
                    manifest.add(
                        tool.name.clone(),
                        InstallationRecord::pre_existing(version, vec![path]),
                    );
                    report.added.push(tool.name.clone());
                }
                (true, None) => {
                    tracing::warn!(tool = %tool.name, "Tracked tool not found on the host");
                    report.untracked_missing.push(tool.name.clone());
                }
                _ => {}
            }
        }

        if report.changed() {
            report.backup = self.store.backup(Some("pre-sync"))?;
            self.store.save(&manifest)?;
        }
        Ok(report)
    }

    fn status_for(&self, name: &str, manifest: &Manifest) -> ToolStatus {
        let tool = self.catalog.tool(name);
        let live = match tool {
            Some(tool) => self.detector.detect(tool),
            None => LiveDetection::not_found(),
        };
        let status = reconcile(name, manifest.get(name), &live).with_catalog_entry(tool);
        if status.needs_sync {
            tracing::debug!(
                tool = %name,
                in_manifest = status.in_manifest,
                live_detected = status.live_detected,
                "Manifest and host disagree"
            );
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use super::*;
    use crate::catalog::test_support::tool;
    use crate::types::{InstallMethod, ToolSource};
    use tempfile::TempDir;

    struct FakeDetector(HashMap<String, LiveDetection>);

    impl Detector for FakeDetector {
        fn detect(&self, tool: &crate::catalog::ToolConfig) -> LiveDetection {
            self.0.get(&tool.name).cloned().unwrap_or_default()
        }
    }

    fn setup(live: &[(&str, &str)]) -> (TempDir, Catalog, ManifestStore, FakeDetector) {
        let temp = TempDir::new().unwrap();
        let catalog = Catalog::from_parts(
            "standard".to_string(),
            vec![tool("ripgrep", &[]), tool("fd", &[]), tool("bat", &[])],
            vec![],
        )
        .unwrap();
        let store = ManifestStore::new(temp.path().join("manifest.json"), temp.path().join("backups"));
        let detector = FakeDetector(
            live.iter()
                .map(|(name, version)| {
                    (
                        name.to_string(),
                        LiveDetection::found(
                            PathBuf::from(format!("/usr/bin/{}", name)),
                            Some(version.to_string()),
                        ),
                    )
                })
                .collect(),
        );
        (temp, catalog, store, detector)
    }

    #[test]
    fn unknown_name_is_rejected() {
        let (_temp, catalog, store, detector) = setup(&[]);
        let service = StatusService::new(&catalog, store, detector);
        assert!(matches!(
            service.get_tool_status("nope"),
            Err(GearboxError::UnknownTool(_))
        ));
    }

    #[test]
    fn stale_manifest_entries_are_surfaced() {
        let (_temp, catalog, store, detector) = setup(&[]);
        let mut manifest = Manifest::new();
        manifest.add("retired", InstallationRecord::new(InstallMethod::SourceBuild, "1.0.0"));
        store.save(&manifest).unwrap();

        let service = StatusService::new(&catalog, store, detector);
        let statuses = service.get_all_tools_status().unwrap();
        assert_eq!(statuses.len(), 4);
        let stale = statuses.last().unwrap();
        assert_eq!(stale.name, "retired");
        assert!(!stale.in_catalog);
        assert!(stale.needs_sync);
        assert_eq!(StatusSummary::from_statuses(&statuses).stale, 1);
    }

    #[test]
    fn sync_adopts_live_tools_only() {
        let (_temp, catalog, store, detector) = setup(&[("fd", "9.0.0")]);
        let mut manifest = Manifest::new();
        manifest.add("bat", InstallationRecord::new(InstallMethod::SourceBuild, "0.24.0"));
        store.save(&manifest).unwrap();

        let service = StatusService::new(&catalog, store, detector);
        let report = service.sync_manifest_with_system().unwrap();
        assert_eq!(report.added, vec!["fd"]);
        assert_eq!(report.untracked_missing, vec!["bat"]);
        assert!(report.backup.is_some());

        let manifest = service.store().load().unwrap();
        assert!(manifest.contains("bat"));
        assert_eq!(manifest.get("fd").unwrap().method, InstallMethod::PreExisting);

        let status = service.get_tool_status("fd").unwrap();
        assert_eq!(status.source, ToolSource::GearboxManaged);
        assert!(!status.needs_sync);
    }

    #[test]
    fn sync_without_changes_writes_nothing() {
        let (_temp, catalog, store, detector) = setup(&[]);
        let service = StatusService::new(&catalog, store, detector);
        let report = service.sync_manifest_with_system().unwrap();
        assert!(!report.changed());
        assert!(!service.store().exists());
        assert!(service.store().list_backups().unwrap().is_empty());
    }
}
