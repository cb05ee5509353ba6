use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GearboxError, Result};
use crate::manifest::ManifestStore;

use super::plan::UninstallPlan;

const DEFAULT_BACKUP_SUFFIX: &str = "pre-uninstall";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UninstallOptions {
    /// Suffix for the backup name; `pre-uninstall` when unset.
    pub backup_suffix: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UninstallReport {
    pub removed: Vec<String>,
    pub deleted_paths: Vec<PathBuf>,
    pub backup: Option<String>,
    pub warnings: Vec<String>,
}

impl UninstallReport {
    pub fn changed(&self) -> bool {
        !self.removed.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct UninstallExecutor {
    store: ManifestStore,
}

impl UninstallExecutor {
    pub fn new(store: ManifestStore) -> Self {
        Self { store }
    }

    pub fn execute(&self, plan: &UninstallPlan, options: &UninstallOptions) -> Result<UninstallReport> {
        if plan.blocked {
            return Err(GearboxError::UninstallBlocked {
                targets: plan.requested().into_iter().map(str::to_string).collect(),
                dependents: plan.dependents.clone(),
            });
        }

        let mut report = UninstallReport {
            warnings: plan.warnings.clone(),
            ..Default::default()
        };
        if plan.is_empty() {
            return Ok(report);
        }

        if plan.backup {
            let suffix = options.backup_suffix.as_deref().unwrap_or(DEFAULT_BACKUP_SUFFIX);
            report.backup = self.store.backup(Some(suffix))?;
        }

        for path in plan.paths() {
            match remove_path_if_exists(path) {
                Ok(true) => report.deleted_paths.push(path.clone()),
                Ok(false) => {
                    tracing::debug!(path = %path.display(), "Already gone");
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Could not delete");
                    report.warnings.push(e.to_string());
                }
            }
        }

        let mut manifest = self.store.load()?;
        for name in plan.tools() {
            if manifest.remove(name).is_some() {
                tracing::info!(tool = %name, "Uninstalled");
                report.removed.push(name.to_string());
            }
        }
        if report.changed() {
            self.store.save(&manifest)?;
        }
        Ok(report)
    }
}

/// Delete a file, symlink or directory. Returns false when nothing was there.
pub fn remove_path_if_exists(path: &Path) -> Result<bool> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => {
            return Err(GearboxError::io(
                format!("Failed to read metadata: {}", path.display()),
                e,
            ));
        }
    };
    if metadata.is_dir() {
        std::fs::remove_dir_all(path).map_err(|e| {
            GearboxError::io(format!("Failed to remove directory: {}", path.display()), e)
        })?;
    } else {
        std::fs::remove_file(path).map_err(|e| {
            GearboxError::io(format!("Failed to remove file: {}", path.display()), e)
        })?;
    }
    Ok(true)
}
