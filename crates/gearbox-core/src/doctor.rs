//! Health checks over the manifest, the host and the build scripts.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::context::AppContext;
use crate::status::{Detector, StatusService};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckLevel {
    Ok,
    Warn,
    Error,
}

impl fmt::Display for CheckLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("ok"),
            Self::Warn => f.write_str("warn"),
            Self::Error => f.write_str("error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorCheck {
    pub name: String,
    pub level: CheckLevel,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorReport {
    pub checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    pub fn has_errors(&self) -> bool {
        self.checks.iter().any(|c| c.level == CheckLevel::Error)
    }

    pub fn warnings(&self) -> usize {
        self.checks.iter().filter(|c| c.level == CheckLevel::Warn).count()
    }

    pub fn get(&self, name: &str) -> Option<&DoctorCheck> {
        self.checks.iter().find(|c| c.name == name)
    }

    fn push(&mut self, name: &str, level: CheckLevel, message: impl Into<String>) {
        self.checks.push(DoctorCheck {
            name: name.to_string(),
            level,
            message: message.into(),
        });
    }
}

pub fn run(ctx: &AppContext, catalog: &Catalog) -> DoctorReport {
    run_with(&ctx.status_service(catalog), catalog, ctx.scripts_dir())
}

pub fn run_with<D: Detector>(
    status: &StatusService<'_, D>,
    catalog: &Catalog,
    scripts_dir: &Path,
) -> DoctorReport {
    let mut report = DoctorReport::default();
    let store = status.store();

    let manifest = match store.load() {
        Ok(manifest) => {
            report.push(
                "manifest",
                CheckLevel::Ok,
                format!("{} tools tracked in {}", manifest.len(), store.path().display()),
            );
            Some(manifest)
        }
        Err(e) => {
            report.push("manifest", CheckLevel::Error, e.to_string());
            None
        }
    };

    match store.list_backups() {
        Ok(backups) if backups.is_empty() => {
            report.push("backups", CheckLevel::Ok, "No backups yet");
        }
        Ok(backups) => report.push(
            "backups",
            CheckLevel::Ok,
            format!("{} backups in {}", backups.len(), store.backups_dir().display()),
        ),
        Err(e) => report.push("backups", CheckLevel::Warn, e.to_string()),
    }

    if let Some(manifest) = &manifest {
        check_statuses(&mut report, status);

        let missing: Vec<String> = manifest
            .installations
            .iter()
            .flat_map(|(name, record)| {
                record
                    .binary_paths
                    .iter()
                    .filter(|path| !path.exists())
                    .map(move |path| format!("{} ({})", name, path.display()))
            })
            .collect();
        if missing.is_empty() {
            report.push("binary-paths", CheckLevel::Ok, "All recorded binaries exist");
        } else {
            report.push(
                "binary-paths",
                CheckLevel::Warn,
                format!("Recorded binaries missing: {}", missing.join(", ")),
            );
        }
    }

    check_scripts(&mut report, catalog, scripts_dir);

    tracing::debug!(
        checks = report.checks.len(),
        warnings = report.warnings(),
        errors = report.has_errors(),
        "Doctor finished"
    );
    report
}

fn check_statuses<D: Detector>(report: &mut DoctorReport, status: &StatusService<'_, D>) {
    let statuses = match status.get_all_tools_status() {
        Ok(statuses) => statuses,
        Err(e) => {
            report.push("drift", CheckLevel::Error, e.to_string());
            return;
        }
    };

    let drift: Vec<&str> = statuses
        .iter()
        .filter(|s| s.in_catalog && s.needs_sync)
        .map(|s| s.name.as_str())
        .collect();
    if drift.is_empty() {
        report.push("drift", CheckLevel::Ok, "Manifest matches the host");
    } else {
        report.push(
            "drift",
            CheckLevel::Warn,
            format!("{} tools out of sync: {}", drift.len(), drift.join(", ")),
        );
    }

    let stale: Vec<&str> = statuses
        .iter()
        .filter(|s| !s.in_catalog)
        .map(|s| s.name.as_str())
        .collect();
    if stale.is_empty() {
        report.push("stale", CheckLevel::Ok, "No stale manifest entries");
    } else {
        report.push(
            "stale",
            CheckLevel::Warn,
            format!("Tracked tools missing from the catalog: {}", stale.join(", ")),
        );
    }

    let outdated: Vec<String> = statuses
        .iter()
        .filter(|s| s.meets_min_version == Some(false))
        .map(|s| format!("{} {}", s.name, s.version.as_deref().unwrap_or("?")))
        .collect();
    if outdated.is_empty() {
        report.push("min-version", CheckLevel::Ok, "No tools below their minimum version");
    } else {
        report.push(
            "min-version",
            CheckLevel::Warn,
            format!("Below minimum version: {}", outdated.join(", ")),
        );
    }
}

fn check_scripts(report: &mut DoctorReport, catalog: &Catalog, scripts_dir: &Path) {
    if !scripts_dir.is_dir() {
        report.push(
            "scripts",
            CheckLevel::Error,
            format!("Scripts directory not found: {}", scripts_dir.display()),
        );
        return;
    }
    let missing: Vec<&str> = catalog
        .tools()
        .iter()
        .filter(|tool| !scripts_dir.join(format!("install-{}.sh", tool.name)).is_file())
        .map(|tool| tool.name.as_str())
        .collect();
    if missing.is_empty() {
        report.push("scripts", CheckLevel::Ok, "Every catalog tool has a build script");
    } else {
        report.push(
            "scripts",
            CheckLevel::Warn,
            format!("No build script for: {}", missing.join(", ")),
        );
    }
}
