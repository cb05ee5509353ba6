//! Side-effect-free uninstall planning.

use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::{GearboxError, Result};
use crate::manifest::Manifest;
use crate::planner::expand_bundle;
use crate::types::SafetyLevel;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UninstallRequest {
    /// Tool or bundle names.
    pub targets: Vec<String>,
    pub safety_level: SafetyLevel,
    /// Also remove dependencies orphaned by the removal.
    pub cascade: bool,
    /// Remove even when installed tools still depend on a target.
    pub force: bool,
    pub backup: bool,
}

impl UninstallRequest {
    pub fn new(targets: Vec<String>) -> Self {
        Self {
            targets,
            safety_level: SafetyLevel::default(),
            cascade: false,
            force: false,
            backup: true,
        }
    }

    pub fn with_safety_level(mut self, level: SafetyLevel) -> Self {
        self.safety_level = level;
        self
    }

    pub fn with_cascade(mut self, cascade: bool) -> Self {
        self.cascade = cascade;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_backup(mut self, backup: bool) -> Self {
        self.backup = backup;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RemovalReason {
    Requested,
    /// Dependency no longer needed by anything that stays installed.
    Orphaned { required_by: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedRemoval {
    pub name: String,
    pub reason: RemovalReason,
    /// Recorded binary paths that will be deleted.
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UninstallPlan {
    pub removals: Vec<PlannedRemoval>,
    /// Installed tools that depend on a removal target.
    pub dependents: Vec<String>,
    pub blocked: bool,
    pub backup: bool,
    pub safety_level: SafetyLevel,
    pub warnings: Vec<String>,
}

impl UninstallPlan {
    pub fn tools(&self) -> Vec<&str> {
        self.removals.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.removals.iter().flat_map(|r| r.paths.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.removals.is_empty()
    }

    pub fn requested(&self) -> Vec<&str> {
        self.removals
            .iter()
            .filter(|r| r.reason == RemovalReason::Requested)
            .map(|r| r.name.as_str())
            .collect()
    }
}

pub struct UninstallPlanner<'a> {
    catalog: &'a Catalog,
    manifest: &'a Manifest,
}

impl<'a> UninstallPlanner<'a> {
    pub fn new(catalog: &'a Catalog, manifest: &'a Manifest) -> Self {
        Self { catalog, manifest }
    }

    pub fn plan(&self, request: &UninstallRequest) -> Result<UninstallPlan> {
        let mut warnings = Vec::new();
        let targets = self.resolve_targets(&request.targets, &mut warnings)?;

        let dependents = self.reverse_dependencies(&targets);
        let blocked = !dependents.is_empty() && !request.cascade && !request.force;
        if !dependents.is_empty() && !blocked {
            warnings.push(format!(
                "Installed tools will lose a dependency: {}",
                dependents.join(", ")
            ));
        }

        let mut removals: Vec<PlannedRemoval> = targets
            .iter()
            .map(|name| PlannedRemoval {
                name: name.clone(),
                reason: RemovalReason::Requested,
                paths: Vec::new(),
            })
            .collect();
        if request.cascade && !blocked {
            removals.extend(self.orphaned_dependencies(&targets, request.safety_level, &mut warnings));
        }

        for removal in &mut removals {
            let Some(record) = self.manifest.get(&removal.name) else {
                continue;
            };
            if record.is_pre_existing() && request.safety_level != SafetyLevel::Aggressive {
                warnings.push(format!(
                    "'{}' was not installed by gearbox; its files are left in place",
                    removal.name
                ));
                continue;
            }
            removal.paths = record.binary_paths.clone();
        }

        if blocked {
            tracing::warn!(
                targets = %targets.join(", "),
                dependents = %dependents.join(", "),
                "Uninstall blocked by installed dependents"
            );
        }

        Ok(UninstallPlan {
            removals,
            dependents,
            blocked,
            backup: request.backup,
            safety_level: request.safety_level,
            warnings,
        })
    }

    /// Installed tool names for the requested targets, bundles expanded.
    fn resolve_targets(&self, requested: &[String], warnings: &mut Vec<String>) -> Result<Vec<String>> {
        let mut targets: Vec<String> = Vec::new();
        for name in requested {
            let members = if self.manifest.contains(name) || self.catalog.contains_tool(name) {
                vec![name.clone()]
            } else if self.catalog.bundle(name).is_some() {
                expand_bundle(self.catalog, name)?
            } else {
                return Err(GearboxError::UnknownTool(name.clone()));
            };

            for member in members {
                if !self.manifest.contains(&member) {
                    warnings.push(format!("'{}' is not installed", member));
                } else if !targets.contains(&member) {
                    targets.push(member);
                }
            }
        }
        Ok(targets)
    }

    /// Dependencies recorded at install time, or the catalog's for older records.
    fn dependencies_of(&self, name: &str) -> Vec<String> {
        match self.manifest.get(name) {
            Some(record) if !record.dependencies.is_empty() => record.dependencies.clone(),
            _ => self
                .catalog
                .tool(name)
                .map(|tool| tool.dependencies.clone())
                .unwrap_or_default(),
        }
    }

    /// Installed tools outside `targets` that transitively depend on one of them.
    fn reverse_dependencies(&self, targets: &[String]) -> Vec<String> {
        let mut affected: HashSet<&str> = targets.iter().map(String::as_str).collect();
        let mut dependents = BTreeSet::new();
        loop {
            let mut grew = false;
            for name in self.manifest.names() {
                if affected.contains(name) {
                    continue;
                }
                if self
                    .dependencies_of(name)
                    .iter()
                    .any(|dep| affected.contains(dep.as_str()))
                {
                    affected.insert(name);
                    dependents.insert(name.to_string());
                    grew = true;
                }
            }
            if !grew {
                break;
            }
        }
        dependents.into_iter().collect()
    }

    fn orphaned_dependencies(
        &self,
        targets: &[String],
        level: SafetyLevel,
        warnings: &mut Vec<String>,
    ) -> Vec<PlannedRemoval> {
        let bundled = self.installed_bundle_members();
        let mut removal: BTreeSet<String> = targets.iter().cloned().collect();
        let mut queue: Vec<String> = targets.to_vec();
        let mut kept: BTreeSet<String> = BTreeSet::new();
        let mut cascaded = Vec::new();

        while let Some(current) = queue.pop() {
            for dep in self.dependencies_of(&current) {
                if removal.contains(&dep) || kept.contains(&dep) || !self.manifest.contains(&dep) {
                    continue;
                }
                if !self.is_orphaned(&dep, &removal) {
                    continue;
                }

                let in_bundle = bundled.contains(dep.as_str());
                let explicit = self.manifest.get(&dep).is_some_and(|r| r.explicit);
                let keep_reason = match level {
                    SafetyLevel::Aggressive => None,
                    SafetyLevel::Standard if in_bundle => Some("it belongs to an installed bundle"),
                    SafetyLevel::Standard => None,
                    SafetyLevel::Conservative if in_bundle => Some("it belongs to an installed bundle"),
                    SafetyLevel::Conservative if explicit => Some("it was installed explicitly"),
                    SafetyLevel::Conservative => None,
                };
                if let Some(reason) = keep_reason {
                    warnings.push(format!("Keeping '{}' because {}", dep, reason));
                    kept.insert(dep);
                    continue;
                }

                tracing::debug!(tool = %dep, required_by = %current, "Cascading removal to orphaned dependency");
                removal.insert(dep.clone());
                queue.push(dep.clone());
                cascaded.push(PlannedRemoval {
                    name: dep,
                    reason: RemovalReason::Orphaned {
                        required_by: current.clone(),
                    },
                    paths: Vec::new(),
                });
            }
        }
        cascaded
    }

    /// No installed tool outside the removal set lists `dep`.
    fn is_orphaned(&self, dep: &str, removal: &BTreeSet<String>) -> bool {
        !self.manifest.names().any(|name| {
            name != dep
                && !removal.contains(name)
                && self.dependencies_of(name).iter().any(|d| d == dep)
        })
    }

    /// Tools of every bundle whose members are all installed.
    fn installed_bundle_members(&self) -> HashSet<String> {
        let mut members = HashSet::new();
        for bundle in self.catalog.bundles() {
            let Ok(tools) = expand_bundle(self.catalog, &bundle.name) else {
                continue;
            };
            if !tools.is_empty() && tools.iter().all(|t| self.manifest.contains(t)) {
                members.extend(tools);
            }
        }
        members
    }
}
