//! Application context for unified dependency injection.

use std::path::{Path, PathBuf};

use crate::build::{InstallationOptions, ScriptBackend};
use crate::catalog::Catalog;
use crate::config::{GearboxPaths, Settings, SettingsStore};
use crate::error::Result;
use crate::manifest::ManifestStore;
use crate::status::{StatusService, SystemDetector};
use crate::uninstall::{UninstallExecutor, UninstallOptions, UninstallRequest};

/// Unified application context for dependency injection.
///
/// Frontends resolve paths and settings once, build this, and pass it to
/// commands. Nothing below it reads the process environment.
#[derive(Debug, Clone)]
pub struct AppContext {
    paths: GearboxPaths,
    settings: Settings,
}

impl AppContext {
    /// Create a context; locations set in `settings` replace the defaults.
    pub fn new(paths: GearboxPaths, settings: Settings) -> Self {
        let mut paths = paths;
        if let Some(catalog) = &settings.catalog {
            paths = paths.with_catalog_path(catalog.clone());
        }
        if let Some(scripts_dir) = &settings.scripts_dir {
            paths = paths.with_scripts_dir(scripts_dir.clone());
        }
        Self { paths, settings }
    }

    /// Create a context with settings read from `config.toml` under `paths`.
    pub fn load(paths: GearboxPaths) -> Result<Self> {
        let settings = SettingsStore::from_paths(&paths).load()?;
        Ok(Self::new(paths, settings))
    }

    pub fn with_catalog_path(mut self, path: PathBuf) -> Self {
        self.paths = self.paths.with_catalog_path(path);
        self
    }

    pub fn with_scripts_dir(mut self, dir: PathBuf) -> Self {
        self.paths = self.paths.with_scripts_dir(dir);
        self
    }

    pub fn paths(&self) -> &GearboxPaths {
        &self.paths
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn catalog_path(&self) -> &Path {
        self.paths.catalog_path()
    }

    pub fn scripts_dir(&self) -> &Path {
        self.paths.scripts_dir()
    }

    pub fn load_catalog(&self) -> Result<Catalog> {
        Catalog::load(self.paths.catalog_path())
    }

    pub fn manifest_store(&self) -> ManifestStore {
        ManifestStore::from_paths(&self.paths)
    }

    pub fn settings_store(&self) -> SettingsStore {
        SettingsStore::from_paths(&self.paths)
    }

    pub fn script_backend(&self) -> ScriptBackend {
        ScriptBackend::new(self.paths.scripts_dir().to_path_buf())
    }

    pub fn status_service<'a>(&self, catalog: &'a Catalog) -> StatusService<'a, SystemDetector> {
        StatusService::new(catalog, self.manifest_store(), SystemDetector::new())
    }

    pub fn uninstall_executor(&self) -> UninstallExecutor {
        UninstallExecutor::new(self.manifest_store())
    }

    /// Installation defaults taken from settings.
    pub fn installation_options(&self) -> InstallationOptions {
        InstallationOptions {
            build_type: self.settings.build_type.clone(),
            jobs: self.settings.jobs,
            ..Default::default()
        }
    }

    /// Uninstall request seeded with the configured safety level and backup policy.
    pub fn uninstall_request(&self, targets: Vec<String>) -> UninstallRequest {
        UninstallRequest::new(targets)
            .with_safety_level(self.settings.safety_level)
            .with_backup(self.settings.backup_before_uninstall)
    }

    pub fn uninstall_options(&self) -> UninstallOptions {
        UninstallOptions::default()
    }
}
