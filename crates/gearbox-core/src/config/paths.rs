//! Filesystem locations used by gearbox.

use std::path::{Path, PathBuf};

use crate::error::{GearboxError, Result};

const DATA_DIR_NAME: &str = ".gearbox";

/// Every path gearbox touches, resolved once and passed down explicitly.
///
/// Layout under the data root (`~/.gearbox` by default):
/// - `manifest.json`
/// - `backups/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GearboxPaths {
    data_dir: PathBuf,
    config_dir: PathBuf,
    catalog_path: PathBuf,
    scripts_dir: PathBuf,
}

impl GearboxPaths {
    /// Resolve default locations from the user's home and config directories.
    pub fn from_home() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| GearboxError::config("Could not determine home directory"))?;
        let config_dir = dirs::config_dir()
            .map(|p| p.join("gearbox"))
            .unwrap_or_else(|| home.join(".config").join("gearbox"));
        Ok(Self::with_dirs(home.join(DATA_DIR_NAME), config_dir))
    }

    /// Paths rooted at explicit directories (for testing and `--home`).
    pub fn with_dirs(data_dir: PathBuf, config_dir: PathBuf) -> Self {
        let catalog_path = config_dir.join("tools.json");
        let scripts_dir = config_dir.join("scripts");
        Self {
            data_dir,
            config_dir,
            catalog_path,
            scripts_dir,
        }
    }

    pub fn with_catalog_path(mut self, path: PathBuf) -> Self {
        self.catalog_path = path;
        self
    }

    pub fn with_scripts_dir(mut self, dir: PathBuf) -> Self {
        self.scripts_dir = dir;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.data_dir.join("manifest.json")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    pub fn catalog_path(&self) -> &Path {
        &self.catalog_path
    }

    pub fn scripts_dir(&self) -> &Path {
        &self.scripts_dir
    }
}
