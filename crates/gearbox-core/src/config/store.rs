//! Settings store for loading and saving config.toml.

use std::path::{Path, PathBuf};

use crate::error::{GearboxError, Result};

use super::{GearboxPaths, Settings};

#[derive(Debug, Clone)]
pub struct SettingsStore {
    settings_path: PathBuf,
}

impl SettingsStore {
    pub fn new(settings_path: PathBuf) -> Self {
        Self { settings_path }
    }

    pub fn from_paths(paths: &GearboxPaths) -> Self {
        Self::new(paths.settings_path())
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    /// Missing file means default settings.
    pub fn load(&self) -> Result<Settings> {
        if !self.settings_path.exists() {
            return Ok(Settings::default());
        }
        let content = std::fs::read_to_string(&self.settings_path).map_err(|e| {
            GearboxError::io(
                format!("Failed to read settings: {}", self.settings_path.display()),
                e,
            )
        })?;
        Settings::parse_str(&content).map_err(|e| {
            GearboxError::config(format!("{} ({})", e, self.settings_path.display()))
        })
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        let content = settings.to_toml()?;
        if let Some(parent) = self.settings_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                GearboxError::io(
                    format!("Failed to create config directory: {}", parent.display()),
                    e,
                )
            })?;
        }
        std::fs::write(&self.settings_path, content).map_err(|e| {
            GearboxError::io(
                format!("Failed to write settings: {}", self.settings_path.display()),
                e,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_then_load() {
        let temp = TempDir::new().unwrap();
        let store = SettingsStore::new(temp.path().join("nested").join("config.toml"));
        assert_eq!(store.load().unwrap(), Settings::default());

        let settings = Settings {
            jobs: 6,
            build_type: Some("maximum".to_string()),
            ..Settings::default()
        };
        store.save(&settings).unwrap();
        assert_eq!(store.load().unwrap(), settings);
    }

    #[test]
    fn malformed_file_names_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "jobs = \"many\"").unwrap();
        let err = SettingsStore::new(path.clone()).load().unwrap_err();
        assert!(err.to_string().contains("config.toml"));
    }
}
