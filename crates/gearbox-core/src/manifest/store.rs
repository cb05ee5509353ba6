//! Manifest persistence under the gearbox data directory.
//!
//! Layout:
//! - `~/.gearbox/manifest.json`: live manifest
//! - `~/.gearbox/backups/manifest-<timestamp>[-<suffix>].json`: snapshots
//!
//! Writes go through a temporary file in the same directory followed by a
//! rename, so readers only ever observe a complete document. The store does
//! not lock; concurrent writers get last-writer-wins.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tempfile::NamedTempFile;

use crate::config::GearboxPaths;
use crate::error::{GearboxError, Result};
use crate::manifest::types::{CURRENT_SCHEMA_VERSION, Manifest};

const BACKUP_PREFIX: &str = "manifest-";
const BACKUP_EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
    backups_dir: PathBuf,
}

impl ManifestStore {
    pub fn new(path: PathBuf, backups_dir: PathBuf) -> Self {
        Self { path, backups_dir }
    }

    pub fn from_paths(paths: &GearboxPaths) -> Self {
        Self::new(paths.manifest_path(), paths.backups_dir())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backups_dir(&self) -> &Path {
        &self.backups_dir
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Load the manifest from disk
    ///
    /// Returns a new empty manifest if the file doesn't exist. A file that
    /// exists but cannot be parsed is an error; it is never replaced here.
    pub fn load(&self) -> Result<Manifest> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "No manifest yet, starting empty");
            return Ok(Manifest::new());
        }
        read_manifest(&self.path)
    }

    /// Save the manifest atomically (tmp + rename)
    pub fn save(&self, manifest: &Manifest) -> Result<()> {
        let parent = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&parent).map_err(|e| {
            GearboxError::io(
                format!("Failed to create manifest directory: {}", parent.display()),
                e,
            )
        })?;

        // Serialize first so a bad value never leaves a temp file behind
        let bytes = serde_json::to_vec_pretty(manifest)?;

        // Dropping the temp file on any early return removes it
        let mut tmp = NamedTempFile::new_in(&parent).map_err(|e| {
            GearboxError::io(
                format!("Failed to create temp manifest in {}", parent.display()),
                e,
            )
        })?;
        tmp.write_all(&bytes)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| {
                GearboxError::io(
                    format!("Failed to write temp manifest: {}", tmp.path().display()),
                    e,
                )
            })?;
        tmp.persist(&self.path).map_err(|e| {
            GearboxError::io(
                format!("Failed to replace manifest: {}", self.path.display()),
                e.error,
            )
        })?;

        tracing::debug!(
            path = %self.path.display(),
            tools = manifest.len(),
            "Saved manifest"
        );
        Ok(())
    }

    /// Copy the current manifest into the backups directory
    ///
    /// Returns the backup file name, or `None` when there is nothing to back
    /// up yet.
    pub fn backup(&self, suffix: Option<&str>) -> Result<Option<String>> {
        if !self.exists() {
            return Ok(None);
        }
        fs::create_dir_all(&self.backups_dir).map_err(|e| {
            GearboxError::io(
                format!(
                    "Failed to create backups directory: {}",
                    self.backups_dir.display()
                ),
                e,
            )
        })?;

        let name = self.next_backup_name(suffix);
        let target = self.backups_dir.join(&name);
        fs::copy(&self.path, &target).map_err(|e| {
            GearboxError::io(format!("Failed to write backup: {}", target.display()), e)
        })?;

        tracing::info!(backup = %name, "Backed up manifest");
        Ok(Some(name))
    }

    /// Backup file names, oldest first
    pub fn list_backups(&self) -> Result<Vec<String>> {
        if !self.backups_dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.backups_dir).map_err(|e| {
            GearboxError::io(
                format!(
                    "Failed to read backups directory: {}",
                    self.backups_dir.display()
                ),
                e,
            )
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                GearboxError::io(
                    format!(
                        "Failed to read backups directory: {}",
                        self.backups_dir.display()
                    ),
                    e,
                )
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|ext| ext.to_str()) != Some(BACKUP_EXTENSION) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Replace the live manifest with a backup
    ///
    /// The current state is backed up first with a `pre-restore` suffix, so a
    /// bad restore can itself be undone.
    pub fn restore_backup(&self, name: &str) -> Result<()> {
        let source = self.backup_path(name)?;
        let manifest = read_manifest(&source)?;

        self.backup(Some("pre-restore"))?;
        self.save(&manifest)?;

        tracing::info!(backup = %name, tools = manifest.len(), "Restored manifest");
        Ok(())
    }

    fn backup_path(&self, name: &str) -> Result<PathBuf> {
        // Only bare file names inside the backups directory are accepted
        let is_bare = Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name);
        let path = self.backups_dir.join(name);
        if !is_bare || !path.is_file() {
            return Err(GearboxError::BackupNotFound(name.to_string()));
        }
        Ok(path)
    }

    fn next_backup_name(&self, suffix: Option<&str>) -> String {
        let timestamp = Utc::now().format("%Y%m%d-%H%M%S-%3f").to_string();
        let suffix = suffix
            .map(sanitize_suffix)
            .filter(|s| !s.is_empty())
            .map(|s| format!("-{}", s))
            .unwrap_or_default();

        let base = format!("{}{}{}", BACKUP_PREFIX, timestamp, suffix);
        let mut name = format!("{}.{}", base, BACKUP_EXTENSION);
        let mut counter = 1;
        while self.backups_dir.join(&name).exists() {
            name = format!("{}-{}.{}", base, counter, BACKUP_EXTENSION);
            counter += 1;
        }
        name
    }
}

fn read_manifest(path: &Path) -> Result<Manifest> {
    let bytes = fs::read(path).map_err(|e| {
        GearboxError::io(format!("Failed to read manifest: {}", path.display()), e)
    })?;
    let manifest: Manifest =
        serde_json::from_slice(&bytes).map_err(|source| GearboxError::ManifestCorrupt {
            path: path.to_path_buf(),
            source,
        })?;
    if manifest.schema_version > CURRENT_SCHEMA_VERSION {
        return Err(GearboxError::UnsupportedSchema {
            path: path.to_path_buf(),
            found: manifest.schema_version,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }
    Ok(manifest)
}

fn sanitize_suffix(suffix: &str) -> String {
    suffix
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}
