//! User settings from `config.toml`.
//!
//! ```toml
//! jobs = 4
//! build_type = "standard"
//! safety_level = "conservative"
//! backup_before_uninstall = true
//! catalog = "/opt/gearbox/config/tools.json"
//! scripts_dir = "/opt/gearbox/scripts"
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{GearboxError, Result};
use crate::types::SafetyLevel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Parallel builds; 0 means one per available core.
    #[serde(default)]
    pub jobs: usize,

    /// Build variant used when none is given on the command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_type: Option<String>,

    #[serde(default)]
    pub safety_level: SafetyLevel,

    #[serde(default = "default_true")]
    pub backup_before_uninstall: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scripts_dir: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            jobs: 0,
            build_type: None,
            safety_level: SafetyLevel::default(),
            backup_before_uninstall: true,
            catalog: None,
            scripts_dir: None,
        }
    }
}

impl Settings {
    pub fn parse_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| GearboxError::config(format!("Failed to parse settings: {}", e)))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| GearboxError::config(format!("Failed to serialize settings: {}", e)))
    }
}
