//! Shared core types used across the manifest, status and uninstall layers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How a tool ended up on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallMethod {
    /// Fetched and compiled by a gearbox build backend.
    SourceBuild,
    /// Installed through a language package manager (cargo, go, pipx).
    PackageManager,
    /// Found on the host and adopted into the manifest by a sync.
    PreExisting,
}

impl fmt::Display for InstallMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::SourceBuild => "source-build",
            Self::PackageManager => "package-manager",
            Self::PreExisting => "pre-existing",
        };
        f.write_str(label)
    }
}

/// Where a tool status came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolSource {
    /// Tracked in the gearbox manifest.
    GearboxManaged,
    /// Only found by live detection.
    SystemDetected,
    /// Neither tracked nor detected.
    Unknown,
}

impl fmt::Display for ToolSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::GearboxManaged => "gearbox-managed",
            Self::SystemDetected => "system-detected",
            Self::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// How readily an uninstall cascades into shared dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyLevel {
    Conservative,
    #[default]
    Standard,
    Aggressive,
}

impl FromStr for SafetyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "conservative" => Ok(Self::Conservative),
            "standard" => Ok(Self::Standard),
            "aggressive" => Ok(Self::Aggressive),
            other => Err(format!(
                "Unknown safety level '{}'. Use conservative, standard or aggressive",
                other
            )),
        }
    }
}

impl fmt::Display for SafetyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Conservative => "conservative",
            Self::Standard => "standard",
            Self::Aggressive => "aggressive",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_method_serializes_snake_case() {
        let json = serde_json::to_string(&InstallMethod::PreExisting).unwrap();
        assert_eq!(json, "\"pre_existing\"");
    }

    #[test]
    fn safety_level_parses_case_insensitively() {
        assert_eq!(
            "Aggressive".parse::<SafetyLevel>().unwrap(),
            SafetyLevel::Aggressive
        );
        assert!("reckless".parse::<SafetyLevel>().is_err());
    }
}
