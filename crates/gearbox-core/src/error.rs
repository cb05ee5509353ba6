//! Error taxonomy shared by every gearbox component.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GearboxError {
    /// Malformed catalog, bundle cycle, unknown build variant or bad settings.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown tool or bundle: '{0}'")]
    UnknownTool(String),

    #[error("Cyclic dependency detected: {}", .chain.join(" -> "))]
    CyclicDependency { chain: Vec<String> },

    #[error("Build of '{tool}' failed: {reason}")]
    BuildFailure { tool: String, reason: String },

    #[error("Manifest at {} is corrupt: {source}", .path.display())]
    ManifestCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(
        "Manifest at {} uses schema version {found}, but only versions up to {supported} are supported",
        .path.display()
    )]
    UnsupportedSchema {
        path: PathBuf,
        found: u32,
        supported: u32,
    },

    #[error("Backup not found: {0}")]
    BackupNotFound(String),

    #[error(
        "Uninstall of {} blocked by installed dependents: {}",
        .targets.join(", "),
        .dependents.join(", ")
    )]
    UninstallBlocked {
        targets: Vec<String>,
        dependents: Vec<String>,
    },

    #[error("Operation interrupted")]
    Interrupted,

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl GearboxError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Name of the tool the error is about, when there is one.
    pub fn tool(&self) -> Option<&str> {
        match self {
            Self::UnknownTool(name) => Some(name),
            Self::BuildFailure { tool, .. } => Some(tool),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, GearboxError>;
