//! Gearbox Core Library
//!
//! Provides the domain logic for planning, building, tracking and removing
//! developer tools described by a tool catalog.

pub mod build;
pub mod catalog;
pub mod config;
pub mod context;
pub mod doctor;
pub mod error;
pub mod manifest;
pub mod planner;
pub mod status;
pub mod types;
pub mod uninstall;

/// Re-exports of commonly used types
pub mod prelude {
    // Catalog and planning
    pub use crate::catalog::{Bundle, Catalog, ToolConfig};
    pub use crate::planner::{DependencyPlanner, InstallPlan, PlannedTool};

    // Building
    pub use crate::build::{
        BuildBackend, BuildEvent, BuildOrchestrator, BuildReport, InstallationOptions,
        ScriptBackend, ToolState,
    };

    // Manifest
    pub use crate::manifest::{InstallationRecord, Manifest, ManifestStore};

    // Status
    pub use crate::status::{StatusService, SyncReport, ToolStatus};

    // Uninstall
    pub use crate::uninstall::{
        UninstallExecutor, UninstallPlan, UninstallPlanner, UninstallReport, UninstallRequest,
    };

    // Shared
    pub use crate::config::{GearboxPaths, Settings};
    pub use crate::context::AppContext;
    pub use crate::error::{GearboxError, Result};
    pub use crate::types::{InstallMethod, SafetyLevel, ToolSource};
}
