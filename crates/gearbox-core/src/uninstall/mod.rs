//! Uninstall planning and execution.
//!
//! Planning never touches the filesystem; the executor applies a plan that
//! the operator has reviewed.

pub mod executor;
pub mod plan;

pub use executor::{UninstallExecutor, UninstallOptions, UninstallReport, remove_path_if_exists};
pub use plan::{PlannedRemoval, RemovalReason, UninstallPlan, UninstallPlanner, UninstallRequest};
