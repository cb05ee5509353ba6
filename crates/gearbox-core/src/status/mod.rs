//! Status reconciliation between the manifest and the host.
//!
//! The manifest records what gearbox believes it installed; live detection
//! reports what is actually on the search path. Both are kept and merged into
//! a [`ToolStatus`], so drift in either direction is visible.

pub mod detect;
pub mod reconcile;
pub mod service;

pub use detect::{Detector, LiveDetection, SystemDetector};
pub use reconcile::{ToolStatus, reconcile};
pub use service::{StatusService, StatusSummary, SyncReport};
