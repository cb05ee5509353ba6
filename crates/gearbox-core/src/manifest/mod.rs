//! Manifest types and persistence.
//!
//! The manifest is the durable record of what gearbox installed. It is written
//! atomically and snapshotted to timestamped backups before risky operations.

pub mod store;
pub mod types;

pub use store::ManifestStore;
pub use types::{CURRENT_SCHEMA_VERSION, InstallationRecord, Manifest};
