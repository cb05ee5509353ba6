//! Configuration: filesystem layout and user settings.
//!
//! Everything here is resolved once by the frontend and handed to the core
//! explicitly; no component reads process environment on its own.

pub mod paths;
pub mod settings;
pub mod store;

pub use paths::GearboxPaths;
pub use settings::Settings;
pub use store::SettingsStore;
