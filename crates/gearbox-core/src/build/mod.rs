//! Build orchestration: running an installation plan through a backend.

pub mod backend;
pub mod options;
pub mod orchestrator;
pub mod report;

pub use backend::{BuildBackend, BuildOutput, BuildRequest, ScriptBackend};
pub use options::InstallationOptions;
pub use orchestrator::BuildOrchestrator;
pub use report::{BuildEvent, BuildReport, Invocation, ToolResult, ToolState};
