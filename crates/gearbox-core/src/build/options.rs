use serde::{Deserialize, Serialize};

/// Knobs for one installation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationOptions {
    /// Build variant; `None` uses the catalog default.
    pub build_type: Option<String>,
    /// Maximum concurrent builds; 0 means one per available core.
    pub jobs: usize,
    /// Never run the shared system-package step.
    pub skip_common_deps: bool,
    pub run_tests: bool,
    pub skip_shell_integration: bool,
    /// Rebuild tools that are already in the manifest.
    pub force: bool,
    pub disable_cache: bool,
    pub dry_run: bool,
}

impl InstallationOptions {
    pub fn effective_jobs(&self) -> usize {
        if self.jobs > 0 {
            return self.jobs;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}
