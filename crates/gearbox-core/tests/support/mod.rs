#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use gearbox_core::build::{BuildBackend, BuildOutput, BuildRequest};
use gearbox_core::catalog::{Bundle, Catalog, Category, Language, ToolConfig};
use gearbox_core::config::{GearboxPaths, Settings};
use gearbox_core::context::AppContext;
use gearbox_core::error::{GearboxError, Result};
use gearbox_core::manifest::ManifestStore;
use gearbox_core::types::InstallMethod;

// =============================================================================
// Catalog builders
// =============================================================================

pub fn tool(name: &str, deps: &[&str]) -> ToolConfig {
    ToolConfig {
        name: name.to_string(),
        binary_name: name.to_string(),
        description: format!("{} tool", name),
        category: Category::Core,
        repository: format!("https://github.com/example/{}", name),
        language: Language::Rust,
        build_types: BTreeMap::from([
            ("minimal".to_string(), "-m".to_string()),
            ("standard".to_string(), "-r".to_string()),
            ("maximum".to_string(), "-x".to_string()),
        ]),
        dependencies: deps.iter().map(|d| d.to_string()).collect(),
        test_command: format!("{} --version", name),
        min_version: None,
        shell_integration: false,
    }
}

pub fn bundle(name: &str, tools: &[&str], bundles: &[&str]) -> Bundle {
    Bundle {
        name: name.to_string(),
        description: format!("{} bundle", name),
        tools: tools.iter().map(|t| t.to_string()).collect(),
        bundles: bundles.iter().map(|b| b.to_string()).collect(),
    }
}

pub fn catalog(tools: Vec<ToolConfig>, bundles: Vec<Bundle>) -> Catalog {
    Catalog::from_parts("standard", tools, bundles).unwrap()
}

/// ripgrep, fd, bat, delta (needs bat), uses-fd (needs fd) plus shared packages.
pub fn sample_catalog() -> Catalog {
    catalog(
        vec![
            tool("ripgrep", &["build-essential"]),
            tool("fd", &["build-essential"]),
            tool("bat", &["build-essential"]),
            tool("delta", &["bat", "build-essential"]),
            tool("uses-fd", &["fd"]),
        ],
        vec![
            bundle("search", &["ripgrep", "fd"], &[]),
            bundle("essential", &["bat"], &["search"]),
        ],
    )
}

// =============================================================================
// Isolated homes
// =============================================================================

pub fn setup_store() -> (TempDir, ManifestStore) {
    let temp = TempDir::new().unwrap();
    let store = ManifestStore::new(
        temp.path().join("data").join("manifest.json"),
        temp.path().join("data").join("backups"),
    );
    (temp, store)
}

pub fn setup_context() -> (TempDir, AppContext) {
    let temp = TempDir::new().unwrap();
    let paths = GearboxPaths::with_dirs(temp.path().join("data"), temp.path().join("config"));
    (temp, AppContext::new(paths, Settings::default()))
}

#[cfg(unix)]
pub fn write_executable(path: &Path, content: &str) {
    use std::os::unix::fs::PermissionsExt;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

// =============================================================================
// Fake build backend
// =============================================================================

#[derive(Debug, Default)]
pub struct BackendLog {
    /// (tool, skip_deps) in call order
    pub calls: Vec<(String, bool)>,
    /// "start:<tool>" / "end:<tool>" in order
    pub timeline: Vec<String>,
    pub running: usize,
    pub max_running: usize,
}

impl BackendLog {
    pub fn position(&self, entry: &str) -> usize {
        self.timeline
            .iter()
            .position(|e| e == entry)
            .unwrap_or_else(|| panic!("{} not in timeline {:?}", entry, self.timeline))
    }

    pub fn called(&self) -> Vec<&str> {
        self.calls.iter().map(|(name, _)| name.as_str()).collect()
    }
}

/// Backend that sleeps instead of building.
#[derive(Clone, Default)]
pub struct FakeBackend {
    pub delay: Duration,
    pub fail: HashSet<String>,
    /// Tools whose build only ends when cancelled.
    pub hang: HashSet<String>,
    pub log: Arc<Mutex<BackendLog>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            delay: Duration::from_millis(20),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, tool: &str) -> Self {
        self.fail.insert(tool.to_string());
        self
    }

    pub fn hanging(mut self, tool: &str) -> Self {
        self.hang.insert(tool.to_string());
        self
    }

    pub fn log(&self) -> Arc<Mutex<BackendLog>> {
        Arc::clone(&self.log)
    }
}

#[async_trait]
impl BuildBackend for FakeBackend {
    async fn build(&self, request: &BuildRequest, cancel: CancellationToken) -> Result<BuildOutput> {
        let name = request.tool.name.clone();
        {
            let mut log = self.log.lock().unwrap();
            log.calls.push((name.clone(), request.skip_deps));
            log.timeline.push(format!("start:{}", name));
            log.running += 1;
            log.max_running = log.max_running.max(log.running);
        }

        let outcome = if self.hang.contains(&name) {
            cancel.cancelled().await;
            Err(GearboxError::Interrupted)
        } else {
            tokio::select! {
                _ = tokio::time::sleep(self.delay) => {
                    if self.fail.contains(&name) {
                        Err(GearboxError::BuildFailure {
                            tool: name.clone(),
                            reason: "exit status 1".to_string(),
                        })
                    } else {
                        Ok(BuildOutput {
                            method: InstallMethod::SourceBuild,
                            version: "1.2.3".to_string(),
                            binary_paths: vec![PathBuf::from(format!("/opt/bin/{}", name))],
                        })
                    }
                }
                _ = cancel.cancelled() => Err(GearboxError::Interrupted),
            }
        };

        {
            let mut log = self.log.lock().unwrap();
            log.running -= 1;
            log.timeline.push(format!("end:{}", name));
        }
        outcome
    }

    fn describe(&self, request: &BuildRequest) -> String {
        let mut parts = vec![format!("install-{}.sh", request.tool.name), request.build_flag.clone()];
        if request.skip_deps {
            parts.push("--skip-deps".to_string());
        }
        parts.join(" ")
    }
}
