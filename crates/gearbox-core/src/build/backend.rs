//! Build backends: the part of a run that actually compiles a tool.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::catalog::ToolConfig;
use crate::error::{GearboxError, Result};
use crate::status::{Detector, SystemDetector};
use crate::types::InstallMethod;

/// Everything a backend needs to build one tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub tool: ToolConfig,
    pub build_type: String,
    pub build_flag: String,
    /// Shared system packages are already in place.
    pub skip_deps: bool,
    pub run_tests: bool,
    pub force: bool,
    pub skip_shell_integration: bool,
    pub disable_cache: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    pub method: InstallMethod,
    pub version: String,
    pub binary_paths: Vec<PathBuf>,
}

#[async_trait]
pub trait BuildBackend: Send + Sync {
    /// Build and install one tool. Must stop promptly once `cancel` fires.
    async fn build(&self, request: &BuildRequest, cancel: CancellationToken) -> Result<BuildOutput>;

    /// Human-readable invocation, used by dry runs.
    fn describe(&self, request: &BuildRequest) -> String;
}

/// Runs `<scripts_dir>/install-<tool>.sh` for each tool.
#[derive(Debug, Clone)]
pub struct ScriptBackend {
    scripts_dir: PathBuf,
    detector: SystemDetector,
}

impl ScriptBackend {
    pub fn new(scripts_dir: PathBuf) -> Self {
        Self {
            scripts_dir,
            detector: SystemDetector::new(),
        }
    }

    /// Detector used to probe a freshly built binary.
    pub fn with_detector(mut self, detector: SystemDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn scripts_dir(&self) -> &Path {
        &self.scripts_dir
    }

    pub fn script_path(&self, tool: &str) -> PathBuf {
        self.scripts_dir.join(format!("install-{}.sh", tool))
    }

    /// Script arguments in the order the install scripts expect them.
    pub fn script_args(request: &BuildRequest) -> Vec<String> {
        let mut args = vec![request.build_flag.clone()];
        if request.skip_deps {
            args.push("--skip-deps".to_string());
        }
        if request.run_tests {
            args.push("--run-tests".to_string());
        }
        if request.force {
            args.push("--force".to_string());
        }
        if request.skip_shell_integration && request.tool.shell_integration {
            args.push("--no-shell".to_string());
        }
        if request.disable_cache {
            args.push("--no-cache".to_string());
        }
        args
    }

    async fn probe(&self, tool: &ToolConfig) -> (Option<String>, Vec<PathBuf>) {
        let detector = self.detector.clone();
        let tool = tool.clone();
        match tokio::task::spawn_blocking(move || detector.detect(&tool)).await {
            Ok(live) => (live.version, live.binary_path.into_iter().collect()),
            Err(e) => {
                tracing::warn!(error = %e, "Post-build detection did not complete");
                (None, Vec::new())
            }
        }
    }
}

#[async_trait]
impl BuildBackend for ScriptBackend {
    async fn build(&self, request: &BuildRequest, cancel: CancellationToken) -> Result<BuildOutput> {
        let name = &request.tool.name;
        let script = self.script_path(name);
        if !script.is_file() {
            return Err(GearboxError::BuildFailure {
                tool: name.clone(),
                reason: format!("build script not found: {}", script.display()),
            });
        }

        let args = Self::script_args(request);
        tracing::debug!(tool = %name, script = %script.display(), ?args, "Running build script");

        let mut child = Command::new(&script)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| GearboxError::BuildFailure {
                tool: name.clone(),
                reason: format!("failed to start {}: {}", script.display(), e),
            })?;

        let status = tokio::select! {
            status = child.wait() => status.map_err(|e| GearboxError::BuildFailure {
                tool: name.clone(),
                reason: format!("failed to wait for build: {}", e),
            })?,
            _ = cancel.cancelled() => {
                if let Err(e) = child.kill().await {
                    tracing::warn!(tool = %name, error = %e, "Failed to kill build");
                }
                return Err(GearboxError::Interrupted);
            }
        };

        if !status.success() {
            return Err(GearboxError::BuildFailure {
                tool: name.clone(),
                reason: describe_exit(status),
            });
        }

        let (version, binary_paths) = self.probe(&request.tool).await;
        if binary_paths.is_empty() {
            tracing::warn!(tool = %name, binary = %request.tool.binary_name, "Built binary not found on search path");
        }
        Ok(BuildOutput {
            method: InstallMethod::SourceBuild,
            version: version.unwrap_or_else(|| "unknown".to_string()),
            binary_paths,
        })
    }

    fn describe(&self, request: &BuildRequest) -> String {
        let mut parts = vec![self.script_path(&request.tool.name).display().to_string()];
        parts.extend(Self::script_args(request));
        parts.join(" ")
    }
}

fn describe_exit(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit status {}", code),
        None => "terminated by signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::test_support::tool;

    fn request(shell_integration: bool) -> BuildRequest {
        let mut tool = tool("zoxide", &[]);
        tool.shell_integration = shell_integration;
        BuildRequest {
            tool,
            build_type: "standard".to_string(),
            build_flag: "-r".to_string(),
            skip_deps: true,
            run_tests: false,
            force: true,
            skip_shell_integration: true,
            disable_cache: true,
        }
    }

    #[test]
    fn script_args_follow_flags() {
        assert_eq!(
            ScriptBackend::script_args(&request(true)),
            vec!["-r", "--skip-deps", "--force", "--no-shell", "--no-cache"]
        );
    }

    #[test]
    fn no_shell_only_for_shell_integrated_tools() {
        let args = ScriptBackend::script_args(&request(false));
        assert!(!args.contains(&"--no-shell".to_string()));
    }

    #[test]
    fn describe_renders_script_invocation() {
        let backend = ScriptBackend::new(PathBuf::from("/opt/gearbox/scripts"));
        assert_eq!(
            backend.describe(&request(false)),
            "/opt/gearbox/scripts/install-zoxide.sh -r --skip-deps --force --no-cache"
        );
    }

    #[tokio::test]
    async fn missing_script_is_a_build_failure() {
        let temp = tempfile::TempDir::new().unwrap();
        let backend = ScriptBackend::new(temp.path().to_path_buf());
        let err = backend
            .build(&request(false), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GearboxError::BuildFailure { ref tool, .. } if tool == "zoxide"));
    }
}
