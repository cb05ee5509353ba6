//! Live detection of tools on the host.

use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::catalog::ToolConfig;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_POLL: Duration = Duration::from_millis(20);

/// What the host says about a tool, independent of the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveDetection {
    pub binary_path: Option<PathBuf>,
    pub version: Option<String>,
}

impl LiveDetection {
    pub fn not_found() -> Self {
        Self::default()
    }

    pub fn found(binary_path: PathBuf, version: Option<String>) -> Self {
        Self {
            binary_path: Some(binary_path),
            version,
        }
    }

    pub fn is_detected(&self) -> bool {
        self.binary_path.is_some()
    }
}

/// Source of live detections. Swapped for a fake in tests.
pub trait Detector: Send + Sync {
    fn detect(&self, tool: &ToolConfig) -> LiveDetection;
}

/// Resolves binaries on a search path and runs the tool's version probe.
#[derive(Debug, Clone, Default)]
pub struct SystemDetector {
    search_path: Option<OsString>,
}

impl SystemDetector {
    /// Detector using the search path of the current process.
    pub fn new() -> Self {
        Self::default()
    }

    /// Detector restricted to an explicit search path (`PATH` syntax).
    pub fn with_search_path(search_path: impl Into<OsString>) -> Self {
        Self {
            search_path: Some(search_path.into()),
        }
    }

    pub fn resolve(&self, binary: &str) -> Option<PathBuf> {
        let result = match &self.search_path {
            Some(paths) => {
                let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
                which::which_in(binary, Some(paths), cwd)
            }
            None => which::which(binary),
        };
        result.ok()
    }
}

impl Detector for SystemDetector {
    fn detect(&self, tool: &ToolConfig) -> LiveDetection {
        let Some(path) = self.resolve(&tool.binary_name) else {
            tracing::debug!(tool = %tool.name, binary = %tool.binary_name, "Binary not on search path");
            return LiveDetection::not_found();
        };

        let args = tool.probe_args();
        let version = if tool.test_command.trim().is_empty() {
            None
        } else {
            match run_probe(&path, &args, PROBE_TIMEOUT) {
                Ok(output) => extract_version(&output),
                Err(reason) => {
                    tracing::debug!(tool = %tool.name, %reason, "Version probe failed");
                    None
                }
            }
        };

        tracing::debug!(
            tool = %tool.name,
            path = %path.display(),
            version = version.as_deref().unwrap_or("unknown"),
            "Detected tool"
        );
        LiveDetection::found(path, version)
    }
}

/// Run `binary args...` and return stdout followed by stderr.
fn run_probe(binary: &Path, args: &[String], timeout: Duration) -> Result<String, String> {
    let mut child = Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| e.to_string())?;

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => break,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(format!("timed out after {}s", timeout.as_secs()));
            }
            Ok(None) => std::thread::sleep(PROBE_POLL),
            Err(e) => return Err(e.to_string()),
        }
    }

    let mut output = String::new();
    if let Some(mut stdout) = child.stdout.take() {
        let _ = stdout.read_to_string(&mut output);
    }
    if let Some(mut stderr) = child.stderr.take() {
        let mut err = String::new();
        let _ = stderr.read_to_string(&mut err);
        if !err.is_empty() {
            if !output.is_empty() && !output.ends_with('\n') {
                output.push('\n');
            }
            output.push_str(&err);
        }
    }
    Ok(output)
}

fn version_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\d+\.\d+(?:\.\d+)?(?:-[0-9A-Za-z.]+)?").ok())
        .as_ref()
}

/// Pick a version out of probe output.
///
/// A dotted version number anywhere in the output wins; otherwise the first
/// non-empty line is used as-is.
pub fn extract_version(output: &str) -> Option<String> {
    if let Some(found) = version_pattern().and_then(|p| p.find(output)) {
        return Some(found.as_str().to_string());
    }
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

/// Lenient semver parse: `v1.2` and `1.2` become `1.2.0`.
pub fn parse_version(raw: &str) -> Option<semver::Version> {
    let trimmed = raw.trim().trim_start_matches('v');
    if let Ok(version) = semver::Version::parse(trimmed) {
        return Some(version);
    }
    let found = version_pattern()?.find(trimmed)?.as_str();
    let (core, pre) = match found.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (found, None),
    };
    let mut parts: Vec<&str> = core.split('.').collect();
    while parts.len() < 3 {
        parts.push("0");
    }
    let mut normalized = parts.join(".");
    if let Some(pre) = pre {
        normalized.push('-');
        normalized.push_str(pre);
    }
    semver::Version::parse(&normalized).ok()
}

/// `None` when either side is not a recognizable version.
pub fn meets_min_version(version: &str, min_version: &str) -> Option<bool> {
    let actual = parse_version(version)?;
    let min = parse_version(min_version)?;
    Some(actual >= min)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_pattern_beats_first_line() {
        let output = "ripgrep 14.1.0 (rev e50df40a19)\n-SIMD -AVX";
        assert_eq!(extract_version(output).as_deref(), Some("14.1.0"));
    }

    #[test]
    fn first_non_empty_line_without_pattern() {
        let output = "\n\n  nightly build  \nmore";
        assert_eq!(extract_version(output).as_deref(), Some("nightly build"));
        assert_eq!(extract_version("   \n"), None);
    }

    #[test]
    fn parse_version_pads_short_forms() {
        assert_eq!(parse_version("v0.24"), Some(semver::Version::new(0, 24, 0)));
        assert_eq!(parse_version("jq-1.7"), Some(semver::Version::new(1, 7, 0)));
        assert_eq!(parse_version("unknown"), None);
    }

    #[test]
    fn min_version_comparison() {
        assert_eq!(meets_min_version("14.1.0", "13.0.0"), Some(true));
        assert_eq!(meets_min_version("0.9", "1.0"), Some(false));
        assert_eq!(meets_min_version("nightly", "1.0"), None);
    }

    #[test]
    fn missing_binary_is_not_detected() {
        let temp = tempfile::TempDir::new().unwrap();
        let detector = SystemDetector::with_search_path(temp.path());
        let tool = crate::catalog::test_support::tool("definitely-not-here", &[]);
        assert!(!detector.detect(&tool).is_detected());
    }

    #[cfg(unix)]
    #[test]
    fn detects_binary_and_probes_version() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::TempDir::new().unwrap();
        let binary = temp.path().join("fakerg");
        std::fs::write(&binary, "#!/bin/sh\necho \"fakerg 3.2.1\"\n").unwrap();
        std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut tool = crate::catalog::test_support::tool("fakerg", &[]);
        tool.test_command = "fakerg --version".to_string();

        let detection = SystemDetector::with_search_path(temp.path()).detect(&tool);
        assert_eq!(detection.binary_path, Some(binary));
        assert_eq!(detection.version.as_deref(), Some("3.2.1"));
    }
}
