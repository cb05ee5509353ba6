//! Progress events and the final report of a build run.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Terminal state of one tool in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "reason")]
pub enum ToolState {
    Succeeded,
    /// Present in the manifest and not forced.
    AlreadyInstalled,
    Failed(String),
    Skipped(String),
}

impl ToolState {
    /// Satisfies dependents.
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Succeeded | Self::AlreadyInstalled)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for ToolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => f.write_str("succeeded"),
            Self::AlreadyInstalled => f.write_str("already installed"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
            Self::Skipped(reason) => write!(f, "skipped: {}", reason),
        }
    }
}

/// Progress notification, published on every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum BuildEvent {
    Started {
        index: usize,
        total: usize,
        name: String,
        skip_deps: bool,
    },
    Finished {
        index: usize,
        total: usize,
        name: String,
        state: ToolState,
    },
    /// Dry-run rendering of the invocation that would run.
    Planned {
        index: usize,
        total: usize,
        name: String,
        invocation: String,
    },
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub name: String,
    pub status: ToolState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Invocation a dry run would have executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub tool: String,
    pub command: String,
}

/// Results in plan order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    pub results: Vec<ToolResult>,
    pub dry_run: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invocations: Vec<Invocation>,
    #[serde(default)]
    pub interrupted: bool,
}

impl BuildReport {
    pub fn success(&self) -> bool {
        !self.interrupted && !self.results.iter().any(|r| r.status.is_failed())
    }

    pub fn get(&self, name: &str) -> Option<&ToolResult> {
        self.results.iter().find(|r| r.name == name)
    }

    pub fn succeeded(&self) -> Vec<&str> {
        self.names_where(|s| matches!(s, ToolState::Succeeded))
    }

    pub fn failed(&self) -> Vec<&str> {
        self.names_where(ToolState::is_failed)
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.names_where(|s| matches!(s, ToolState::Skipped(_)))
    }

    fn names_where(&self, pred: impl Fn(&ToolState) -> bool) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| pred(&r.status))
            .map(|r| r.name.as_str())
            .collect()
    }
}
