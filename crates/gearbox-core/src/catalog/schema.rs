//! Catalog file schema.
//!
//! The catalog is a JSON document shipped alongside the build scripts:
//!
//! ```json
//! {
//!   "schema_version": "1.0",
//!   "default_build_type": "standard",
//!   "tools": [ { "name": "ripgrep", ... } ],
//!   "bundles": [ { "name": "essential", "tools": ["ripgrep", "fd"] } ],
//!   "categories": { "text": "Text processing" },
//!   "languages": { "rust": { "build_tool": "cargo" } }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Root structure of the catalog file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFile {
    pub schema_version: String,

    /// Build variant used when an install does not name one.
    pub default_build_type: String,

    #[serde(default)]
    pub tools: Vec<ToolConfig>,

    #[serde(default)]
    pub bundles: Vec<Bundle>,

    /// Category id -> human readable description.
    #[serde(default)]
    pub categories: BTreeMap<String, String>,

    #[serde(default)]
    pub languages: BTreeMap<String, LanguageInfo>,
}

/// A single installable tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolConfig {
    pub name: String,

    pub binary_name: String,

    #[serde(default)]
    pub description: String,

    pub category: Category,

    pub repository: String,

    pub language: Language,

    /// Variant name -> flag handed to the build backend.
    pub build_types: BTreeMap<String, String>,

    /// Other catalog tools, or opaque system packages.
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Version probe, e.g. `rg --version`.
    #[serde(default)]
    pub test_command: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<String>,

    #[serde(default)]
    pub shell_integration: bool,
}

impl ToolConfig {
    /// Arguments of `test_command` to run against the resolved binary.
    ///
    /// A leading token equal to the binary name is dropped so the probe can be
    /// pointed at whichever path detection resolved.
    pub fn probe_args(&self) -> Vec<String> {
        let mut tokens = self.test_command.split_whitespace();
        match tokens.next() {
            None => Vec::new(),
            Some(first) if first == self.binary_name || first == self.name => {
                tokens.map(str::to_string).collect()
            }
            Some(first) => std::iter::once(first)
                .chain(tokens)
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Named group of tools and nested bundles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub tools: Vec<String>,

    #[serde(default)]
    pub bundles: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageInfo {
    #[serde(default)]
    pub build_tool: String,

    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Core,
    Development,
    System,
    Text,
    Media,
    Ui,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Core => "core",
            Self::Development => "development",
            Self::System => "system",
            Self::Text => "text",
            Self::Media => "media",
            Self::Ui => "ui",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Rust,
    Go,
    Python,
    C,
    Cpp,
    Shell,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Rust => "rust",
            Self::Go => "go",
            Self::Python => "python",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::Shell => "shell",
        };
        f.write_str(label)
    }
}
