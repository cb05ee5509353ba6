//! Validated, in-memory tool catalog.
//!
//! The catalog is read once per run and never mutated. Tool order matches the
//! catalog file and is used as the tie-breaker when planning.

pub mod schema;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use crate::error::{GearboxError, Result};
use crate::planner::bundle::expand_bundle;

pub use schema::{Bundle, CatalogFile, Category, Language, LanguageInfo, ToolConfig};

/// Catalog schema versions this build understands.
const SUPPORTED_SCHEMA_MAJOR: &str = "1";

#[derive(Debug, Clone)]
pub struct Catalog {
    default_build_type: String,
    tools: Vec<ToolConfig>,
    bundles: Vec<Bundle>,
    categories: BTreeMap<String, String>,
    languages: BTreeMap<String, LanguageInfo>,
    tool_index: HashMap<String, usize>,
    bundle_index: HashMap<String, usize>,
}

impl Catalog {
    /// Load and validate a catalog file.
    ///
    /// Every failure, including a bundle that references itself, is reported
    /// as a configuration error naming the file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GearboxError::io(format!("Failed to read catalog: {}", path.display()), e)
        })?;
        Self::parse_str(&content).map_err(|e| {
            let cause = match e {
                GearboxError::Config(msg) => msg,
                other => other.to_string(),
            };
            GearboxError::config(format!("Invalid catalog {}: {}", path.display(), cause))
        })
    }

    /// Parse catalog JSON content and validate it, bundle cycles included.
    pub fn parse_str(content: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(content)
            .map_err(|e| GearboxError::config(format!("Failed to parse catalog JSON: {}", e)))?;

        let major = file.schema_version.split('.').next().unwrap_or_default();
        if major != SUPPORTED_SCHEMA_MAJOR {
            return Err(GearboxError::config(format!(
                "Unsupported catalog schema version '{}'",
                file.schema_version
            )));
        }

        let mut catalog = Self::from_parts(file.default_build_type, file.tools, file.bundles)?;
        catalog.categories = file.categories;
        catalog.languages = file.languages;
        catalog.validate_bundles()?;
        Ok(catalog)
    }

    /// Build a catalog from already-parsed parts.
    ///
    /// Structural checks run here; dependency and bundle cycles are left to
    /// the planner so they surface as [`GearboxError::CyclicDependency`].
    pub fn from_parts(
        default_build_type: impl Into<String>,
        tools: Vec<ToolConfig>,
        bundles: Vec<Bundle>,
    ) -> Result<Self> {
        let default_build_type = default_build_type.into();
        if default_build_type.trim().is_empty() {
            return Err(GearboxError::config("default_build_type must not be empty"));
        }

        let mut tool_index = HashMap::new();
        let mut binaries = HashSet::new();
        for (idx, tool) in tools.iter().enumerate() {
            validate_tool(tool)?;
            if tool.build_types.len() > 1 && !tool.build_types.contains_key(&default_build_type) {
                return Err(GearboxError::config(format!(
                    "Tool '{}' has no '{}' build type and more than one variant to choose from",
                    tool.name, default_build_type
                )));
            }
            if tool_index.insert(tool.name.clone(), idx).is_some() {
                return Err(GearboxError::config(format!(
                    "Duplicate tool name '{}'",
                    tool.name
                )));
            }
            if !binaries.insert(tool.binary_name.clone()) {
                return Err(GearboxError::config(format!(
                    "Duplicate binary name '{}' (tool '{}')",
                    tool.binary_name, tool.name
                )));
            }
        }

        let mut bundle_index = HashMap::new();
        for (idx, bundle) in bundles.iter().enumerate() {
            if bundle.name.trim().is_empty() {
                return Err(GearboxError::config("Bundle name must not be empty"));
            }
            if tool_index.contains_key(&bundle.name) {
                return Err(GearboxError::config(format!(
                    "Bundle '{}' collides with a tool of the same name",
                    bundle.name
                )));
            }
            if bundle_index.insert(bundle.name.clone(), idx).is_some() {
                return Err(GearboxError::config(format!(
                    "Duplicate bundle name '{}'",
                    bundle.name
                )));
            }
        }

        for bundle in &bundles {
            for tool in &bundle.tools {
                if !tool_index.contains_key(tool) {
                    return Err(GearboxError::config(format!(
                        "Bundle '{}' references unknown tool '{}'",
                        bundle.name, tool
                    )));
                }
            }
            for nested in &bundle.bundles {
                if !bundle_index.contains_key(nested) {
                    return Err(GearboxError::config(format!(
                        "Bundle '{}' references unknown bundle '{}'",
                        bundle.name, nested
                    )));
                }
            }
        }

        Ok(Self {
            default_build_type,
            tools,
            bundles,
            categories: BTreeMap::new(),
            languages: BTreeMap::new(),
            tool_index,
            bundle_index,
        })
    }

    /// Reject bundles that reference themselves, directly or through nesting.
    pub fn validate_bundles(&self) -> Result<()> {
        for bundle in &self.bundles {
            if let Err(err) = expand_bundle(self, &bundle.name) {
                return Err(match err {
                    GearboxError::CyclicDependency { chain } => GearboxError::config(format!(
                        "Bundle cycle: {}",
                        chain.join(" -> ")
                    )),
                    other => other,
                });
            }
        }
        Ok(())
    }

    pub fn default_build_type(&self) -> &str {
        &self.default_build_type
    }

    /// Tools in catalog order.
    pub fn tools(&self) -> &[ToolConfig] {
        &self.tools
    }

    pub fn bundles(&self) -> &[Bundle] {
        &self.bundles
    }

    pub fn categories(&self) -> &BTreeMap<String, String> {
        &self.categories
    }

    pub fn languages(&self) -> &BTreeMap<String, LanguageInfo> {
        &self.languages
    }

    pub fn tool(&self, name: &str) -> Option<&ToolConfig> {
        self.tool_index.get(name).map(|&idx| &self.tools[idx])
    }

    pub fn bundle(&self, name: &str) -> Option<&Bundle> {
        self.bundle_index.get(name).map(|&idx| &self.bundles[idx])
    }

    pub fn contains_tool(&self, name: &str) -> bool {
        self.tool_index.contains_key(name)
    }

    /// Position of a tool in the catalog file.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.tool_index.get(name).copied()
    }

    pub fn tool_by_binary(&self, binary: &str) -> Option<&ToolConfig> {
        self.tools.iter().find(|tool| tool.binary_name == binary)
    }

    /// Tools of one category, in catalog order.
    pub fn tools_in_category(&self, category: Category) -> impl Iterator<Item = &ToolConfig> {
        self.tools.iter().filter(move |tool| tool.category == category)
    }

    /// Resolve the backend flag for a tool and an optional variant.
    ///
    /// Without an explicit variant the catalog default is used; a tool that
    /// only knows one variant falls back to it.
    pub fn resolve_build_flag<'a>(
        &self,
        tool: &'a ToolConfig,
        variant: Option<&str>,
    ) -> Result<(&'a str, &'a str)> {
        let wanted = variant.unwrap_or(self.default_build_type.as_str());
        if let Some((name, flag)) = tool.build_types.get_key_value(wanted) {
            return Ok((name.as_str(), flag.as_str()));
        }
        if variant.is_none() && tool.build_types.len() == 1 {
            if let Some((name, flag)) = tool.build_types.iter().next() {
                return Ok((name.as_str(), flag.as_str()));
            }
        }
        let available: Vec<&str> = tool.build_types.keys().map(String::as_str).collect();
        Err(GearboxError::config(format!(
            "Tool '{}' has no build type '{}' (available: {})",
            tool.name,
            wanted,
            available.join(", ")
        )))
    }
}

fn validate_tool(tool: &ToolConfig) -> Result<()> {
    if tool.name.trim().is_empty() {
        return Err(GearboxError::config("Tool name must not be empty"));
    }
    if tool.binary_name.trim().is_empty() {
        return Err(GearboxError::config(format!(
            "Tool '{}' has an empty binary_name",
            tool.name
        )));
    }
    if tool.build_types.is_empty() {
        return Err(GearboxError::config(format!(
            "Tool '{}' must declare at least one build type",
            tool.name
        )));
    }
    if tool.dependencies.iter().any(|dep| dep == &tool.name) {
        return Err(GearboxError::config(format!(
            "Tool '{}' lists itself as a dependency",
            tool.name
        )));
    }
    url::Url::parse(&tool.repository).map_err(|e| {
        GearboxError::config(format!(
            "Tool '{}' has an invalid repository URL '{}': {}",
            tool.name, tool.repository, e
        ))
    })?;
    if let Some(min) = &tool.min_version {
        if crate::status::detect::parse_version(min).is_none() {
            return Err(GearboxError::config(format!(
                "Tool '{}' has an unparsable min_version '{}'",
                tool.name, min
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::BTreeMap;

    use super::{Bundle, Category, Language, ToolConfig};

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
            description: String::new(),
            tools: tools.iter().map(|t| t.to_string()).collect(),
            bundles: bundles.iter().map(|b| b.to_string()).collect(),
        }
    }
}
