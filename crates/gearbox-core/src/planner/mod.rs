//! Dependency planning: selection -> ordered installation plan.

pub mod bundle;
pub mod graph;

use std::collections::HashSet;

use serde::Serialize;

use crate::catalog::{Catalog, ToolConfig};
use crate::error::{GearboxError, Result};

pub use bundle::{expand_bundle, expand_selection};
pub use graph::DependencyGraph;

/// A tool scheduled for installation.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedTool {
    pub tool: ToolConfig,
    /// Catalog dependencies that are part of this plan.
    pub dependencies: Vec<String>,
    /// Selected by the operator rather than pulled in as a dependency.
    pub explicit: bool,
}

impl PlannedTool {
    pub fn name(&self) -> &str {
        &self.tool.name
    }
}

/// Ordered installation plan; every dependency precedes its dependents.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InstallPlan {
    pub steps: Vec<PlannedTool>,
    /// Opaque dependencies outside the catalog, satisfied by a shared
    /// pre-install step.
    pub system_packages: Vec<String>,
}

impl InstallPlan {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(PlannedTool::name).collect()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|step| step.name() == name)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DependencyPlanner<'a> {
    catalog: &'a Catalog,
}

impl<'a> DependencyPlanner<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Plan the installation of a selection of tool and bundle names.
    ///
    /// No partial plan is ever returned: unknown names and cycles fail the
    /// whole call.
    pub fn plan<S: AsRef<str>>(&self, selection: &[S]) -> Result<InstallPlan> {
        let requested = expand_selection(self.catalog, selection)?;

        let graph = DependencyGraph::new(self.catalog);
        graph.ensure_acyclic()?;

        let roots: Vec<usize> = requested
            .iter()
            .map(|name| {
                self.catalog
                    .index_of(name)
                    .ok_or_else(|| GearboxError::UnknownTool(name.clone()))
            })
            .collect::<Result<_>>()?;
        let closure = graph.closure(&roots);
        let order = graph.order(&closure)?;

        let explicit: HashSet<&str> = requested.iter().map(String::as_str).collect();
        let mut system_packages: Vec<String> = Vec::new();
        let mut steps = Vec::with_capacity(order.len());
        for idx in order {
            let tool = &self.catalog.tools()[idx];
            let mut dependencies = Vec::new();
            for dep in &tool.dependencies {
                if self.catalog.contains_tool(dep) {
                    dependencies.push(dep.clone());
                } else if !system_packages.contains(dep) {
                    system_packages.push(dep.clone());
                }
            }
            steps.push(PlannedTool {
                tool: tool.clone(),
                dependencies,
                explicit: explicit.contains(tool.name.as_str()),
            });
        }

        tracing::info!(
            tools = steps.len(),
            system_packages = system_packages.len(),
            "Planned installation order: {}",
            steps
                .iter()
                .map(PlannedTool::name)
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(InstallPlan {
            steps,
            system_packages,
        })
    }
}
