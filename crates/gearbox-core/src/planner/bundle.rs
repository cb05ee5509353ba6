//! Bundle expansion.

use std::collections::HashSet;

use crate::catalog::Catalog;
use crate::error::{GearboxError, Result};

/// Expand a bundle into its tools, nested bundles first-seen order.
pub fn expand_bundle(catalog: &Catalog, name: &str) -> Result<Vec<String>> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = Vec::new();
    visit(catalog, name, &mut stack, &mut seen, &mut out)?;
    Ok(out)
}

/// Expand a mixed selection of tool and bundle names into unique tool names.
///
/// Order follows the selection, with bundle members inlined where the bundle
/// appears.
pub fn expand_selection<S: AsRef<str>>(catalog: &Catalog, selection: &[S]) -> Result<Vec<String>> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for name in selection {
        let name = name.as_ref();
        if catalog.contains_tool(name) {
            if seen.insert(name.to_string()) {
                out.push(name.to_string());
            }
        } else if catalog.bundle(name).is_some() {
            let mut stack = Vec::new();
            visit(catalog, name, &mut stack, &mut seen, &mut out)?;
        } else {
            return Err(GearboxError::UnknownTool(name.to_string()));
        }
    }
    Ok(out)
}

fn visit(
    catalog: &Catalog,
    name: &str,
    stack: &mut Vec<String>,
    seen: &mut HashSet<String>,
    out: &mut Vec<String>,
) -> Result<()> {
    if let Some(pos) = stack.iter().position(|entry| entry == name) {
        let mut chain = stack[pos..].to_vec();
        chain.push(name.to_string());
        return Err(GearboxError::CyclicDependency { chain });
    }
    let bundle = catalog
        .bundle(name)
        .ok_or_else(|| GearboxError::UnknownTool(name.to_string()))?;

    stack.push(name.to_string());
    for tool in &bundle.tools {
        if seen.insert(tool.clone()) {
            out.push(tool.clone());
        }
    }
    for nested in &bundle.bundles {
        visit(catalog, nested, stack, seen, out)?;
    }
    stack.pop();
    Ok(())
}
