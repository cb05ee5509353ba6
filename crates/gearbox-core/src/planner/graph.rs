//! Tool dependency graph over the whole catalog.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::catalog::Catalog;
use crate::error::{GearboxError, Result};

/// Directed graph of catalog tools.
///
/// An edge `dep -> tool` means `dep` must be installed before `tool`. Node
/// weights are catalog indices so ordering ties break by catalog position.
pub struct DependencyGraph<'a> {
    catalog: &'a Catalog,
    graph: DiGraph<usize, ()>,
    nodes: Vec<NodeIndex>,
}

impl<'a> DependencyGraph<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        let mut graph = DiGraph::new();
        let nodes: Vec<NodeIndex> = (0..catalog.tools().len())
            .map(|idx| graph.add_node(idx))
            .collect();

        for (idx, tool) in catalog.tools().iter().enumerate() {
            for dep in &tool.dependencies {
                // Names outside the catalog are system packages, not graph nodes.
                if let Some(dep_idx) = catalog.index_of(dep) {
                    if graph.find_edge(nodes[dep_idx], nodes[idx]).is_none() {
                        graph.add_edge(nodes[dep_idx], nodes[idx], ());
                    }
                }
            }
        }

        Self {
            catalog,
            graph,
            nodes,
        }
    }

    /// Fail with the first cycle found anywhere in the catalog.
    pub fn ensure_acyclic(&self) -> Result<()> {
        let all: BTreeSet<usize> = (0..self.nodes.len()).collect();
        self.order(&all).map(|_| ())
    }

    /// Catalog indices of `roots` plus everything they transitively depend on.
    pub fn closure(&self, roots: &[usize]) -> BTreeSet<usize> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<usize> = roots.to_vec();
        while let Some(idx) = stack.pop() {
            if !seen.insert(idx) {
                continue;
            }
            stack.extend(self.dependencies_of(idx));
        }
        seen
    }

    /// Catalog indices of the direct in-catalog dependencies of a tool.
    pub fn dependencies_of(&self, idx: usize) -> Vec<usize> {
        let mut deps: Vec<usize> = self
            .graph
            .neighbors_directed(self.nodes[idx], Direction::Incoming)
            .map(|node| self.graph[node])
            .collect();
        deps.sort_unstable();
        deps
    }

    /// Catalog indices of the tools that directly depend on a tool.
    pub fn dependents_of(&self, idx: usize) -> Vec<usize> {
        let mut dependents: Vec<usize> = self
            .graph
            .neighbors_directed(self.nodes[idx], Direction::Outgoing)
            .map(|node| self.graph[node])
            .collect();
        dependents.sort_unstable();
        dependents
    }

    /// Topological order of `subset`, smallest catalog index first among ready
    /// nodes. Edges leaving the subset are ignored.
    pub fn order(&self, subset: &BTreeSet<usize>) -> Result<Vec<usize>> {
        let mut in_degree: HashMap<usize, usize> = subset
            .iter()
            .map(|&idx| {
                let count = self
                    .dependencies_of(idx)
                    .into_iter()
                    .filter(|dep| subset.contains(dep))
                    .count();
                (idx, count)
            })
            .collect();

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .map(|(&idx, _)| Reverse(idx))
            .collect();

        let mut order = Vec::with_capacity(subset.len());
        while let Some(Reverse(idx)) = ready.pop() {
            order.push(idx);
            in_degree.remove(&idx);
            for dependent in self.dependents_of(idx) {
                if let Some(deg) = in_degree.get_mut(&dependent) {
                    *deg -= 1;
                    if *deg == 0 {
                        ready.push(Reverse(dependent));
                    }
                }
            }
        }

        if !in_degree.is_empty() {
            let residual: BTreeSet<usize> = in_degree.keys().copied().collect();
            return Err(GearboxError::CyclicDependency {
                chain: self.extract_cycle(&residual),
            });
        }
        Ok(order)
    }

    /// Walk "depends on" edges inside the residual set until a node repeats.
    ///
    /// Every residual node still has a residual dependency, so the walk always
    /// closes a loop.
    fn extract_cycle(&self, residual: &BTreeSet<usize>) -> Vec<String> {
        let Some(&start) = residual.iter().next() else {
            return Vec::new();
        };
        let mut path: Vec<usize> = vec![start];
        let mut current = start;
        loop {
            let next = self
                .dependencies_of(current)
                .into_iter()
                .find(|dep| residual.contains(dep));
            let Some(next) = next else {
                break;
            };
            if let Some(pos) = path.iter().position(|&idx| idx == next) {
                let mut chain: Vec<String> =
                    path[pos..].iter().map(|&idx| self.name(idx)).collect();
                chain.push(self.name(next));
                return chain;
            }
            path.push(next);
            current = next;
        }
        path.iter().map(|&idx| self.name(idx)).collect()
    }

    fn name(&self, idx: usize) -> String {
        self.catalog.tools()[idx].name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::test_support::tool;

    fn names(catalog: &Catalog, order: &[usize]) -> Vec<String> {
        order
            .iter()
            .map(|&idx| catalog.tools()[idx].name.clone())
            .collect()
    }

    #[test]
    fn ties_break_by_catalog_order() {
        let catalog = Catalog::from_parts(
            "standard",
            vec![tool("zoxide", &[]), tool("bat", &[]), tool("fd", &[])],
            vec![],
        )
        .unwrap();
        let graph = DependencyGraph::new(&catalog);
        let order = graph.order(&(0..3).collect()).unwrap();
        assert_eq!(names(&catalog, &order), vec!["zoxide", "bat", "fd"]);
    }

    #[test]
    fn dependencies_come_first_even_when_listed_later() {
        let catalog = Catalog::from_parts(
            "standard",
            vec![
                tool("uses-fd", &["fd"]),
                tool("bat", &[]),
                tool("fd", &["build-essential"]),
            ],
            vec![],
        )
        .unwrap();
        let graph = DependencyGraph::new(&catalog);
        let order = graph.order(&(0..3).collect()).unwrap();
        assert_eq!(names(&catalog, &order), vec!["bat", "fd", "uses-fd"]);
    }

    #[test]
    fn two_node_cycle_names_both() {
        let catalog = Catalog::from_parts(
            "standard",
            vec![tool("a", &["b"]), tool("b", &["a"]), tool("c", &[])],
            vec![],
        )
        .unwrap();
        let graph = DependencyGraph::new(&catalog);
        match graph.ensure_acyclic().unwrap_err() {
            GearboxError::CyclicDependency { chain } => {
                assert_eq!(chain, vec!["a", "b", "a"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn cycle_reported_from_downstream_node() {
        // d depends on the a <-> b loop without being part of it.
        let catalog = Catalog::from_parts(
            "standard",
            vec![tool("d", &["a"]), tool("a", &["b"]), tool("b", &["a"])],
            vec![],
        )
        .unwrap();
        let graph = DependencyGraph::new(&catalog);
        match graph.ensure_acyclic().unwrap_err() {
            GearboxError::CyclicDependency { chain } => {
                assert_eq!(chain, vec!["a", "b", "a"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn closure_follows_transitive_dependencies() {
        let catalog = Catalog::from_parts(
            "standard",
            vec![tool("a", &["b"]), tool("b", &["c"]), tool("c", &[]), tool("x", &[])],
            vec![],
        )
        .unwrap();
        let graph = DependencyGraph::new(&catalog);
        let closure = graph.closure(&[0]);
        assert_eq!(closure.into_iter().collect::<Vec<_>>(), vec![0, 1, 2]);
    }
}
