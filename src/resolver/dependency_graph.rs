//! Prerequisite graph over dependency names.
//!
//! Edges point from a dependency to each of its prerequisites. The graph is
//! used twice: at manifest validation to reject cycles with a readable
//! chain, and at plan construction to order enabled dependencies so every
//! prerequisite precedes its dependents.

use anyhow::{Result, anyhow};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::core::SuperbuildError;
use crate::manifest::DependencySpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Directed graph of dependency names.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    node_map: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph of `specs`, one node per spec in declaration order.
    ///
    /// Prerequisites naming undeclared dependencies still get a node, so
    /// callers check existence separately.
    #[must_use]
    pub fn from_specs<'a>(specs: impl IntoIterator<Item = &'a DependencySpec>) -> Self {
        let specs: Vec<&DependencySpec> = specs.into_iter().collect();
        let mut graph = Self::new();
        for spec in &specs {
            graph.add_node(&spec.name);
        }
        for spec in &specs {
            for prerequisite in &spec.prerequisites {
                graph.add_dependency(&spec.name, prerequisite);
            }
        }
        graph
    }

    fn ensure_node(&mut self, name: &str) -> NodeIndex {
        if let Some(&index) = self.node_map.get(name) {
            index
        } else {
            let index = self.graph.add_node(name.to_string());
            self.node_map.insert(name.to_string(), index);
            index
        }
    }

    /// Add a node without edges.
    pub fn add_node(&mut self, name: &str) {
        self.ensure_node(name);
    }

    /// Record that `from` needs `to` installed first.
    pub fn add_dependency(&mut self, from: &str, to: &str) {
        let from_idx = self.ensure_node(from);
        let to_idx = self.ensure_node(to);

        if !self.graph.contains_edge(from_idx, to_idx) {
            self.graph.add_edge(from_idx, to_idx, ());
        }
    }

    /// Fail with [`SuperbuildError::CircularDependency`] naming the first
    /// cycle found, e.g. `a → b → c → a`.
    pub fn detect_cycles(&self) -> Result<()> {
        let mut colors: HashMap<NodeIndex, Color> =
            self.graph.node_indices().map(|n| (n, Color::White)).collect();
        let mut path: Vec<NodeIndex> = Vec::new();

        for node in self.graph.node_indices() {
            if matches!(colors.get(&node), Some(Color::White))
                && let Some(cycle) = self.dfs_visit(node, &mut colors, &mut path)
            {
                let chain = cycle
                    .iter()
                    .map(|idx| self.graph[*idx].as_str())
                    .collect::<Vec<_>>()
                    .join(" → ");
                return Err(SuperbuildError::CircularDependency {
                    chain,
                }
                .into());
            }
        }

        Ok(())
    }

    fn dfs_visit(
        &self,
        node: NodeIndex,
        colors: &mut HashMap<NodeIndex, Color>,
        path: &mut Vec<NodeIndex>,
    ) -> Option<Vec<NodeIndex>> {
        colors.insert(node, Color::Gray);
        path.push(node);

        // Neighbors come back in reverse insertion order; walk them as declared
        let mut neighbors: Vec<NodeIndex> = self.graph.neighbors(node).collect();
        neighbors.reverse();

        for neighbor in neighbors {
            match colors.get(&neighbor) {
                Some(Color::Gray) => {
                    let cycle_start = path.iter().position(|n| *n == neighbor).unwrap_or(0);
                    let mut cycle = path[cycle_start..].to_vec();
                    cycle.push(neighbor);
                    return Some(cycle);
                }
                Some(Color::White) => {
                    if let Some(cycle) = self.dfs_visit(neighbor, colors, path) {
                        return Some(cycle);
                    }
                }
                _ => {}
            }
        }

        path.pop();
        colors.insert(node, Color::Black);
        None
    }

    /// Names ordered so that every prerequisite precedes its dependents.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        self.detect_cycles()?;

        let indices =
            toposort(&self.graph, None).map_err(|_| anyhow!("Failed to determine build order"))?;
        Ok(indices.into_iter().rev().map(|idx| self.graph[idx].clone()).collect())
    }

    /// Every dependency reachable through prerequisite edges from `name`.
    #[must_use]
    pub fn transitive_prerequisites(&self, name: &str) -> BTreeSet<String> {
        let mut deps = BTreeSet::new();
        let mut queue = VecDeque::new();

        if let Some(&node_idx) = self.node_map.get(name) {
            queue.push_back(node_idx);

            while let Some(current) = queue.pop_front() {
                for neighbor in self.graph.neighbors(current) {
                    if deps.insert(self.graph[neighbor].clone()) {
                        queue.push_back(neighbor);
                    }
                }
            }
        }

        deps
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_dependency_chain() {
        let mut graph = DependencyGraph::new();

        // A -> B -> C
        graph.add_dependency("A", "B");
        graph.add_dependency("B", "C");

        assert!(graph.detect_cycles().is_ok());

        let order = graph.topological_order().unwrap();
        assert_eq!(order, ["C", "B", "A"]);
    }

    #[test]
    fn test_circular_dependency_detection() {
        let mut graph = DependencyGraph::new();

        graph.add_dependency("A", "B");
        graph.add_dependency("B", "C");
        graph.add_dependency("C", "A");

        let err = graph.detect_cycles().unwrap_err();
        let known = err.downcast_ref::<SuperbuildError>().unwrap();
        assert_eq!(
            known,
            &SuperbuildError::CircularDependency {
                chain: "A → B → C → A".to_string()
            }
        );
        assert!(graph.topological_order().is_err());
    }

    #[test]
    fn test_diamond_order() {
        let mut graph = DependencyGraph::new();
        // top needs left and right, both need base
        graph.add_dependency("top", "left");
        graph.add_dependency("top", "right");
        graph.add_dependency("left", "base");
        graph.add_dependency("right", "base");

        let order = graph.topological_order().unwrap();
        let pos = |n: &str| order.iter().position(|x| x == n).unwrap();
        assert!(pos("base") < pos("left"));
        assert!(pos("base") < pos("right"));
        assert!(pos("left") < pos("top"));
        assert!(pos("right") < pos("top"));
    }

    #[test]
    fn test_transitive_prerequisites() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("casadi", "ipopt");
        graph.add_dependency("ipopt", "mumps");
        graph.add_node("eigen");

        let deps = graph.transitive_prerequisites("casadi");
        assert_eq!(deps.into_iter().collect::<Vec<_>>(), ["ipopt", "mumps"]);
        assert!(graph.transitive_prerequisites("eigen").is_empty());
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_duplicate_edges_collapsed() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("a", "b");
        graph.add_dependency("a", "b");
        assert_eq!(graph.edge_count(), 1);
    }
}
