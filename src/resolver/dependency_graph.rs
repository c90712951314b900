//! Stack dependency graph.
//!
//! Nodes are environment-suffixed stack names; an edge `a → b` means "`a`
//! depends on `b`", so `b` must be deployed first. Only named, enabled stacks
//! become nodes. Node indices follow configuration order, which keeps every
//! traversal deterministic.

use anyhow::Result;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::config::{DeploymentConfig, suffixed_stack_name};
use crate::core::DeployError;

/// Color states for cycle detection using DFS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Node has not been visited.
    White,
    /// Node is currently being visited (in the DFS stack).
    Gray,
    /// Node has been fully visited.
    Black,
}

/// Directed graph over stack names.
#[derive(Debug, Clone, Default)]
pub struct StackGraph {
    /// The underlying directed graph.
    graph: DiGraph<String, ()>,
    /// Map from stack names to their graph indices.
    node_map: HashMap<String, NodeIndex>,
}

impl StackGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph for a configuration.
    ///
    /// Every dependency of an enabled stack must name a stack of the same
    /// configuration ([`DeployError::DependencyNotFound`]) that is not
    /// disabled ([`DeployError::DisabledDependency`]). Cycles are rejected
    /// with [`DeployError::CircularDependency`].
    pub fn build(config: &DeploymentConfig) -> Result<Self> {
        let environment = Some(config.environment.as_str());
        let mut graph = Self::new();

        let mut known = HashSet::new();
        let mut disabled = HashSet::new();
        for stack in &config.stacks {
            let Some(full_name) = stack.full_name(environment) else {
                continue;
            };
            if stack.disabled {
                disabled.insert(full_name.clone());
            } else {
                graph.add_stack(&full_name);
            }
            known.insert(full_name);
        }

        for stack in config.stacks.iter().filter(|s| !s.disabled) {
            let Some(stack_name) = stack.full_name(environment) else {
                continue;
            };
            for dependency in &stack.dependencies {
                let dependency = suffixed_stack_name(dependency, environment);
                if !known.contains(&dependency) {
                    return Err(DeployError::DependencyNotFound {
                        stack: stack_name,
                        dependency,
                    }
                    .into());
                }
                if disabled.contains(&dependency) {
                    return Err(DeployError::DisabledDependency {
                        stack: stack_name,
                        dependency,
                    }
                    .into());
                }
                graph.add_dependency(&stack_name, &dependency);
            }
        }

        graph.detect_cycles()?;
        Ok(graph)
    }

    /// Add a node to the graph if it doesn't already exist.
    ///
    /// Returns the node index in the graph.
    pub fn add_stack(&mut self, name: &str) -> NodeIndex {
        if let Some(&index) = self.node_map.get(name) {
            index
        } else {
            let index = self.graph.add_node(name.to_string());
            self.node_map.insert(name.to_string(), index);
            index
        }
    }

    /// Add a dependency relationship to the graph.
    ///
    /// `from` depends on `to`, meaning `to` must be deployed before `from`.
    pub fn add_dependency(&mut self, from: &str, to: &str) {
        let from_idx = self.add_stack(from);
        let to_idx = self.add_stack(to);

        if !self.graph.contains_edge(from_idx, to_idx) {
            self.graph.add_edge(from_idx, to_idx, ());
        }
    }

    /// Detect cycles using DFS with colors.
    ///
    /// The error names the cycle as `a → b → a`.
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
                return Err(DeployError::CircularDependency {
                    chain,
                }
                .into());
            }
        }

        Ok(())
    }

    /// DFS visit for cycle detection.
    ///
    /// Returns `Some(cycle_path)` if a cycle is detected, None otherwise.
    fn dfs_visit(
        &self,
        node: NodeIndex,
        colors: &mut HashMap<NodeIndex, Color>,
        path: &mut Vec<NodeIndex>,
    ) -> Option<Vec<NodeIndex>> {
        colors.insert(node, Color::Gray);
        path.push(node);

        for neighbor in self.direct_indices(node) {
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

    /// Direct dependencies of a node in insertion order.
    ///
    /// petgraph iterates outgoing edges newest first, so the list is reversed.
    fn direct_indices(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut neighbors: Vec<_> = self.graph.neighbors(node).collect();
        neighbors.reverse();
        neighbors
    }

    /// Stacks in an order where every dependency comes before its dependents.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        self.detect_cycles()?;

        match toposort(&self.graph, None) {
            Ok(indices) => Ok(indices.into_iter().rev().map(|idx| self.graph[idx].clone()).collect()),
            Err(cycle) => Err(DeployError::CircularDependency {
                chain: self.graph[cycle.node_id()].clone(),
            }
            .into()),
        }
    }

    /// Every stack `name` depends on, directly or indirectly.
    pub fn transitive_deps(&self, name: &str) -> BTreeSet<String> {
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

    /// Direct dependencies of `name`, in declaration order.
    pub fn direct_deps(&self, name: &str) -> Vec<String> {
        match self.node_map.get(name) {
            Some(&idx) => {
                self.direct_indices(idx).into_iter().map(|n| self.graph[n].clone()).collect()
            }
            None => Vec::new(),
        }
    }

    /// Whether `name` is a node.
    pub fn contains(&self, name: &str) -> bool {
        self.node_map.contains_key(name)
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Get the total number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get the total number of edges (dependencies) in the graph.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// All stack names in configuration order.
    pub fn nodes(&self) -> Vec<String> {
        self.graph.node_indices().map(|idx| self.graph[idx].clone()).collect()
    }
}
