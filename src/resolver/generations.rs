//! Topological generations.
//!
//! A stack's generation is one more than the highest generation among its
//! dependencies; stacks without dependencies form generation 0. Stacks of
//! one generation have no dependency on each other and can be deployed
//! concurrently. Within a generation stacks keep configuration order.

use anyhow::Result;
use std::collections::HashMap;

use crate::resolver::dependency_graph::StackGraph;

/// Split the graph into generations, dependencies first.
pub fn compute_generations(graph: &StackGraph) -> Result<Vec<Vec<String>>> {
    let order = graph.topological_order()?;

    let mut level: HashMap<String, usize> = HashMap::with_capacity(order.len());
    for name in &order {
        let generation = graph
            .direct_deps(name)
            .iter()
            .filter_map(|dep| level.get(dep))
            .map(|g| g + 1)
            .max()
            .unwrap_or(0);
        level.insert(name.clone(), generation);
    }

    let depth = level.values().max().map_or(0, |max| max + 1);
    let mut generations = vec![Vec::new(); depth];
    for name in graph.nodes() {
        if let Some(&generation) = level.get(&name) {
            generations[generation].push(name);
        }
    }

    for (idx, generation) in generations.iter().enumerate() {
        tracing::debug!("Generation {idx}: {}", generation.join(", "));
    }

    Ok(generations)
}
