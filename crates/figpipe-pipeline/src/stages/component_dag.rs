use std::collections::{BTreeMap, BTreeSet, HashMap};

use figpipe_types::{ComponentBatch, ComponentGraph, ComponentGraphNode, DesignIr, FlatNode};

const COMPONENT_TYPES: [&str; 4] = ["FRAME", "COMPONENT", "INSTANCE", "GROUP"];

fn is_component(node: &FlatNode) -> bool {
    COMPONENT_TYPES.contains(&node.node_type.as_str())
}

/// Classify structural nodes and assign topological batches.
///
/// A component depends on its direct structural children. Batches are Kahn
/// levels, so leaf components land in batch 0 and a parent always lands in a
/// later batch than each of its dependencies.
pub fn build_component_dag(design_ir: &DesignIr) -> ComponentGraph {
    let by_id: HashMap<&str, &FlatNode> = design_ir
        .nodes
        .iter()
        .filter(|n| !n.id.is_empty())
        .map(|n| (n.id.as_str(), n))
        .collect();

    let mut children_map: HashMap<&str, Vec<&str>> = HashMap::new();
    for node in &design_ir.nodes {
        if let Some(parent) = node.parent_id.as_deref().filter(|p| !p.is_empty()) {
            if !node.id.is_empty() {
                children_map.entry(parent).or_default().push(node.id.as_str());
            }
        }
    }

    let component_ids: Vec<&str> = design_ir
        .ordering
        .iter()
        .map(String::as_str)
        .filter(|id| by_id.get(id).is_some_and(|n| is_component(n)))
        .collect();

    let deps_map: BTreeMap<&str, Vec<String>> = component_ids
        .iter()
        .map(|&id| {
            let deps: BTreeSet<String> = children_map
                .get(id)
                .into_iter()
                .flatten()
                .filter(|child| by_id.get(*child).is_some_and(|n| is_component(n)))
                .map(|child| child.to_string())
                .collect();
            (id, deps.into_iter().collect())
        })
        .collect();

    let batch_for = topological_batches(&component_ids, &deps_map);

    let components: Vec<ComponentGraphNode> = component_ids
        .iter()
        .enumerate()
        .map(|(priority, &id)| ComponentGraphNode {
            component_id: id.to_string(),
            deps: deps_map.get(id).cloned().unwrap_or_default(),
            batch: batch_for.get(id).copied().unwrap_or(0),
            priority,
        })
        .collect();

    let mut grouped: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for row in &components {
        grouped.entry(row.batch).or_default().push(row.component_id.clone());
    }
    let batches = grouped
        .into_iter()
        .map(|(batch, mut components)| {
            components.sort();
            ComponentBatch { batch, components }
        })
        .collect();

    ComponentGraph {
        components,
        batches,
    }
}

/// Kahn level batching. Nodes left over by a cycle share one final batch.
fn topological_batches<'a>(
    component_ids: &[&'a str],
    deps_map: &BTreeMap<&'a str, Vec<String>>,
) -> HashMap<&'a str, usize> {
    let mut indegree: HashMap<&str, usize> = component_ids
        .iter()
        .map(|&id| (id, deps_map.get(id).map_or(0, Vec::len)))
        .collect();

    let mut dependents: HashMap<&str, Vec<&'a str>> = HashMap::new();
    for (&id, deps) in deps_map {
        for dep in deps {
            dependents.entry(dep.as_str()).or_default().push(id);
        }
    }

    let mut level: Vec<&'a str> = component_ids
        .iter()
        .copied()
        .filter(|id| indegree.get(id) == Some(&0))
        .collect();
    let mut batch_for: HashMap<&'a str, usize> = HashMap::new();
    let mut current_batch = 0;

    while !level.is_empty() {
        level.sort_unstable();
        level.dedup();
        let mut next = Vec::new();
        for &id in &level {
            batch_for.insert(id, current_batch);
            let Some(waiting) = dependents.get(id) else {
                continue;
            };
            let mut waiting = waiting.clone();
            waiting.sort_unstable();
            for dependent in waiting {
                if let Some(count) = indegree.get_mut(dependent) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        next.push(dependent);
                    }
                }
            }
        }
        level = next;
        current_batch += 1;
    }

    if batch_for.len() != component_ids.len() {
        let mut unresolved: Vec<&'a str> = component_ids
            .iter()
            .copied()
            .filter(|id| !batch_for.contains_key(id))
            .collect();
        unresolved.sort_unstable();
        tracing::warn!(count = unresolved.len(), "Component cycle detected; using final batch");
        for id in unresolved {
            batch_for.insert(id, current_batch);
        }
    }

    batch_for
}
