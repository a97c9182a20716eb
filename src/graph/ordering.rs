//! Parents-before-children ordering within one scope.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

use super::{Item, Items};
use crate::core::StackyardError;

/// Processing order for `scope` starting from `start_item`.
///
/// The order begins as `[start_item]`. Walking depth-first, each in-scope parent of
/// the current item that is not yet placed is inserted immediately before the current
/// item and then expanded in turn; parents are visited in declaration order. Parents
/// that are already placed are skipped, which is also what makes cycles terminate.
/// Items outside `scope` are neither placed nor traversed, and a start item outside
/// `scope` gives an empty order.
///
/// ```
/// use stackyard::graph::{Item, Items, order_for_scope};
///
/// let mut items = Items::new();
/// for name in ["app", "network"] {
///     items.add_item(Item::new(name));
///     items.add_scope(name, "dev", true).unwrap();
/// }
/// items.add_link_to_parent("network", "app").unwrap();
///
/// assert_eq!(order_for_scope(&items, "dev", "app").unwrap(), vec!["network", "app"]);
/// ```
pub fn order_for_scope(
    items: &Items,
    scope: &str,
    start_item: &str,
) -> Result<Vec<String>, StackyardError> {
    let start = items.get_item_by_name(start_item)?;
    if !start.in_scope(scope) {
        tracing::debug!(target: "graph", "'{}' is not part of scope '{}'", start_item, scope);
        return Ok(Vec::new());
    }

    let mut order = vec![start.name().to_string()];
    place_parents(items, scope, start, &mut order)?;
    tracing::debug!(target: "graph", "Order for '{}' from '{}': {:?}", scope, start_item, order);
    Ok(order)
}

fn place_parents(
    items: &Items,
    scope: &str,
    current: &Item,
    order: &mut Vec<String>,
) -> Result<(), StackyardError> {
    for parent_name in current.parent_names() {
        let parent = items.get_item_by_name(parent_name)?;
        if !parent.in_scope(scope) || order.iter().any(|placed| placed == parent_name) {
            continue;
        }

        let position = order.iter().position(|placed| placed == current.name()).unwrap_or(0);
        order.insert(position, parent_name.clone());
        place_parents(items, scope, parent, order)?;
    }
    Ok(())
}

/// Groups of items in `scope` that depend on each other cyclically.
///
/// Cycles are tolerated by [`order_for_scope`]; this is only used to report them.
/// Each group is sorted by name, and groups are sorted by their first member.
pub fn scope_cycles(items: &Items, scope: &str) -> Vec<Vec<String>> {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut node_map: HashMap<&str, NodeIndex> = HashMap::new();

    for item in items.iter().filter(|item| item.in_scope(scope)) {
        node_map.insert(item.name(), graph.add_node(item.name()));
    }

    for item in items.iter().filter(|item| item.in_scope(scope)) {
        let child = node_map[item.name()];
        for parent in item.parent_names() {
            if let Some(&parent_idx) = node_map.get(parent.as_str()) {
                graph.update_edge(parent_idx, child, ());
            }
        }
    }

    let mut cycles: Vec<Vec<String>> = tarjan_scc(&graph)
        .into_iter()
        .filter(|component| {
            component.len() > 1 || graph.contains_edge(component[0], component[0])
        })
        .map(|component| {
            let mut names: Vec<String> =
                component.into_iter().map(|idx| graph[idx].to_string()).collect();
            names.sort();
            names
        })
        .collect();
    cycles.sort();
    cycles
}
