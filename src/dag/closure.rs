// src/dag/closure.rs

//! Dependency closures and topological ordering on top of `petgraph`.
//!
//! Edge direction: dependency -> dependent. For
//! `Action::new("b", ..).depends_on("a")` we add edge `a -> b`.

use std::collections::{BTreeSet, HashMap};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::{Dfs, Reversed};

use crate::action::{Action, ActionId};

fn build<'a>(
    order: &'a [ActionId],
    actions: &'a HashMap<ActionId, Action>,
) -> DiGraphMap<&'a str, ()> {
    let mut graph: DiGraphMap<&'a str, ()> = DiGraphMap::new();

    for id in order {
        graph.add_node(id.as_str());
    }

    for id in order {
        if let Some(action) = actions.get(id) {
            for dep in action.dependencies() {
                graph.add_edge(dep.as_str(), id.as_str(), ());
            }
        }
    }

    graph
}

/// All actions `id` depends on, directly or transitively.
pub(crate) fn ancestors(
    order: &[ActionId],
    actions: &HashMap<ActionId, Action>,
    id: &str,
) -> BTreeSet<ActionId> {
    let graph = build(order, actions);
    let reversed = Reversed(&graph);
    let mut dfs = Dfs::new(reversed, id);
    let mut out = BTreeSet::new();

    while let Some(node) = dfs.next(reversed) {
        if node != id {
            out.insert(ActionId::from(node));
        }
    }
    out
}

/// All actions that depend on `id`, directly or transitively.
pub(crate) fn descendants(
    order: &[ActionId],
    actions: &HashMap<ActionId, Action>,
    id: &str,
) -> BTreeSet<ActionId> {
    let graph = build(order, actions);
    let mut dfs = Dfs::new(&graph, id);
    let mut out = BTreeSet::new();

    while let Some(node) = dfs.next(&graph) {
        if node != id {
            out.insert(ActionId::from(node));
        }
    }
    out
}

/// One valid execution order. `None` if the graph has a cycle; callers
/// validate first to report the cycle path.
pub(crate) fn topological_order(
    order: &[ActionId],
    actions: &HashMap<ActionId, Action>,
) -> Option<Vec<ActionId>> {
    let graph = build(order, actions);
    toposort(&graph, None)
        .ok()
        .map(|sorted| sorted.into_iter().map(ActionId::from).collect())
}
