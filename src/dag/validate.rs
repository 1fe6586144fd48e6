// src/dag/validate.rs

//! Structural validation of an action graph.
//!
//! Checks, in order:
//! - every declared dependency refers to a registered action
//! - the dependency relation is acyclic
//!
//! [`validate_plan`] applies the same checks to a hand-built run plan, plus
//! duplicate ids and self edges which a registered graph rules out earlier.
//!
//! Cycle detection is a depth-first traversal with a "visiting" set (nodes on
//! the current path) and a "visited" set (nodes fully explored). Reaching a
//! node that is still "visiting" closes a cycle, and the current path from
//! that node onwards is reported.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::action::{Action, ActionId};
use crate::engine::PlannedAction;
use crate::errors::{GraphError, Result};

pub(crate) fn validate_actions(order: &[ActionId], actions: &HashMap<ActionId, Action>) -> Result<()> {
    check_references(order, actions)?;

    match find_cycle(order, actions) {
        Some(path) => Err(GraphError::CyclicGraph { path }),
        None => Ok(()),
    }
}

fn check_references(order: &[ActionId], actions: &HashMap<ActionId, Action>) -> Result<()> {
    for id in order {
        let Some(action) = actions.get(id) else {
            continue;
        };
        for dep in action.dependencies() {
            if !actions.contains_key(dep) {
                return Err(GraphError::UnknownAction {
                    id: dep.clone(),
                    referenced_by: Some(id.clone()),
                });
            }
        }
    }
    Ok(())
}

static NO_DEPENDENCIES: BTreeSet<ActionId> = BTreeSet::new();

fn dependencies<'a>(actions: &'a HashMap<ActionId, Action>, id: &ActionId) -> &'a BTreeSet<ActionId> {
    actions
        .get(id)
        .map(|a| a.dependencies())
        .unwrap_or(&NO_DEPENDENCIES)
}

/// Check a run plan before it is turned into per-run state.
pub(crate) fn validate_plan(plan: &[PlannedAction]) -> Result<()> {
    let mut by_id: HashMap<&ActionId, &PlannedAction> = HashMap::with_capacity(plan.len());
    for planned in plan {
        if by_id.insert(&planned.id, planned).is_some() {
            return Err(GraphError::DuplicateAction(planned.id.clone()));
        }
    }

    for planned in plan {
        for dep in &planned.dependencies {
            if *dep == planned.id {
                return Err(GraphError::SelfDependency(planned.id.clone()));
            }
            if !by_id.contains_key(dep) {
                return Err(GraphError::UnknownAction {
                    id: dep.clone(),
                    referenced_by: Some(planned.id.clone()),
                });
            }
        }
    }

    let order: Vec<ActionId> = plan.iter().map(|p| p.id.clone()).collect();
    let cycle = find_cycle_by(&order, |id: &ActionId| {
        by_id
            .get(id)
            .copied()
            .map(|p| p.dependencies.iter())
            .into_iter()
            .flatten()
    });
    match cycle {
        Some(path) => Err(GraphError::CyclicGraph { path }),
        None => Ok(()),
    }
}

/// Returns a closed path `[a, b, ..., a]` in dependency order if the graph
/// has a cycle. Roots are tried in registration order and dependencies in
/// sorted order, so the reported cycle is deterministic.
///
/// Assumes all references are registered.
pub(crate) fn find_cycle(
    order: &[ActionId],
    actions: &HashMap<ActionId, Action>,
) -> Option<Vec<ActionId>> {
    find_cycle_by(order, |id: &ActionId| dependencies(actions, id).iter())
}

fn find_cycle_by<'a, F, I>(order: &'a [ActionId], dependencies_of: F) -> Option<Vec<ActionId>>
where
    F: Fn(&ActionId) -> I,
    I: Iterator<Item = &'a ActionId>,
{
    let mut visited: HashSet<&ActionId> = HashSet::new();
    let mut visiting: HashSet<&ActionId> = HashSet::new();

    for root in order {
        if visited.contains(root) {
            continue;
        }

        let mut path: Vec<&ActionId> = vec![root];
        let mut stack = vec![dependencies_of(root)];
        visiting.insert(root);

        while let Some(frame) = stack.last_mut() {
            match frame.next() {
                Some(dep) => {
                    if visiting.contains(dep) {
                        let start = path.iter().position(|n| *n == dep).unwrap_or(0);
                        let mut cycle: Vec<ActionId> =
                            path[start..].iter().map(|n| (*n).clone()).collect();
                        cycle.push(dep.clone());
                        return Some(cycle);
                    }
                    if visited.contains(dep) {
                        continue;
                    }
                    visiting.insert(dep);
                    path.push(dep);
                    stack.push(dependencies_of(dep));
                }
                None => {
                    stack.pop();
                    if let Some(done) = path.pop() {
                        visiting.remove(done);
                        visited.insert(done);
                    }
                }
            }
        }
    }

    None
}
