//! Dependency-first resolution of calculation chains.
//!
//! A calculation can only be translated once everything it references has
//! been translated, so the resolver walks the graph depth-first and emits each
//! node after all of its dependencies (post-order).

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::error::{CalcError, CalcResult};
use super::graph::{CalculationGraph, CalculationNode};

/// The outcome of resolving one or more targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Nodes in dependency-first order; every node appears once.
    pub order: Vec<CalculationNode>,
    /// Referenced ids that are not part of the graph, in first-seen order.
    pub unresolved: Vec<String>,
    /// Nodes left out of `order` because their chain reaches a cycle.
    /// Always empty for a strict [`resolve`].
    pub blocked: Vec<BlockedNode>,
}

impl Resolution {
    pub fn ids(&self) -> Vec<&str> {
        self.order.iter().map(|n| n.source_id.as_str()).collect()
    }

    pub fn blocked_ids(&self) -> Vec<&str> {
        self.blocked.iter().map(|b| b.node.source_id.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty() && self.blocked.is_empty()
    }

    fn merge(&mut self, other: Resolution) {
        self.order.extend(other.order);
        self.blocked.extend(other.blocked);
        for missing in other.unresolved {
            if !self.unresolved.contains(&missing) {
                self.unresolved.push(missing);
            }
        }
    }
}

/// A node that cannot be ordered because it is on, or depends on, a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedNode {
    pub node: CalculationNode,
    /// The cycle reached, closing id repeated at the end.
    pub cycle: Vec<String>,
}

impl BlockedNode {
    /// Whether the node is itself a member of its cycle.
    pub fn on_cycle(&self) -> bool {
        self.cycle.iter().any(|id| *id == self.node.source_id)
    }
}

/// Resolve the dependency chain of `start_id`, ending with `start_id` itself.
///
/// # Errors
///
/// - [`CalcError::NotFound`] if `start_id` is not in the graph.
/// - [`CalcError::CyclicDependency`] if the chain loops back on itself.
pub fn resolve(graph: &mut CalculationGraph, start_id: &str) -> CalcResult<Resolution> {
    DependencyResolver::new(graph).resolve(start_id)
}

/// Resolve every calculation in the graph, each emitted exactly once.
///
/// A cycle does not stop the walk: its members and every node above it end
/// up in [`Resolution::blocked`], and all other nodes are still ordered.
pub fn resolve_all(graph: &mut CalculationGraph) -> Resolution {
    let ids: Vec<String> = graph.ids().into_iter().map(str::to_string).collect();
    let mut resolver = DependencyResolver::new(graph);
    let mut combined = Resolution::default();
    for id in ids {
        // Ids come from the graph, so a partial walk cannot fail here.
        if let Ok(part) = resolver.resolve_partial(&id) {
            combined.merge(part);
        }
    }
    combined
}

/// Stateful resolver.
///
/// Nodes emitted by an earlier `resolve` call on the same resolver are not
/// emitted again, so several targets sharing dependencies can be resolved
/// in turn without duplicates.
pub struct DependencyResolver<'g> {
    graph: &'g mut CalculationGraph,
    /// Fully emitted nodes.
    resolved: HashSet<String>,
    /// Nodes reported as blocked by a partial walk, with their cycle.
    blocked: HashMap<String, Vec<String>>,
}

/// Per-call traversal state.
#[derive(Default)]
struct Walk {
    /// Ids currently being expanded, in stack order.
    stack: Vec<String>,
    in_progress: HashSet<String>,
    order: Vec<CalculationNode>,
    unresolved: Vec<String>,
    blocked: Vec<BlockedNode>,
}

impl Walk {
    fn enter(&mut self, id: &str) {
        self.stack.push(id.to_string());
        self.in_progress.insert(id.to_string());
    }

    fn leave(&mut self, id: &str) {
        self.stack.pop();
        self.in_progress.remove(id);
    }

    /// The loop closed by reaching `id` again.
    fn cycle_to(&self, id: &str) -> Vec<String> {
        let start = self.stack.iter().position(|s| s == id).unwrap_or(0);
        let mut path = self.stack[start..].to_vec();
        path.push(id.to_string());
        path
    }

    fn note_unresolved(&mut self, from: &str, missing: &str) {
        if !self.unresolved.iter().any(|u| u == missing) {
            debug!(from, missing, "reference to unknown calculation");
            self.unresolved.push(missing.to_string());
        }
    }

    fn into_resolution(self) -> Resolution {
        Resolution {
            order: self.order,
            unresolved: self.unresolved,
            blocked: self.blocked,
        }
    }
}

impl<'g> DependencyResolver<'g> {
    pub fn new(graph: &'g mut CalculationGraph) -> Self {
        Self {
            graph,
            resolved: HashSet::new(),
            blocked: HashMap::new(),
        }
    }

    /// Whether a node has already been emitted by this resolver.
    pub fn is_resolved(&self, id: &str) -> bool {
        self.resolved.contains(id)
    }

    /// Resolve `start_id`, returning only nodes not emitted by earlier calls.
    pub fn resolve(&mut self, start_id: &str) -> CalcResult<Resolution> {
        if !self.graph.contains(start_id) {
            return Err(CalcError::NotFound(start_id.to_string()));
        }

        let mut walk = Walk::default();
        if let Err(err) = self.visit(start_id, &mut walk) {
            // Roll back so a later call can still emit the nodes of this walk.
            for node in &walk.order {
                self.resolved.remove(&node.source_id);
            }
            return Err(err);
        }

        debug!(
            calculation = start_id,
            nodes = walk.order.len(),
            unresolved = walk.unresolved.len(),
            "resolved dependency chain"
        );
        Ok(walk.into_resolution())
    }

    /// Resolve `start_id` without failing on cycles.
    ///
    /// Nodes with an acyclic chain are emitted as by
    /// [`DependencyResolver::resolve`]. Nodes on a cycle, and nodes that reach
    /// one, go to [`Resolution::blocked`] in dependency-first order, each
    /// reported once per resolver.
    ///
    /// # Errors
    ///
    /// [`CalcError::NotFound`] if `start_id` is not in the graph.
    pub fn resolve_partial(&mut self, start_id: &str) -> CalcResult<Resolution> {
        if !self.graph.contains(start_id) {
            return Err(CalcError::NotFound(start_id.to_string()));
        }

        let mut walk = Walk::default();
        self.visit_partial(start_id, &mut walk);

        debug!(
            calculation = start_id,
            nodes = walk.order.len(),
            blocked = walk.blocked.len(),
            unresolved = walk.unresolved.len(),
            "resolved dependency chain"
        );
        Ok(walk.into_resolution())
    }

    fn visit(&mut self, id: &str, walk: &mut Walk) -> CalcResult<()> {
        if self.resolved.contains(id) {
            return Ok(());
        }
        if walk.in_progress.contains(id) {
            return Err(CalcError::CyclicDependency(walk.cycle_to(id)));
        }

        let dependencies = match self.graph.get_mut(id) {
            Some(node) => node.refresh_dependencies().to_vec(),
            None => return Err(CalcError::NotFound(id.to_string())),
        };

        walk.enter(id);
        for dep in &dependencies {
            if self.graph.contains(dep) {
                self.visit(dep, walk)?;
            } else {
                walk.note_unresolved(id, dep);
            }
        }
        walk.leave(id);

        self.resolved.insert(id.to_string());
        if let Some(node) = self.graph.get(id) {
            walk.order.push(node.clone());
        }
        Ok(())
    }

    /// Returns the blocking cycle when `id` is on or above one.
    fn visit_partial(&mut self, id: &str, walk: &mut Walk) -> Option<Vec<String>> {
        if self.resolved.contains(id) {
            return None;
        }
        if let Some(cycle) = self.blocked.get(id) {
            return Some(cycle.clone());
        }
        if walk.in_progress.contains(id) {
            return Some(walk.cycle_to(id));
        }

        let dependencies = self.graph.get_mut(id)?.refresh_dependencies().to_vec();

        walk.enter(id);
        let mut blocked_by: Option<Vec<String>> = None;
        for dep in &dependencies {
            if !self.graph.contains(dep) {
                walk.note_unresolved(id, dep);
                continue;
            }
            if let Some(cycle) = self.visit_partial(dep, walk) {
                // A cycle through this node wins over one further down.
                let replace = match &blocked_by {
                    None => true,
                    Some(current) => {
                        !current.iter().any(|c| c == id) && cycle.iter().any(|c| c == id)
                    }
                };
                if replace {
                    blocked_by = Some(cycle);
                }
            }
        }
        walk.leave(id);

        let node = self.graph.get(id)?.clone();
        match blocked_by {
            Some(cycle) => {
                self.blocked.insert(id.to_string(), cycle.clone());
                walk.blocked.push(BlockedNode {
                    node,
                    cycle: cycle.clone(),
                });
                Some(cycle)
            }
            None => {
                self.resolved.insert(id.to_string());
                walk.order.push(node);
                None
            }
        }
    }
}
