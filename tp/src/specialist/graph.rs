//! Specialist dependency graph

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;
use tracing::debug;

use super::{SpecialistKind, SpecialistTask, TaskStatus};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("Dependency cycle: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(" -> "))]
    Cycle(Vec<SpecialistKind>),
}

/// Upstream specialists whose results `kind` reads
pub fn dependencies(kind: SpecialistKind) -> &'static [SpecialistKind] {
    use SpecialistKind::*;
    match kind {
        Destination | Logistics => &[],
        Budget | Culture => &[Destination],
        Booking => &[Logistics, Budget],
        Coordinator => &[Destination, Logistics, Budget, Culture, Booking],
    }
}

/// The subset of specialists a pass runs, with edges between them
///
/// Edges to specialists outside the subset are dropped: those inputs come
/// from the ledger instead.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    edges: BTreeMap<SpecialistKind, Vec<SpecialistKind>>,
}

impl TaskGraph {
    pub fn new(selected: &BTreeSet<SpecialistKind>) -> Self {
        debug!(?selected, "TaskGraph::new: called");
        let edges = selected
            .iter()
            .map(|kind| {
                let deps = dependencies(*kind)
                    .iter()
                    .filter(|d| selected.contains(d))
                    .copied()
                    .collect();
                (*kind, deps)
            })
            .collect();
        Self { edges }
    }

    /// Every specialist
    pub fn full() -> Self {
        Self::new(&SpecialistKind::ALL.into_iter().collect())
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn contains(&self, kind: SpecialistKind) -> bool {
        self.edges.contains_key(&kind)
    }

    /// Pending task records for every node
    pub fn tasks(&self) -> Vec<SpecialistTask> {
        self.edges
            .iter()
            .map(|(kind, deps)| SpecialistTask {
                kind: *kind,
                depends_on: deps.clone(),
                status: TaskStatus::Pending,
            })
            .collect()
    }

    /// Reject graphs with a dependency cycle
    pub fn validate(&self) -> Result<(), GraphError> {
        debug!(nodes = self.edges.len(), "TaskGraph::validate: called");
        let mut visited = BTreeSet::new();
        let mut stack = BTreeSet::new();
        let mut path = Vec::new();
        for kind in self.edges.keys() {
            if !visited.contains(kind) && self.has_cycle(*kind, &mut visited, &mut stack, &mut path) {
                debug!(?path, "TaskGraph::validate: cycle detected");
                return Err(GraphError::Cycle(path));
            }
        }
        Ok(())
    }

    fn has_cycle(
        &self,
        node: SpecialistKind,
        visited: &mut BTreeSet<SpecialistKind>,
        stack: &mut BTreeSet<SpecialistKind>,
        path: &mut Vec<SpecialistKind>,
    ) -> bool {
        visited.insert(node);
        stack.insert(node);
        path.push(node);
        for dep in self.edges.get(&node).into_iter().flatten() {
            if !visited.contains(dep) {
                if self.has_cycle(*dep, visited, stack, path) {
                    return true;
                }
            } else if stack.contains(dep) {
                path.push(*dep);
                return true;
            }
        }
        stack.remove(&node);
        path.pop();
        false
    }

    /// Group nodes into layers; every node's dependencies sit in earlier layers
    ///
    /// Nodes within a layer are independent and may run concurrently.
    pub fn layers(&self) -> Result<Vec<Vec<SpecialistKind>>, GraphError> {
        debug!(nodes = self.edges.len(), "TaskGraph::layers: called");
        self.validate()?;

        let mut remaining: BTreeMap<SpecialistKind, BTreeSet<SpecialistKind>> = self
            .edges
            .iter()
            .map(|(k, deps)| (*k, deps.iter().copied().collect()))
            .collect();
        let mut layers = Vec::new();
        while !remaining.is_empty() {
            let ready: Vec<SpecialistKind> = remaining
                .iter()
                .filter(|(_, deps)| deps.is_empty())
                .map(|(k, _)| *k)
                .collect();
            if ready.is_empty() {
                // validate() already ruled this out
                return Err(GraphError::Cycle(remaining.keys().copied().collect()));
            }
            for kind in &ready {
                remaining.remove(kind);
            }
            for deps in remaining.values_mut() {
                for kind in &ready {
                    deps.remove(kind);
                }
            }
            layers.push(ready);
        }
        debug!(?layers, "TaskGraph::layers: complete");
        Ok(layers)
    }
}
