//! Search state bookkeeping: XYZ nodes, theta nodes, and state ids.
//!
//! The search grid holds one XYZ node per reached driveability patch; each
//! XYZ node holds one theta node per reached heading. Theta nodes are the
//! integer states handed to the outer search, allocated in strictly
//! increasing order.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::core::{DiscreteTheta, GridIndex};
use crate::traversability::{Patch, PatchId};

/// Integer state handle used by the outer search.
pub type StateId = usize;

/// Index of an XYZ node in the state table.
pub type XyzNodeId = usize;

/// A reached (cell, height) location on the driveability layer.
pub struct XyzNode {
    /// Backing driveability patch
    pub patch: PatchId,
    pub index: GridIndex,
    pub height: f32,
    /// Theta nodes of this location; guarded separately so concurrent
    /// successor workers can allocate without contending on the whole table
    theta_nodes: Mutex<HashMap<i32, StateId>>,
}

/// Table of all states reached during a planning run.
pub struct StateTable {
    nodes: RwLock<Vec<Arc<XyzNode>>>,
    /// Per-cell XYZ nodes; the mutex serializes XYZ-node allocation
    grid: Mutex<HashMap<GridIndex, Vec<XyzNodeId>>>,
    /// Dense state records: id → (node, heading)
    states: RwLock<Vec<(XyzNodeId, DiscreteTheta)>>,
}

impl StateTable {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(Vec::new()),
            grid: Mutex::new(HashMap::new()),
            states: RwLock::new(Vec::new()),
        }
    }

    /// Number of states allocated so far.
    pub fn num_states(&self) -> usize {
        self.states.read().len()
    }

    /// Resolve a state id to its location and heading.
    ///
    /// Panics on an id that was never allocated, which would be an internal
    /// bug of the caller.
    pub fn state(&self, id: StateId) -> (Arc<XyzNode>, DiscreteTheta) {
        let (node_id, theta) = self.states.read()[id];
        (self.nodes.read()[node_id].clone(), theta)
    }

    /// XYZ node by id.
    pub fn node(&self, id: XyzNodeId) -> Arc<XyzNode> {
        self.nodes.read()[id].clone()
    }

    /// Find or allocate the XYZ node of a driveability patch.
    ///
    /// Serialized on the search-grid mutex.
    pub fn find_or_create_xyz(&self, patch: &Patch, height: f32) -> XyzNodeId {
        let mut grid = self.grid.lock();
        let cell = grid.entry(patch.index()).or_default();
        let existing = {
            let nodes = self.nodes.read();
            cell.iter()
                .copied()
                .find(|&id| nodes[id].patch == patch.id())
        };
        if let Some(id) = existing {
            return id;
        }

        let mut nodes = self.nodes.write();
        let id = nodes.len();
        nodes.push(Arc::new(XyzNode {
            patch: patch.id(),
            index: patch.index(),
            height,
            theta_nodes: Mutex::new(HashMap::new()),
        }));
        cell.push(id);
        id
    }

    /// Find or allocate the state for (node, heading).
    ///
    /// Serialized on the node's theta mutex; the state id itself is
    /// assigned atomically in allocation order.
    pub fn find_or_create_state(&self, node_id: XyzNodeId, theta: DiscreteTheta) -> StateId {
        let node = self.node(node_id);
        let mut thetas = node.theta_nodes.lock();
        if let Some(&existing) = thetas.get(&theta.index()) {
            return existing;
        }

        let mut states = self.states.write();
        let id = states.len();
        states.push((node_id, theta));
        thetas.insert(theta.index(), id);
        id
    }

    /// Drop every node and state.
    pub fn clear(&self) {
        self.nodes.write().clear();
        self.grid.lock().clear();
        self.states.write().clear();
    }
}

impl Default for StateTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traversability::Patch;

    fn patch(id: PatchId, x: i32, y: i32, height: f32) -> Patch {
        Patch::new(id, GridIndex::new(x, y), height)
    }

    #[test]
    fn test_state_ids_are_monotone_and_stable() {
        let table = StateTable::new();
        let p0 = patch(0, 1, 1, 0.0);
        let p1 = patch(1, 2, 1, 0.0);

        let n0 = table.find_or_create_xyz(&p0, 0.0);
        let n1 = table.find_or_create_xyz(&p1, 0.0);

        let s0 = table.find_or_create_state(n0, DiscreteTheta::new(0, 16));
        let s1 = table.find_or_create_state(n0, DiscreteTheta::new(3, 16));
        let s2 = table.find_or_create_state(n1, DiscreteTheta::new(0, 16));

        assert_eq!((s0, s1, s2), (0, 1, 2));

        // Lookups resolve back to the same (patch, theta)
        let (node, theta) = table.state(s1);
        assert_eq!(node.patch, 0);
        assert_eq!(theta.index(), 3);
    }

    #[test]
    fn test_allocation_is_idempotent() {
        let table = StateTable::new();
        let p = patch(7, 4, 4, 0.2);

        let n = table.find_or_create_xyz(&p, 0.2);
        assert_eq!(table.find_or_create_xyz(&p, 0.2), n);

        let theta = DiscreteTheta::new(5, 16);
        let s = table.find_or_create_state(n, theta);
        assert_eq!(table.find_or_create_state(n, theta), s);
        assert_eq!(table.num_states(), 1);
    }

    #[test]
    fn test_stacked_patches_get_distinct_nodes() {
        let table = StateTable::new();
        // Two patches in the same cell at different heights
        let low = patch(0, 3, 3, 0.0);
        let high = patch(1, 3, 3, 1.5);

        let n_low = table.find_or_create_xyz(&low, 0.0);
        let n_high = table.find_or_create_xyz(&high, 1.5);
        assert_ne!(n_low, n_high);
    }

    #[test]
    fn test_clear_resets_ids() {
        let table = StateTable::new();
        let p = patch(0, 0, 0, 0.0);
        let n = table.find_or_create_xyz(&p, 0.0);
        table.find_or_create_state(n, DiscreteTheta::new(0, 16));
        assert_eq!(table.num_states(), 1);

        table.clear();
        assert_eq!(table.num_states(), 0);

        let n = table.find_or_create_xyz(&p, 0.0);
        let s = table.find_or_create_state(n, DiscreteTheta::new(0, 16));
        assert_eq!(s, 0);
    }
}
