//! Bounded breadth-first traversal over patch neighbor links.

use std::collections::{HashSet, VecDeque};

use super::graph::TraversabilityGraph;
use super::patch::PatchId;

/// What the visitor callback decides for each visited patch.
pub struct VisitControl {
    /// Stop the whole traversal after this patch
    pub abort: bool,
    /// Enqueue this patch's neighbors
    pub visit_children: bool,
}

/// Breadth-first visit of patches reachable over neighbor links.
///
/// The callback receives each patch id and its link-distance from the root
/// and steers the traversal. Unexpanded patches are visited but their
/// children are unreachable (they have no links yet).
pub fn visit_breadth_first<F>(graph: &TraversabilityGraph, root: PatchId, mut callback: F)
where
    F: FnMut(PatchId, usize) -> VisitControl,
{
    let mut visited: HashSet<PatchId> = HashSet::new();
    let mut queue: VecDeque<(PatchId, usize)> = VecDeque::new();

    visited.insert(root);
    queue.push_back((root, 0));

    while let Some((id, depth)) = queue.pop_front() {
        let control = callback(id, depth);
        if control.abort {
            return;
        }
        if !control.visit_children {
            continue;
        }
        for neighbor in graph.patch(id).neighbors() {
            if visited.insert(neighbor) {
                queue.push_back((neighbor, depth + 1));
            }
        }
    }
}
