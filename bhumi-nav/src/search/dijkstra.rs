//! Dijkstra distance fields over the driveability layer.
//!
//! Backs the admissible search heuristic and the frontier travel costs:
//! along-graph distances are lower bounds on any drivable path, so time
//! derived from them never overestimates.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::traversability::{PatchId, PatchKind, TraversabilityGraph};

/// Sentinel distance for unreachable patches.
///
/// Finite so that downstream multiplications (cost scale, speed division)
/// stay representable; large enough to dominate any real map distance.
pub const UNREACHABLE: f32 = 1.0e8;

/// Entry in the Dijkstra frontier heap.
struct HeapNode {
    patch: PatchId,
    distance: f32,
}

impl PartialEq for HeapNode {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance
    }
}

impl Eq for HeapNode {}

impl Ord for HeapNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (smaller distance = higher priority)
        other
            .distance
            .partial_cmp(&self.distance)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for HeapNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Dense shortest-path distances from a source patch.
pub struct DistanceField {
    distances: Vec<f32>,
}

impl DistanceField {
    /// Shortest-path distances from `source` over driveability links.
    ///
    /// Edges are weighted by the 3D Euclidean distance between patch
    /// centers. Only Traversable patches are relaxed; everything else keeps
    /// the [`UNREACHABLE`] sentinel.
    pub fn compute(graph: &TraversabilityGraph, source: PatchId) -> Self {
        let mut distances = vec![UNREACHABLE; graph.num_patches()];
        let mut heap = BinaryHeap::new();

        distances[source] = 0.0;
        heap.push(HeapNode {
            patch: source,
            distance: 0.0,
        });

        while let Some(HeapNode { patch, distance }) = heap.pop() {
            if distance > distances[patch] {
                continue; // stale entry
            }
            let current = graph.patch(patch);
            let current_pos = graph.position(&current);

            for neighbor_id in current.neighbors() {
                let neighbor = graph.patch(neighbor_id);
                if neighbor.kind() != PatchKind::Traversable {
                    continue;
                }
                let weight = current_pos.distance(&graph.position(&neighbor));
                let candidate = distance + weight;
                if candidate < distances[neighbor_id] {
                    distances[neighbor_id] = candidate;
                    heap.push(HeapNode {
                        patch: neighbor_id,
                        distance: candidate,
                    });
                }
            }
        }

        Self { distances }
    }

    /// Distance to a patch; [`UNREACHABLE`] for patches outside the field
    /// (including patches created after it was computed).
    #[inline]
    pub fn distance(&self, patch: PatchId) -> f32 {
        self.distances.get(patch).copied().unwrap_or(UNREACHABLE)
    }

    /// Whether the patch was reached.
    #[inline]
    pub fn is_reachable(&self, patch: PatchId) -> bool {
        self.distance(patch) < UNREACHABLE
    }
}
