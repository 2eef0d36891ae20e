//! Patches: the nodes of a traversability graph.

use std::sync::OnceLock;

use crate::core::{AngleSegment, GridIndex};

/// Index of a patch in its graph's arena.
pub type PatchId = usize;

/// Offsets of the 8 neighbor cells, in slot order.
pub const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Neighbor slot for a cell offset, `None` for non-adjacent offsets.
#[inline]
pub fn neighbor_slot(dx: i32, dy: i32) -> Option<usize> {
    NEIGHBOR_OFFSETS.iter().position(|&(ox, oy)| ox == dx && oy == dy)
}

/// Terrain classification of a patch.
///
/// A patch starts `Unset`; expansion classifies it exactly once and the
/// classification never changes afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchKind {
    /// Referenced but never observed; like `Unset`, a pre-classification
    /// state that expansion always resolves
    Unknown,
    /// Created but not yet expanded
    Unset,
    /// The robot can stand here
    Traversable,
    /// Too steep or otherwise undriveable
    Obstacle,
    /// Traversable terrain adjacent to unobserved cells
    Frontier,
}

/// Data resolved by expansion. Written once, immutable afterwards.
#[derive(Debug, Clone)]
pub struct ExpandedData {
    /// Terrain classification
    pub kind: PatchKind,
    /// Local terrain incline in radians
    pub slope: f32,
    /// Headings the robot may assume on this patch without exceeding its
    /// roll/pitch limits; at most two segments
    pub allowed_headings: Vec<AngleSegment>,
    /// Links to the vertically closest patch in each of the 8 neighbor
    /// cells, absent where the height step is too large
    pub neighbors: [Option<PatchId>; 8],
}

/// One surface patch of a traversability graph.
///
/// The index, height, and id are fixed at creation; everything else is
/// resolved by [expansion](crate::traversability::TraversabilityGraph::expand)
/// behind a `OnceLock`, which gives lock-free `is_expanded` checks with
/// acquire/release semantics.
#[derive(Debug)]
pub struct Patch {
    id: PatchId,
    index: GridIndex,
    height: f32,
    expanded: OnceLock<ExpandedData>,
}

impl Patch {
    pub(crate) fn new(id: PatchId, index: GridIndex, height: f32) -> Self {
        Self {
            id,
            index,
            height,
            expanded: OnceLock::new(),
        }
    }

    /// Sequential id of this patch within its graph.
    #[inline]
    pub fn id(&self) -> PatchId {
        self.id
    }

    /// Grid cell of this patch.
    #[inline]
    pub fn index(&self) -> GridIndex {
        self.index
    }

    /// Surface height in meters.
    #[inline]
    pub fn height(&self) -> f32 {
        self.height
    }

    /// Whether expansion has resolved this patch. Lock-free.
    #[inline]
    pub fn is_expanded(&self) -> bool {
        self.expanded.get().is_some()
    }

    /// Expansion result, if resolved.
    #[inline]
    pub fn expanded(&self) -> Option<&ExpandedData> {
        self.expanded.get()
    }

    /// Classification; `Unset` before expansion.
    #[inline]
    pub fn kind(&self) -> PatchKind {
        self.expanded.get().map_or(PatchKind::Unset, |d| d.kind)
    }

    /// Local slope in radians; 0 before expansion.
    #[inline]
    pub fn slope(&self) -> f32 {
        self.expanded.get().map_or(0.0, |d| d.slope)
    }

    /// Neighbor link toward an adjacent cell, if present.
    pub fn neighbor_toward(&self, to: GridIndex) -> Option<PatchId> {
        let data = self.expanded.get()?;
        let slot = neighbor_slot(to.x - self.index.x, to.y - self.index.y)?;
        data.neighbors[slot]
    }

    /// All resolved neighbor links.
    pub fn neighbors(&self) -> impl Iterator<Item = PatchId> + '_ {
        self.expanded
            .get()
            .into_iter()
            .flat_map(|d| d.neighbors.iter().flatten().copied())
    }

    /// Whether the robot may stand on this patch with the given heading.
    ///
    /// Unexpanded patches allow nothing.
    pub fn heading_allowed(&self, heading: f32) -> bool {
        self.expanded
            .get()
            .map_or(false, |d| d.allowed_headings.iter().any(|s| s.contains(heading)))
    }

    /// Store the expansion result. Idempotent: later calls keep the first
    /// classification.
    pub(crate) fn set_expanded(&self, data: ExpandedData) {
        let _ = self.expanded.set(data);
    }
}
