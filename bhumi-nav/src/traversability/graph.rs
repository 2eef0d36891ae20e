//! Incremental traversability graph over an MLS map.
//!
//! Patches live in an arena; neighbor links are arena indices, so the
//! cyclic neighbor structure involves no ownership cycles and patch ids
//! double as indices into dense side arrays (e.g. the heuristic distance
//! field).

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::config::TraversabilityConfig;
use crate::core::{AngleSegment, GridIndex, WorldPoint3};
use crate::mls::MlsMap;

use super::patch::{ExpandedData, Patch, PatchId, PatchKind, NEIGHBOR_OFFSETS};

/// Which layer a graph models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerRole {
    /// Coarse layer: where the wheel contact point can rest
    Driveability,
    /// Fine layer: the robot body swept through space
    Obstacle,
}

/// Patch arena plus the per-cell index into it.
#[derive(Default)]
struct Arena {
    patches: Vec<Arc<Patch>>,
    cells: HashMap<GridIndex, Vec<PatchId>>,
}

impl Arena {
    /// Existing patch at (idx, height), matched exactly, if any.
    fn find(&self, idx: GridIndex, height: f32) -> Option<PatchId> {
        self.cells.get(&idx).and_then(|ids| {
            ids.iter()
                .copied()
                .find(|&id| (self.patches[id].height() - height).abs() < 1e-4)
        })
    }

    fn insert(&mut self, idx: GridIndex, height: f32) -> PatchId {
        let id = self.patches.len();
        self.patches.push(Arc::new(Patch::new(id, idx, height)));
        self.cells.entry(idx).or_default().push(id);
        id
    }
}

/// Graph of terrain patches, built incrementally from an MLS map.
///
/// Expansion is the only mutating operation. It is double-checked: a
/// lock-free `is_expanded` fast path, then a map-wide mutex under which the
/// classification is recomputed and published exactly once.
pub struct TraversabilityGraph {
    role: LayerRole,
    config: TraversabilityConfig,
    mls: Arc<MlsMap>,
    arena: RwLock<Arena>,
    /// Serializes expansion; held across the whole classification, which is
    /// cheap relative to search
    expansion: Mutex<()>,
}

impl TraversabilityGraph {
    /// Create an empty graph over the given map.
    pub fn new(role: LayerRole, mls: Arc<MlsMap>, config: TraversabilityConfig) -> Self {
        Self {
            role,
            config,
            mls,
            arena: RwLock::new(Arena::default()),
            expansion: Mutex::new(()),
        }
    }

    /// Layer this graph models.
    #[inline]
    pub fn role(&self) -> LayerRole {
        self.role
    }

    /// Number of patches created so far.
    pub fn num_patches(&self) -> usize {
        self.arena.read().patches.len()
    }

    /// Patch by id. Panics on a stale id, which would be an internal bug.
    pub fn patch(&self, id: PatchId) -> Arc<Patch> {
        self.arena.read().patches[id].clone()
    }

    /// All patches of a cell.
    pub fn iter_cell(&self, idx: GridIndex) -> Vec<Arc<Patch>> {
        let arena = self.arena.read();
        arena
            .cells
            .get(&idx)
            .map(|ids| ids.iter().map(|&id| arena.patches[id].clone()).collect())
            .unwrap_or_default()
    }

    /// Patch of a cell vertically closest to `z`, regardless of distance.
    ///
    /// This is the correspondence rule between layers: a driveability patch
    /// maps to the obstacle patch at the same cell with minimal |Δz|.
    pub fn closest_patch(&self, idx: GridIndex, z: f32) -> Option<Arc<Patch>> {
        let arena = self.arena.read();
        arena
            .cells
            .get(&idx)?
            .iter()
            .map(|&id| &arena.patches[id])
            .min_by(|a, b| {
                let da = (a.height() - z).abs();
                let db = (b.height() - z).abs();
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
            .cloned()
    }

    /// Spatial lookup: the patch at the cell containing `pos` whose height
    /// is within `step_height` of `pos.z`.
    pub fn lookup(&self, pos: WorldPoint3) -> Option<Arc<Patch>> {
        let idx = self.mls.to_grid(pos.x, pos.y)?;
        let patch = self.closest_patch(idx, pos.z)?;
        if (patch.height() - pos.z).abs() <= self.config.step_height {
            Some(patch)
        } else {
            None
        }
    }

    /// World position of a patch (cell center, patch height).
    pub fn position(&self, patch: &Patch) -> WorldPoint3 {
        let (x, y) = self.mls.from_grid(patch.index());
        WorldPoint3::new(x, y, patch.height())
    }

    /// Locate or create the patch at `pos`, ready for expansion.
    ///
    /// Returns `None` if `pos` is outside the map or no MLS surface lies
    /// within `step_height` of `pos.z`.
    pub fn generate_start_patch(&self, pos: WorldPoint3) -> Option<Arc<Patch>> {
        let idx = self.mls.to_grid(pos.x, pos.y)?;
        let surface = self.mls.surface_near(idx, pos.z, self.config.step_height)?;
        let id = self.find_or_create(idx, surface);
        Some(self.patch(id))
    }

    fn find_or_create(&self, idx: GridIndex, height: f32) -> PatchId {
        {
            let arena = self.arena.read();
            if let Some(id) = arena.find(idx, height) {
                return id;
            }
        }
        let mut arena = self.arena.write();
        // Another thread may have created it between the locks
        if let Some(id) = arena.find(idx, height) {
            return id;
        }
        arena.insert(idx, height)
    }

    /// Resolve the patch's classification and neighbor links.
    ///
    /// Idempotent; concurrent calls are serialized on the map-wide mutex
    /// with a lock-free fast path. Returns whether the patch is ultimately
    /// Traversable.
    pub fn expand(&self, patch: &Patch) -> bool {
        if let Some(data) = patch.expanded() {
            return data.kind == PatchKind::Traversable;
        }

        let _guard = self.expansion.lock();
        // Recheck: another thread may have expanded while we waited
        if let Some(data) = patch.expanded() {
            return data.kind == PatchKind::Traversable;
        }

        let data = self.classify(patch);
        let traversable = data.kind == PatchKind::Traversable;
        patch.set_expanded(data);
        traversable
    }

    /// Flood expansion from a seed until no unexpanded patch is reachable.
    pub fn expand_from(&self, seed: &Patch) {
        let mut visited: HashSet<PatchId> = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(seed.id());
        queue.push_back(seed.id());

        while let Some(id) = queue.pop_front() {
            let patch = self.patch(id);
            self.expand(&patch);
            for neighbor in patch.neighbors() {
                if visited.insert(neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }
    }

    /// Flood expansion seeded from multiple positions.
    pub fn expand_all(&self, seeds: &[WorldPoint3]) {
        for &pos in seeds {
            match self.generate_start_patch(pos) {
                Some(patch) => self.expand_from(&patch),
                None => {
                    tracing::warn!("expand_all: no patch at ({:.2}, {:.2}, {:.2})", pos.x, pos.y, pos.z)
                }
            }
        }
    }

    /// Classify a patch and resolve its neighbor links. Called with the
    /// expansion mutex held.
    fn classify(&self, patch: &Patch) -> ExpandedData {
        let idx = patch.index();
        let z = patch.height();
        let step = self.config.step_height;
        let res = self.mls.resolution();

        // Sample the 3x3 neighborhood height field around the patch
        let mut points: Vec<(f32, f32, f32)> = Vec::with_capacity(9);
        let mut missing_neighbor = false;
        points.push((0.0, 0.0, 0.0));
        for &(dx, dy) in &NEIGHBOR_OFFSETS {
            let nidx = idx.offset(dx, dy);
            match self.mls.surface_near(nidx, z, step) {
                Some(h) => points.push((dx as f32 * res, dy as f32 * res, h - z)),
                None => missing_neighbor = true,
            }
        }

        // Link each neighbor cell's vertically closest surface
        let mut neighbors = [None; 8];
        for (slot, &(dx, dy)) in NEIGHBOR_OFFSETS.iter().enumerate() {
            let nidx = idx.offset(dx, dy);
            if let Some(h) = self.mls.surface_near(nidx, z, step) {
                neighbors[slot] = Some(self.find_or_create(nidx, h));
            }
        }

        if points.len() < 3 {
            // Not enough support to fit a plane: the patch borders
            // unobserved terrain on almost every side
            return ExpandedData {
                kind: PatchKind::Frontier,
                slope: 0.0,
                allowed_headings: vec![AngleSegment::full_circle()],
                neighbors,
            };
        }

        let (grad_x, grad_y) = fit_plane_gradient(&points);
        let slope = (grad_x * grad_x + grad_y * grad_y).sqrt().atan();
        let slope_dir = grad_y.atan2(grad_x);
        let allowed = allowed_headings(slope, slope_dir, self.config.max_roll, self.config.max_pitch);

        let kind = if slope > self.config.slope_limit || allowed.is_empty() {
            PatchKind::Obstacle
        } else if missing_neighbor {
            PatchKind::Frontier
        } else {
            PatchKind::Traversable
        };

        ExpandedData {
            kind,
            slope,
            allowed_headings: allowed,
            neighbors,
        }
    }

    /// Drop all patches. The next expansion starts from scratch.
    pub fn clear(&self) {
        let mut arena = self.arena.write();
        arena.patches.clear();
        arena.cells.clear();
    }
}

/// Least-squares fit of `dz = a·dx + b·dy + c` over neighborhood samples;
/// returns the gradient (a, b).
fn fit_plane_gradient(points: &[(f32, f32, f32)]) -> (f32, f32) {
    let n = points.len() as f32;
    let (mut sx, mut sy, mut sz) = (0.0f32, 0.0f32, 0.0f32);
    for &(x, y, z) in points {
        sx += x;
        sy += y;
        sz += z;
    }
    let (cx, cy, cz) = (sx / n, sy / n, sz / n);

    let (mut sxx, mut sxy, mut syy, mut sxz, mut syz) = (0.0f32, 0.0, 0.0, 0.0, 0.0);
    for &(x, y, z) in points {
        let (dx, dy, dz) = (x - cx, y - cy, z - cz);
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
        sxz += dx * dz;
        syz += dy * dz;
    }

    let det = sxx * syy - sxy * sxy;
    if det.abs() < 1e-9 {
        return (0.0, 0.0);
    }
    let a = (sxz * syy - syz * sxy) / det;
    let b = (syz * sxx - sxz * sxy) / det;
    (a, b)
}

/// Headings on which roll and pitch both stay within limits, for a patch of
/// the given slope and uphill direction. At most two segments; empty when
/// the slope exceeds both limits.
fn allowed_headings(slope: f32, slope_dir: f32, max_roll: f32, max_pitch: f32) -> Vec<AngleSegment> {
    if slope <= max_roll && slope <= max_pitch {
        return vec![AngleSegment::full_circle()];
    }
    if slope <= max_pitch {
        // Facing up or down the slope keeps pitch within bounds; roll caps
        // how far the heading may rotate away from the fall line
        let half_width = (max_roll / slope).clamp(0.0, 1.0).asin();
        return vec![
            AngleSegment::centered(slope_dir, half_width),
            AngleSegment::centered(slope_dir + std::f32::consts::PI, half_width),
        ];
    }
    if slope <= max_roll {
        // Only standing across the slope keeps pitch within bounds
        let half_width = (max_pitch / slope).clamp(0.0, 1.0).asin();
        return vec![
            AngleSegment::centered(slope_dir + std::f32::consts::FRAC_PI_2, half_width),
            AngleSegment::centered(slope_dir - std::f32::consts::FRAC_PI_2, half_width),
        ];
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TraversabilityConfig;
    use approx::assert_relative_eq;

    fn flat_map(n: usize) -> Arc<MlsMap> {
        let mut mls = MlsMap::new(n, n, 0.1, 0.0, 0.0);
        mls.set_ground(0..n as i32, 0..n as i32, 0.0);
        Arc::new(mls)
    }

    fn graph(mls: Arc<MlsMap>) -> TraversabilityGraph {
        TraversabilityGraph::new(LayerRole::Driveability, mls, TraversabilityConfig::default())
    }

    #[test]
    fn test_flat_interior_patch_is_traversable() {
        let g = graph(flat_map(10));
        let patch = g
            .generate_start_patch(WorldPoint3::new(0.55, 0.55, 0.0))
            .unwrap();
        assert!(g.expand(&patch));
        assert_eq!(patch.kind(), PatchKind::Traversable);
        assert_relative_eq!(patch.slope(), 0.0, epsilon = 1e-5);
        assert_eq!(patch.neighbors().count(), 8);
    }

    #[test]
    fn test_isolated_patch_classifies_frontier() {
        // A single observed surface with no usable neighbors: too little
        // data for a plane fit, but still a classified Frontier (never a
        // terminal Unknown, which would block later exploration)
        let mut mls = MlsMap::new(10, 10, 0.1, 0.0, 0.0);
        mls.add_surface(GridIndex::new(5, 5), 0.0);

        let g = graph(Arc::new(mls));
        let patch = g
            .generate_start_patch(WorldPoint3::new(0.55, 0.55, 0.0))
            .unwrap();
        assert!(!g.expand(&patch));
        assert_eq!(patch.kind(), PatchKind::Frontier);
        assert!(patch.is_expanded());
        assert_eq!(patch.neighbors().count(), 0);
    }

    #[test]
    fn test_map_edge_patch_is_frontier() {
        let g = graph(flat_map(10));
        let patch = g
            .generate_start_patch(WorldPoint3::new(0.05, 0.55, 0.0))
            .unwrap();
        g.expand(&patch);
        assert_eq!(patch.kind(), PatchKind::Frontier);
    }

    #[test]
    fn test_expansion_is_idempotent() {
        let g = graph(flat_map(10));
        let patch = g
            .generate_start_patch(WorldPoint3::new(0.55, 0.55, 0.0))
            .unwrap();
        assert!(g.expand(&patch));
        let kind = patch.kind();
        let links: Vec<_> = patch.neighbors().collect();

        assert!(g.expand(&patch));
        assert_eq!(patch.kind(), kind);
        assert_eq!(patch.neighbors().collect::<Vec<_>>(), links);
    }

    #[test]
    fn test_step_height_gates_neighbor_links() {
        // Left half at z=0, right half at z=0.3
        let mut mls = MlsMap::new(10, 10, 0.1, 0.0, 0.0);
        mls.set_ground(0..5, 0..10, 0.0);
        mls.set_ground(5..10, 0..10, 0.3);

        let mut config = TraversabilityConfig::default();
        config.step_height = 0.5;
        config.slope_limit = 1.5;
        config.max_roll = 1.5;
        config.max_pitch = 1.5;
        let g = TraversabilityGraph::new(LayerRole::Driveability, Arc::new(mls.clone()), config);
        let patch = g
            .generate_start_patch(WorldPoint3::new(0.45, 0.55, 0.0))
            .unwrap();
        g.expand(&patch);
        // Generous step height: the patch links across the step
        assert!(patch.neighbor_toward(GridIndex::new(5, 5)).is_some());

        let mut config = TraversabilityConfig::default();
        config.step_height = 0.1;
        let g = TraversabilityGraph::new(LayerRole::Driveability, Arc::new(mls), config);
        let patch = g
            .generate_start_patch(WorldPoint3::new(0.45, 0.55, 0.0))
            .unwrap();
        g.expand(&patch);
        // Tight step height: no link across the step
        assert!(patch.neighbor_toward(GridIndex::new(5, 5)).is_none());
    }

    #[test]
    fn test_steep_patch_is_obstacle() {
        // 45 degree ramp along +x
        let mut mls = MlsMap::new(10, 10, 0.1, 0.0, 0.0);
        for x in 0..10 {
            for y in 0..10 {
                mls.add_surface(GridIndex::new(x, y), x as f32 * 0.1);
            }
        }
        let mut config = TraversabilityConfig::default();
        config.slope_limit = 0.5; // < 45 degrees
        config.step_height = 0.2;
        let g = TraversabilityGraph::new(LayerRole::Driveability, Arc::new(mls), config);
        let patch = g
            .generate_start_patch(WorldPoint3::new(0.55, 0.55, 0.5))
            .unwrap();
        assert!(!g.expand(&patch));
        assert_eq!(patch.kind(), PatchKind::Obstacle);
    }

    #[test]
    fn test_lookup_separates_stacked_surfaces() {
        let mut mls = MlsMap::new(4, 4, 0.1, 0.0, 0.0);
        mls.set_ground(0..4, 0..4, 0.0);
        mls.set_ground(0..4, 0..4, 1.0); // overhang

        let g = graph(Arc::new(mls));
        let low = g
            .generate_start_patch(WorldPoint3::new(0.15, 0.15, 0.0))
            .unwrap();
        let high = g
            .generate_start_patch(WorldPoint3::new(0.15, 0.15, 1.0))
            .unwrap();
        assert_ne!(low.id(), high.id());

        let found = g.lookup(WorldPoint3::new(0.15, 0.15, 0.95)).unwrap();
        assert_eq!(found.id(), high.id());
        // Too far from either surface
        assert!(g.lookup(WorldPoint3::new(0.15, 0.15, 0.5)).is_none());
    }

    #[test]
    fn test_allowed_headings_on_ramp() {
        use std::f32::consts::FRAC_PI_2;

        // 30 degree slope uphill along +x, roll limited to 10 degrees
        let slope = 30.0_f32.to_radians();
        let max_roll = 10.0_f32.to_radians();
        let max_pitch = 40.0_f32.to_radians();
        let segments = allowed_headings(slope, 0.0, max_roll, max_pitch);
        assert_eq!(segments.len(), 2);

        let allowed = |h: f32| segments.iter().any(|s| s.contains(h));
        assert!(allowed(0.0)); // straight uphill
        assert!(allowed(std::f32::consts::PI)); // straight downhill
        assert!(!allowed(FRAC_PI_2)); // across the slope
        assert!(!allowed(-FRAC_PI_2));
    }

    #[test]
    fn test_allowed_headings_gentle_slope_is_unconstrained() {
        let segments = allowed_headings(0.05, 1.0, 0.35, 0.52);
        assert_eq!(segments.len(), 1);
        assert!(segments[0].contains(2.5));
    }
}
