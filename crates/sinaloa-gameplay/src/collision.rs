//! Level geometry and collision resolution.
//!
//! Static geometry is a list of axis-aligned volumes (solid blocks, one-way
//! platforms, hazard zones, lava) plus surface regions that carry friction and
//! visibility occlusion. Volumes are bucketed into a uniform grid for the
//! broad phase; the narrow phase is a plain AABB test.
//!
//! Coordinates are in pixels with y growing downward.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use sinaloa_common::{Vec2, VolumeId};

/// Penetration below this is treated as touching, not overlapping.
const CONTACT_EPSILON: f32 = 1.0e-3;

/// Distance below a body probed for ground contact.
const GROUND_PROBE: f32 = 0.5;

/// Longest sub-step of a swept move.
const MAX_SWEEP_STEP: f32 = 4.0;

/// Longest distance one call to `resolve_movement` covers per axis.
pub const MAX_SWEEP_DISTANCE: f32 = 1024.0;

/// Broad-phase grid cell size.
const GRID_CELL: f32 = 64.0;

// ============================================================================
// Aabb
// ============================================================================

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum X coordinate
    pub min_x: f32,
    /// Minimum Y coordinate (top)
    pub min_y: f32,
    /// Maximum X coordinate
    pub max_x: f32,
    /// Maximum Y coordinate (bottom)
    pub max_y: f32,
}

impl Aabb {
    /// Creates a new box from its corners.
    #[must_use]
    pub const fn new(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Creates a box from its top-left corner and size.
    #[must_use]
    pub fn from_min_size(min: Vec2, size: Vec2) -> Self {
        Self::new(min.x, min.y, min.x + size.x, min.y + size.y)
    }

    /// Creates a box from its center and half-extents.
    #[must_use]
    pub fn from_center(center: Vec2, half: Vec2) -> Self {
        Self::new(
            center.x - half.x,
            center.y - half.y,
            center.x + half.x,
            center.y + half.y,
        )
    }

    /// Returns the center of the box.
    #[must_use]
    pub fn center(&self) -> Vec2 {
        Vec2::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Returns the width of the box.
    #[must_use]
    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    /// Returns the height of the box.
    #[must_use]
    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    /// Returns the area (zero for inverted boxes).
    #[must_use]
    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// True if every coordinate is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.min_x.is_finite() && self.min_y.is_finite() && self.max_x.is_finite() && self.max_y.is_finite()
    }

    /// True for zero-area, inverted or non-finite boxes.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        !self.is_finite() || self.width() <= 0.0 || self.height() <= 0.0
    }

    /// Checks if this box overlaps another. Touching edges do not overlap.
    #[must_use]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_y < other.max_y
            && self.max_y > other.min_y
    }

    /// Like [`Aabb::overlaps`] but requires penetration deeper than the
    /// contact epsilon on both axes.
    #[must_use]
    pub fn penetrates(&self, other: &Aabb) -> bool {
        self.min_x + CONTACT_EPSILON < other.max_x
            && self.max_x > other.min_x + CONTACT_EPSILON
            && self.min_y + CONTACT_EPSILON < other.max_y
            && self.max_y > other.min_y + CONTACT_EPSILON
    }

    /// Whether this box stands on top of `other`: bottom within half a
    /// pixel of its top and overlapping it horizontally.
    #[must_use]
    pub fn rests_on(&self, other: &Aabb) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && (self.max_y - other.min_y).abs() <= GROUND_PROBE
    }

    /// Checks whether a point lies inside the box (edges inclusive).
    #[must_use]
    pub fn contains_point(&self, point: Vec2) -> bool {
        point.x >= self.min_x && point.x <= self.max_x && point.y >= self.min_y && point.y <= self.max_y
    }

    /// Returns the box translated by a vector.
    #[must_use]
    pub fn translated(&self, offset: Vec2) -> Self {
        Self {
            min_x: self.min_x + offset.x,
            min_y: self.min_y + offset.y,
            max_x: self.max_x + offset.x,
            max_y: self.max_y + offset.y,
        }
    }

    /// Expands the box by a margin on all sides.
    #[must_use]
    pub fn expanded(&self, margin: f32) -> Self {
        Self {
            min_x: self.min_x - margin,
            min_y: self.min_y - margin,
            max_x: self.max_x + margin,
            max_y: self.max_y + margin,
        }
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }
}

// ============================================================================
// Volumes and regions
// ============================================================================

/// What a static volume does to bodies touching it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeKind {
    /// Blocks on every side
    Solid,
    /// Blocks only from above, while falling
    OneWay,
    /// Never blocks; damages whatever overlaps it
    Hazard {
        /// Damage per contact
        damage: i32,
        /// Knockback applied away from the volume center
        knockback: Vec2,
    },
    /// Never blocks; burns whatever stays inside, again every
    /// `interval_ticks`
    Lava {
        /// Damage per burn
        damage: i32,
        /// Ticks between burns while a body stays inside
        interval_ticks: u32,
    },
}

impl VolumeKind {
    /// Whether the volume damages bodies rather than blocking them.
    #[must_use]
    pub const fn is_damaging(&self) -> bool {
        matches!(self, Self::Hazard { .. } | Self::Lava { .. })
    }
}

/// One static volume of level geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    /// Kind of volume
    pub kind: VolumeKind,
    /// Extent in world space
    pub bounds: Aabb,
}

impl Volume {
    /// Creates a solid block.
    #[must_use]
    pub const fn solid(bounds: Aabb) -> Self {
        Self {
            kind: VolumeKind::Solid,
            bounds,
        }
    }

    /// Creates a one-way platform.
    #[must_use]
    pub const fn one_way(bounds: Aabb) -> Self {
        Self {
            kind: VolumeKind::OneWay,
            bounds,
        }
    }

    /// Creates a hazard zone.
    #[must_use]
    pub const fn hazard(bounds: Aabb, damage: i32, knockback: Vec2) -> Self {
        Self {
            kind: VolumeKind::Hazard { damage, knockback },
            bounds,
        }
    }

    /// Creates a lava pool.
    #[must_use]
    pub const fn lava(bounds: Aabb, damage: i32, interval_ticks: u32) -> Self {
        Self {
            kind: VolumeKind::Lava { damage, interval_ticks },
            bounds,
        }
    }
}

/// Visibility occlusion of a region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Occlusion {
    /// Always visible
    #[default]
    None,
    /// Always occluded (fog, smoke)
    Always,
    /// Occluded for `duration_ticks` at the start of every `interval_ticks`
    /// cycle (confetti bursts)
    Periodic {
        /// Cycle length
        interval_ticks: u32,
        /// Occluded part of the cycle
        duration_ticks: u32,
    },
}

impl Occlusion {
    /// Whether the region is occluded on `tick`.
    #[must_use]
    pub fn active_at(&self, tick: u64) -> bool {
        match *self {
            Self::None => false,
            Self::Always => true,
            Self::Periodic {
                interval_ticks,
                duration_ticks,
            } => interval_ticks > 0 && tick % u64::from(interval_ticks) < u64::from(duration_ticks),
        }
    }
}

/// Surface region with its own friction and visibility.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Extent in world space
    pub bounds: Aabb,
    /// Ground friction coefficient in `[0, 1]`
    pub friction: f32,
    /// Visibility occlusion
    #[serde(default)]
    pub occlusion: Occlusion,
}

// ============================================================================
// Resolution results
// ============================================================================

/// Contacts produced by one resolved move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactFlags {
    /// Standing on a solid or one-way surface
    pub grounded: bool,
    /// Blocked while moving left
    pub wall_left: bool,
    /// Blocked while moving right
    pub wall_right: bool,
    /// Blocked while moving up
    pub ceiling: bool,
}

/// Outcome of [`LevelGeometry::resolve_movement`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Resolution {
    /// Delta actually travelled
    pub delta: Vec2,
    /// Contacts touched along the way
    pub contacts: ContactFlags,
}

// ============================================================================
// Spatial grid
// ============================================================================

#[derive(Debug, Clone, Default)]
struct SpatialGrid {
    cells: AHashMap<(i32, i32), Vec<u32>>,
}

impl SpatialGrid {
    fn build(volumes: &[Volume]) -> Self {
        let mut grid = Self::default();
        for (index, volume) in volumes.iter().enumerate() {
            for cell in cell_range(&volume.bounds) {
                grid.cells.entry(cell).or_default().push(index as u32);
            }
        }
        grid
    }

    /// Candidate volume indices near `shape`, ascending and unique.
    fn candidates(&self, shape: &Aabb) -> Vec<u32> {
        let mut out: Vec<u32> = cell_range(shape)
            .filter_map(|cell| self.cells.get(&cell))
            .flatten()
            .copied()
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }
}

fn cell_range(shape: &Aabb) -> impl Iterator<Item = (i32, i32)> {
    let x0 = (shape.min_x / GRID_CELL).floor() as i32;
    let x1 = (shape.max_x / GRID_CELL).floor() as i32;
    let y0 = (shape.min_y / GRID_CELL).floor() as i32;
    let y1 = (shape.max_y / GRID_CELL).floor() as i32;
    (x0..=x1).flat_map(move |x| (y0..=y1).map(move |y| (x, y)))
}

// ============================================================================
// Level geometry
// ============================================================================

/// Static collision world of one level.
#[derive(Debug, Clone)]
pub struct LevelGeometry {
    bounds: Aabb,
    volumes: Vec<Volume>,
    regions: Vec<Region>,
    default_friction: f32,
    grid: SpatialGrid,
}

impl LevelGeometry {
    /// Builds the geometry and its broad-phase grid.
    ///
    /// Inputs are assumed validated (see `level::LevelDescriptor::validate`).
    #[must_use]
    pub fn new(bounds: Aabb, volumes: Vec<Volume>, regions: Vec<Region>, default_friction: f32) -> Self {
        let grid = SpatialGrid::build(&volumes);
        Self {
            bounds,
            volumes,
            regions,
            default_friction,
            grid,
        }
    }

    /// World bounds.
    #[must_use]
    pub const fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// All volumes, indexed by [`VolumeId`].
    #[must_use]
    pub fn volumes(&self) -> &[Volume] {
        &self.volumes
    }

    /// Looks up one volume.
    #[must_use]
    pub fn volume(&self, id: VolumeId) -> Option<&Volume> {
        self.volumes.get(id.index())
    }

    /// All surface regions.
    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Every volume overlapping `shape`, in ascending id order.
    ///
    /// Zero-area or non-finite shapes overlap nothing.
    #[must_use]
    pub fn query_overlap(&self, shape: &Aabb) -> Vec<(VolumeId, &Volume)> {
        if shape.is_degenerate() {
            return Vec::new();
        }
        self.grid
            .candidates(shape)
            .into_iter()
            .filter_map(|index| {
                let volume = &self.volumes[index as usize];
                volume.bounds.overlaps(shape).then_some((VolumeId::new(index), volume))
            })
            .collect()
    }

    /// Moves `body` by `delta`, stopping at blocking volumes.
    ///
    /// Horizontal motion is resolved first, then vertical, each axis in
    /// short sub-steps. One-way platforms block only downward motion that
    /// starts at or above their top, and not at all while `drop_through`
    /// is set. Hazards and lava never block. Each axis travels at most
    /// [`MAX_SWEEP_DISTANCE`].
    #[must_use]
    pub fn resolve_movement(&self, body: &Aabb, delta: Vec2, drop_through: bool) -> Resolution {
        if body.is_degenerate() || !delta.is_finite() {
            return Resolution::default();
        }
        let delta = delta.clamp(Vec2::splat(-MAX_SWEEP_DISTANCE), Vec2::splat(MAX_SWEEP_DISTANCE));

        let step_limit = (body.width().min(body.height()) / 2.0).clamp(0.5, MAX_SWEEP_STEP);
        let mut contacts = ContactFlags::default();
        let mut current = *body;

        let moved_x = self.sweep_x(&mut current, delta.x, step_limit, &mut contacts);
        let moved_y = self.sweep_y(&mut current, delta.y, step_limit, drop_through, &mut contacts);

        if !contacts.grounded && delta.y >= 0.0 {
            contacts.grounded = self.is_supported(&current, drop_through);
        }

        Resolution {
            delta: Vec2::new(moved_x, moved_y),
            contacts,
        }
    }

    /// True when `body` rests on a solid or (unless dropping) one-way top.
    #[must_use]
    pub fn is_supported(&self, body: &Aabb, drop_through: bool) -> bool {
        let probe = Aabb::new(body.min_x, body.max_y, body.max_x, body.max_y + GROUND_PROBE);
        self.query_overlap(&probe).into_iter().any(|(_, v)| match v.kind {
            VolumeKind::Solid => true,
            VolumeKind::OneWay => !drop_through && body.max_y <= v.bounds.min_y + CONTACT_EPSILON,
            VolumeKind::Hazard { .. } | VolumeKind::Lava { .. } => false,
        })
    }

    fn sweep_x(&self, current: &mut Aabb, dx: f32, step_limit: f32, contacts: &mut ContactFlags) -> f32 {
        let mut remaining = dx;
        let mut moved = 0.0;
        while remaining.abs() > f32::EPSILON {
            let step = remaining.clamp(-step_limit, step_limit);
            let candidate = current.translated(Vec2::new(step, 0.0));
            let mut allowed = step;
            for (_, volume) in self.query_overlap(&candidate) {
                if volume.kind != VolumeKind::Solid || !candidate.penetrates(&volume.bounds) {
                    continue;
                }
                if step > 0.0 {
                    allowed = allowed.min((volume.bounds.min_x - current.max_x).max(0.0));
                    contacts.wall_right = true;
                } else {
                    allowed = allowed.max((volume.bounds.max_x - current.min_x).min(0.0));
                    contacts.wall_left = true;
                }
            }
            *current = current.translated(Vec2::new(allowed, 0.0));
            moved += allowed;
            if (allowed - step).abs() > f32::EPSILON {
                break;
            }
            remaining -= step;
        }
        moved
    }

    fn sweep_y(
        &self,
        current: &mut Aabb,
        dy: f32,
        step_limit: f32,
        drop_through: bool,
        contacts: &mut ContactFlags,
    ) -> f32 {
        let mut remaining = dy;
        let mut moved = 0.0;
        while remaining.abs() > f32::EPSILON {
            let step = remaining.clamp(-step_limit, step_limit);
            let candidate = current.translated(Vec2::new(0.0, step));
            let mut allowed = step;
            for (_, volume) in self.query_overlap(&candidate) {
                let blocks = match volume.kind {
                    VolumeKind::Solid => candidate.penetrates(&volume.bounds),
                    VolumeKind::OneWay => {
                        step > 0.0
                            && !drop_through
                            && current.max_y <= volume.bounds.min_y + CONTACT_EPSILON
                            && candidate.max_y > volume.bounds.min_y
                    },
                    VolumeKind::Hazard { .. } | VolumeKind::Lava { .. } => false,
                };
                if !blocks {
                    continue;
                }
                if step > 0.0 {
                    allowed = allowed.min((volume.bounds.min_y - current.max_y).max(0.0));
                    contacts.grounded = true;
                } else {
                    allowed = allowed.max((volume.bounds.max_y - current.min_y).min(0.0));
                    contacts.ceiling = true;
                }
            }
            *current = current.translated(Vec2::new(0.0, allowed));
            moved += allowed;
            if (allowed - step).abs() > f32::EPSILON {
                break;
            }
            remaining -= step;
        }
        moved
    }

    /// Friction at a point: the first region containing it, else the
    /// level default.
    #[must_use]
    pub fn friction_at(&self, point: Vec2) -> f32 {
        self.regions
            .iter()
            .find(|r| r.bounds.contains_point(point))
            .map_or(self.default_friction, |r| r.friction)
    }

    /// Whether `point` sits in a region that is occluded on `tick`.
    #[must_use]
    pub fn is_occluded(&self, point: Vec2, tick: u64) -> bool {
        self.regions
            .iter()
            .any(|r| r.bounds.contains_point(point) && r.occlusion.active_at(tick))
    }

    /// Checks whether a body overlaps any solid volume.
    #[must_use]
    pub fn overlaps_solid(&self, body: &Aabb) -> bool {
        self.query_overlap(body)
            .into_iter()
            .any(|(_, v)| v.kind == VolumeKind::Solid && body.penetrates(&v.bounds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn floor_level() -> LevelGeometry {
        LevelGeometry::new(
            Aabb::new(0.0, 0.0, 640.0, 480.0),
            vec![
                // Floor at y = 200
                Volume::solid(Aabb::new(0.0, 200.0, 640.0, 240.0)),
                // Wall at x = 300
                Volume::solid(Aabb::new(300.0, 100.0, 320.0, 200.0)),
                // Thin one-way platform at y = 150
                Volume::one_way(Aabb::new(100.0, 150.0, 180.0, 152.0)),
                // Spikes
                Volume::hazard(Aabb::new(400.0, 190.0, 440.0, 200.0), 2, Vec2::new(0.0, -120.0)),
            ],
            vec![Region {
                bounds: Aabb::new(500.0, 0.0, 640.0, 200.0),
                friction: 0.05,
                occlusion: Occlusion::Periodic {
                    interval_ticks: 480,
                    duration_ticks: 180,
                },
            }],
            0.25,
        )
    }

    fn body_at(x: f32, bottom: f32) -> Aabb {
        Aabb::new(x, bottom - 24.0, x + 16.0, bottom)
    }

    #[test]
    fn test_aabb_overlaps() {
        let a = Aabb::new(0.0, 0.0, 10.0, 10.0);
        let b = Aabb::new(5.0, 5.0, 15.0, 15.0);
        let c = Aabb::new(10.0, 0.0, 20.0, 10.0);

        assert!(a.overlaps(&b));
        // Touching edges are not an overlap
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_zero_area_query_is_empty() {
        let level = floor_level();
        let point = Aabb::new(10.0, 210.0, 10.0, 210.0);
        assert!(level.query_overlap(&point).is_empty());

        let nan = Aabb::new(f32::NAN, 0.0, 10.0, 10.0);
        assert!(level.query_overlap(&nan).is_empty());
    }

    #[test]
    fn test_query_returns_all_kinds_in_order() {
        let level = floor_level();
        let shape = Aabb::new(390.0, 180.0, 450.0, 210.0);
        let ids: Vec<usize> = level
            .query_overlap(&shape)
            .into_iter()
            .map(|(id, _)| id.index())
            .collect();
        assert_eq!(ids, vec![0, 3]);
    }

    #[test]
    fn test_land_on_floor() {
        let level = floor_level();
        let body = body_at(20.0, 190.0);

        let result = level.resolve_movement(&body, Vec2::new(0.0, 30.0), false);

        assert!((result.delta.y - 10.0).abs() < 1.0e-3);
        assert!(result.contacts.grounded);
        assert!(!result.contacts.ceiling);
    }

    #[test]
    fn test_fast_fall_does_not_tunnel_one_way() {
        let level = floor_level();
        let body = body_at(120.0, 140.0);

        // Far larger than the 2px platform thickness
        let result = level.resolve_movement(&body, Vec2::new(0.0, 40.0), false);

        assert!((result.delta.y - 10.0).abs() < 1.0e-3);
        assert!(result.contacts.grounded);
    }

    #[test]
    fn test_one_way_passes_from_below() {
        let level = floor_level();
        let body = body_at(120.0, 170.0);

        let result = level.resolve_movement(&body, Vec2::new(0.0, -40.0), false);

        assert!((result.delta.y + 40.0).abs() < 1.0e-3);
        assert!(!result.contacts.ceiling);
    }

    #[test]
    fn test_one_way_drop_through() {
        let level = floor_level();
        let body = body_at(120.0, 150.0);

        assert!(level.is_supported(&body, false));
        assert!(!level.is_supported(&body, true));

        let result = level.resolve_movement(&body, Vec2::new(0.0, 8.0), true);
        assert!((result.delta.y - 8.0).abs() < 1.0e-3);
    }

    #[test]
    fn test_wall_blocks_horizontal() {
        let level = floor_level();
        let body = body_at(270.0, 200.0);

        let result = level.resolve_movement(&body, Vec2::new(50.0, 0.0), false);

        assert!((result.delta.x - 14.0).abs() < 1.0e-3);
        assert!(result.contacts.wall_right);
        assert!(result.contacts.grounded);
    }

    #[test]
    fn test_walk_along_floor_is_not_a_wall() {
        let level = floor_level();
        let body = body_at(20.0, 200.0);

        let result = level.resolve_movement(&body, Vec2::new(-10.0, 0.0), false);

        assert!((result.delta.x + 10.0).abs() < 1.0e-3);
        assert!(!result.contacts.wall_left);
    }

    #[test]
    fn test_hazard_never_blocks() {
        let level = floor_level();
        let body = body_at(380.0, 200.0);

        let result = level.resolve_movement(&body, Vec2::new(40.0, 0.0), false);
        assert!((result.delta.x - 40.0).abs() < 1.0e-3);
    }

    #[test]
    fn test_non_finite_delta_is_ignored() {
        let level = floor_level();
        let body = body_at(20.0, 190.0);
        let result = level.resolve_movement(&body, Vec2::new(f32::INFINITY, 0.0), false);
        assert_eq!(result, Resolution::default());
    }

    #[test]
    fn test_friction_and_occlusion_regions() {
        let level = floor_level();
        assert!((level.friction_at(Vec2::new(20.0, 190.0)) - 0.25).abs() < f32::EPSILON);
        assert!((level.friction_at(Vec2::new(550.0, 190.0)) - 0.05).abs() < f32::EPSILON);

        assert!(level.is_occluded(Vec2::new(550.0, 100.0), 0));
        assert!(!level.is_occluded(Vec2::new(550.0, 100.0), 200));
        assert!(level.is_occluded(Vec2::new(550.0, 100.0), 480 + 10));
        assert!(!level.is_occluded(Vec2::new(20.0, 100.0), 0));
    }

    #[test]
    fn test_huge_delta_is_capped_per_axis() {
        let level = floor_level();
        let body = body_at(20.0, 190.0);

        let result = level.resolve_movement(&body, Vec2::new(1.0e10, 0.0), false);
        assert!((result.delta.x - 264.0).abs() < 1.0e-3);
        assert!(result.contacts.wall_right);

        let result = level.resolve_movement(&body, Vec2::new(0.0, -1.0e10), false);
        assert!((result.delta.y + MAX_SWEEP_DISTANCE).abs() < 1.0e-3);
    }

    fn bad_extent() -> impl Strategy<Value = f32> {
        prop_oneof![Just(0.0_f32), Just(f32::NAN), Just(f32::INFINITY), -50.0_f32..0.0]
    }

    proptest! {
        #[test]
        fn prop_degenerate_shapes_touch_nothing(
            x in 0.0_f32..600.0,
            y in 0.0_f32..220.0,
            width in bad_extent(),
            height in 1.0_f32..40.0,
            swap in any::<bool>(),
            dx in -50.0_f32..50.0,
            dy in -50.0_f32..50.0,
        ) {
            let level = floor_level();
            let (w, h) = if swap { (height, width) } else { (width, height) };
            let shape = Aabb::new(x, y, x + w, y + h);

            prop_assert!(level.query_overlap(&shape).is_empty());
            prop_assert_eq!(level.resolve_movement(&shape, Vec2::new(dx, dy), false), Resolution::default());
        }

        #[test]
        fn prop_resolved_body_never_inside_solid(
            x in 0.0_f32..620.0,
            bottom in 30.0_f32..200.0,
            dx in -400.0_f32..400.0,
            dy in -400.0_f32..400.0,
            drop_through in any::<bool>(),
        ) {
            let level = floor_level();
            let body = body_at(x, bottom);
            let solid = |b: &Aabb| {
                level
                    .volumes()
                    .iter()
                    .any(|v| v.kind == VolumeKind::Solid && b.penetrates(&v.bounds))
            };
            prop_assume!(!solid(&body));

            let result = level.resolve_movement(&body, Vec2::new(dx, dy), drop_through);
            prop_assert!(!solid(&body.translated(result.delta)), "ended inside a solid after {:?}", result.delta);
        }
    }
}
