//! Hitboxes, hurtboxes and the hit ledger.
//!
//! An attack is described by an [`AttackProfile`]: startup, active and
//! recovery frames plus the box it projects in front of its owner. While
//! the owner's attack state is inside the active frames the simulation
//! materialises an [`ActiveHitbox`] for that tick and tests it against
//! every [`Hurtbox`] with [`check_hit`].
//!
//! The [`HitLedger`] remembers which (hitbox instance, defender) pairs have
//! already connected so a box that stays overlapped for several frames
//! damages only once.

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use sinaloa_common::{EntityId, HitboxId, Vec2, VolumeId};

use crate::collision::Aabb;
use crate::physics::Body;

/// Largest knockback speed any attack or hazard may carry, in px/s.
pub const MAX_KNOCKBACK: f32 = 2000.0;

/// Finite and no faster than [`MAX_KNOCKBACK`].
#[must_use]
pub fn knockback_in_range(knockback: Vec2) -> bool {
    knockback.is_finite() && knockback.length() <= MAX_KNOCKBACK
}

/// Which side an entity fights for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    /// The player character
    Player,
    /// Enemies and the boss
    Enemy,
    /// Level hazards; hurt both sides
    Environment,
}

impl Team {
    /// Whether an attack from `self` may damage a member of `defender`.
    #[must_use]
    pub fn can_hit(self, defender: Team) -> bool {
        match (self, defender) {
            (_, Team::Environment) => false,
            (Team::Environment, _) => true,
            (a, b) => a != b,
        }
    }
}

// ============================================================================
// Frame ranges and attack profiles
// ============================================================================

/// Inclusive range of state-relative ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRange {
    /// First tick (inclusive)
    pub start: u32,
    /// Last tick (inclusive)
    pub end: u32,
}

impl FrameRange {
    /// Creates a frame range.
    #[must_use]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Whether `tick` falls inside the range.
    #[must_use]
    pub const fn contains(&self, tick: u32) -> bool {
        tick >= self.start && tick <= self.end
    }

    /// Number of ticks covered.
    #[must_use]
    pub const fn duration(&self) -> u32 {
        self.end.saturating_sub(self.start) + 1
    }
}

/// Timing and geometry of one attack.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttackProfile {
    /// Ticks before the hitbox appears
    pub startup: u32,
    /// Ticks the hitbox is live
    pub active: u32,
    /// Ticks after the hitbox disappears
    pub recovery: u32,
    /// Damage dealt on contact
    pub damage: i32,
    /// Hitbox size
    pub size: Vec2,
    /// Gap between the owner's front edge and the hitbox (x), and vertical
    /// shift of the hitbox center from the owner center (y)
    pub offset: Vec2,
    /// Knockback; x is along the owner's facing
    pub knockback: Vec2,
    /// Grabs instead of strikes; broken by a rolling defender
    #[serde(default)]
    pub grapple: bool,
}

impl AttackProfile {
    /// Creates a profile with no offset.
    #[must_use]
    pub const fn new(startup: u32, active: u32, recovery: u32, damage: i32, size: Vec2, knockback: Vec2) -> Self {
        Self {
            startup,
            active,
            recovery,
            damage,
            size,
            offset: Vec2::ZERO,
            knockback,
            grapple: false,
        }
    }

    /// Sets the hitbox offset.
    #[must_use]
    pub const fn with_offset(mut self, offset: Vec2) -> Self {
        self.offset = offset;
        self
    }

    /// Marks the attack as a grapple.
    #[must_use]
    pub const fn as_grapple(mut self) -> Self {
        self.grapple = true;
        self
    }

    /// State-relative ticks during which the hitbox is live.
    #[must_use]
    pub const fn active_frames(&self) -> FrameRange {
        FrameRange::new(self.startup, self.startup + self.active.saturating_sub(1))
    }

    /// Total length of the attack.
    #[must_use]
    pub const fn total_ticks(&self) -> u32 {
        self.startup + self.active + self.recovery
    }

    /// Hitbox in world space for an owner body.
    #[must_use]
    pub fn shape_for(&self, body: &Body) -> Aabb {
        let front = body.position.x + body.facing * (body.half_extents.x + self.offset.x);
        let center_x = front + body.facing * self.size.x / 2.0;
        let center = Vec2::new(center_x, body.position.y + self.offset.y);
        Aabb::from_center(center, self.size / 2.0)
    }

    /// Knockback vector for an owner facing `facing`.
    #[must_use]
    pub fn directed_knockback(&self, facing: f32) -> Vec2 {
        Vec2::new(self.knockback.x * facing, self.knockback.y)
    }

    /// Checks that the profile describes a real attack.
    pub fn validate(&self) -> Result<(), String> {
        if self.active == 0 {
            return Err("active frames must be at least 1".to_string());
        }
        if self.damage < 0 {
            return Err(format!("damage must be non-negative, got {}", self.damage));
        }
        if !self.size.is_finite() || self.size.x <= 0.0 || self.size.y <= 0.0 {
            return Err(format!("hitbox size must be positive, got {:?}", self.size));
        }
        if !self.offset.is_finite() {
            return Err("offset must be finite".to_string());
        }
        if !knockback_in_range(self.knockback) {
            return Err(format!(
                "knockback must be finite and at most {MAX_KNOCKBACK}, got {:?}",
                self.knockback
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Live boxes
// ============================================================================

/// Where damage came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageSource {
    /// An entity's attack, projectile or moving hazard
    Entity(EntityId),
    /// A static hazard volume
    Volume(VolumeId),
    /// Falling out of the level
    Fall,
}

/// A hitbox that is live on the current tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveHitbox {
    /// Instance id; one per attack, projectile or hazard pass
    pub id: HitboxId,
    /// Entity that carries the box (for projectiles: the projectile)
    pub owner: EntityId,
    /// Entity credited with the damage (for projectiles: the thrower)
    pub attacker: EntityId,
    /// Team of the owner
    pub team: Team,
    /// World-space box
    pub shape: Aabb,
    /// Damage on contact
    pub damage: i32,
    /// Knockback vector in world space
    pub knockback: Vec2,
    /// Launched while the owner was airborne
    pub aerial: bool,
    /// Grab attack
    pub grapple: bool,
}

/// Damageable area of an entity for the current tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hurtbox {
    /// Entity the box belongs to
    pub entity: EntityId,
    /// Team of the entity
    pub team: Team,
    /// World-space box
    pub shape: Aabb,
    /// False while invincible
    pub vulnerable: bool,
}

/// Remembers which hitbox instances already damaged which defenders.
#[derive(Debug, Clone, Default)]
pub struct HitLedger {
    hits: AHashSet<(HitboxId, EntityId)>,
    /// Hurt-by-volume pairs; `Some(n)` re-arms after `n` more ticks even
    /// without leaving
    volume_contacts: AHashMap<(VolumeId, EntityId), Option<u32>>,
}

impl HitLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this pair has already connected.
    #[must_use]
    pub fn has_hit(&self, hitbox: HitboxId, defender: EntityId) -> bool {
        self.hits.contains(&(hitbox, defender))
    }

    /// Records a connection. Returns false if it was already recorded.
    pub fn record(&mut self, hitbox: HitboxId, defender: EntityId) -> bool {
        self.hits.insert((hitbox, defender))
    }

    /// Drops every entry whose hitbox is not in `live`.
    pub fn retain_live(&mut self, live: &AHashSet<HitboxId>) {
        self.hits.retain(|(hitbox, _)| live.contains(hitbox));
    }

    /// Forgets everything recorded for one hitbox.
    pub fn clear_hitbox(&mut self, hitbox: HitboxId) {
        self.hits.retain(|(h, _)| *h != hitbox);
    }

    /// Whether the defender is still inside a hazard volume it was hurt by.
    #[must_use]
    pub fn in_volume(&self, volume: VolumeId, defender: EntityId) -> bool {
        self.volume_contacts.contains_key(&(volume, defender))
    }

    /// Records that the defender was hurt by a hazard volume.
    ///
    /// With `rearm_after` set the volume may hurt again after that many
    /// ticks; otherwise only once the defender has left it.
    pub fn enter_volume(&mut self, volume: VolumeId, defender: EntityId, rearm_after: Option<u32>) {
        self.volume_contacts.insert((volume, defender), rearm_after.map(|n| n.max(1)));
    }

    /// Counts down timed volume contacts, re-arming the ones that ran out.
    pub fn cool_volume_contacts(&mut self) {
        self.volume_contacts.retain(|_, rearm| match rearm {
            Some(ticks) => {
                *ticks -= 1;
                *ticks > 0
            },
            None => true,
        });
    }

    /// Re-arms volumes for defenders that no longer touch them.
    pub fn retain_volume_contacts(&mut self, mut still_touching: impl FnMut(VolumeId, EntityId) -> bool) {
        self.volume_contacts.retain(|(v, e), _| still_touching(*v, *e));
    }

    /// Number of live hitbox entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// True if nothing is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty() && self.volume_contacts.is_empty()
    }
}

/// Tests a live hitbox against a hurtbox.
///
/// Checks run cheapest first: self-hit, team filter, vulnerability, ledger,
/// and only then the overlap test.
#[must_use]
pub fn check_hit(hitbox: &ActiveHitbox, hurtbox: &Hurtbox, ledger: &HitLedger) -> bool {
    if hitbox.owner == hurtbox.entity {
        return false;
    }
    if !hitbox.team.can_hit(hurtbox.team) {
        return false;
    }
    if !hurtbox.vulnerable {
        return false;
    }
    if ledger.has_hit(hitbox.id, hurtbox.entity) {
        return false;
    }
    hitbox.shape.overlaps(&hurtbox.shape)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light() -> AttackProfile {
        AttackProfile::new(4, 6, 8, 8, Vec2::new(24.0, 16.0), Vec2::new(50.0, -20.0))
    }

    fn hitbox(id: u64) -> ActiveHitbox {
        ActiveHitbox {
            id: HitboxId::from_raw(id),
            owner: EntityId::from_raw(1),
            attacker: EntityId::from_raw(1),
            team: Team::Player,
            shape: Aabb::new(0.0, 0.0, 24.0, 16.0),
            damage: 8,
            knockback: Vec2::new(50.0, -20.0),
            aerial: false,
            grapple: false,
        }
    }

    fn hurtbox(entity: u64, team: Team) -> Hurtbox {
        Hurtbox {
            entity: EntityId::from_raw(entity),
            team,
            shape: Aabb::new(10.0, 0.0, 26.0, 16.0),
            vulnerable: true,
        }
    }

    #[test]
    fn test_frame_range() {
        let range = FrameRange::new(4, 9);
        assert!(!range.contains(3));
        assert!(range.contains(4));
        assert!(range.contains(9));
        assert!(!range.contains(10));
        assert_eq!(range.duration(), 6);
    }

    #[test]
    fn test_profile_timing() {
        let profile = light();
        assert_eq!(profile.active_frames(), FrameRange::new(4, 9));
        assert_eq!(profile.total_ticks(), 18);
        assert!(profile.validate().is_ok());
    }

    #[test]
    fn test_profile_validation() {
        let mut profile = light();
        profile.active = 0;
        assert!(profile.validate().is_err());

        let mut profile = light();
        profile.size = Vec2::new(0.0, 4.0);
        assert!(profile.validate().is_err());

        let mut profile = light();
        profile.knockback = Vec2::new(1.0e10, 0.0);
        assert!(profile.validate().is_err());
        assert!(!knockback_in_range(Vec2::new(f32::NAN, 0.0)));
        assert!(knockback_in_range(Vec2::new(0.0, -MAX_KNOCKBACK)));
    }

    #[test]
    fn test_shape_follows_facing() {
        let profile = light();
        let mut body = Body::new(Vec2::new(100.0, 50.0), Vec2::new(16.0, 24.0));

        let right = profile.shape_for(&body);
        assert!((right.min_x - 108.0).abs() < f32::EPSILON);
        assert!((right.max_x - 132.0).abs() < f32::EPSILON);

        body.facing = -1.0;
        let left = profile.shape_for(&body);
        assert!((left.max_x - 92.0).abs() < f32::EPSILON);
        assert!((left.min_x - 68.0).abs() < f32::EPSILON);

        assert!((profile.directed_knockback(-1.0).x + 50.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_team_filter() {
        assert!(Team::Player.can_hit(Team::Enemy));
        assert!(Team::Enemy.can_hit(Team::Player));
        assert!(!Team::Enemy.can_hit(Team::Enemy));
        assert!(Team::Environment.can_hit(Team::Player));
        assert!(Team::Environment.can_hit(Team::Enemy));
    }

    #[test]
    fn test_check_hit_and_ledger() {
        let mut ledger = HitLedger::new();
        let hb = hitbox(10);
        let target = hurtbox(2, Team::Enemy);

        assert!(check_hit(&hb, &target, &ledger));
        assert!(ledger.record(hb.id, target.entity));
        // Same instance never connects twice
        assert!(!check_hit(&hb, &target, &ledger));
        assert!(!ledger.record(hb.id, target.entity));

        // A new instance may connect again
        assert!(check_hit(&hitbox(11), &target, &ledger));
    }

    #[test]
    fn test_check_hit_rejections() {
        let ledger = HitLedger::new();
        let hb = hitbox(10);

        // Same team
        assert!(!check_hit(&hb, &hurtbox(2, Team::Player), &ledger));

        // Invincible
        let mut target = hurtbox(2, Team::Enemy);
        target.vulnerable = false;
        assert!(!check_hit(&hb, &target, &ledger));

        // Own hurtbox
        assert!(!check_hit(&hb, &hurtbox(1, Team::Enemy), &ledger));

        // No overlap
        let mut target = hurtbox(2, Team::Enemy);
        target.shape = Aabb::new(100.0, 0.0, 116.0, 16.0);
        assert!(!check_hit(&hb, &target, &ledger));
    }

    #[test]
    fn test_ledger_prunes_dead_hitboxes() {
        let mut ledger = HitLedger::new();
        let a = HitboxId::from_raw(1);
        let b = HitboxId::from_raw(2);
        let defender = EntityId::from_raw(7);
        ledger.record(a, defender);
        ledger.record(b, defender);

        let live: AHashSet<HitboxId> = [b].into_iter().collect();
        ledger.retain_live(&live);

        assert!(!ledger.has_hit(a, defender));
        assert!(ledger.has_hit(b, defender));
        assert_eq!(ledger.len(), 1);

        ledger.clear_hitbox(b);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_volume_contacts_rearm() {
        let mut ledger = HitLedger::new();
        let spikes = VolumeId::new(3);
        let player = EntityId::from_raw(1);

        ledger.enter_volume(spikes, player, None);
        assert!(ledger.in_volume(spikes, player));
        ledger.cool_volume_contacts();
        assert!(ledger.in_volume(spikes, player));

        ledger.retain_volume_contacts(|_, _| false);
        assert!(!ledger.in_volume(spikes, player));
    }

    #[test]
    fn test_timed_volume_contacts_rearm_in_place() {
        let mut ledger = HitLedger::new();
        let lava = VolumeId::new(0);
        let player = EntityId::from_raw(1);

        ledger.enter_volume(lava, player, Some(3));
        for _ in 0..2 {
            ledger.cool_volume_contacts();
            assert!(ledger.in_volume(lava, player));
        }
        ledger.cool_volume_contacts();
        assert!(!ledger.in_volume(lava, player));
        assert!(ledger.is_empty());
    }
}
