//! Thrown knives and laser bolts.
//!
//! Projectiles fly in a straight line without gravity, carry a single hitbox
//! instance for their whole life and disappear on the first hit, on touching
//! solid geometry or when their lifetime runs out.

use serde::{Deserialize, Serialize};
use sinaloa_common::{EntityId, HitboxId, Vec2};

use crate::collision::LevelGeometry;
use crate::enemy::ProjectileSpec;
use crate::hitbox::{ActiveHitbox, Team};
use crate::physics::Body;

/// Flight state of one projectile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    /// Entity credited with hits
    pub shooter: EntityId,
    /// Team of the shooter
    pub team: Team,
    /// Hitbox instance used for every tick of flight
    pub hitbox: HitboxId,
    /// Damage on contact
    pub damage: i32,
    /// Knockback already oriented along the flight direction
    pub knockback: Vec2,
    /// Constant velocity
    pub velocity: Vec2,
    /// Ticks left before expiry
    pub ticks_left: u32,
    /// Hit something; removed at the end of the tick
    pub spent: bool,
}

impl Projectile {
    /// Launches a projectile along `direction`.
    #[must_use]
    pub fn launch(shooter: EntityId, team: Team, hitbox: HitboxId, spec: &ProjectileSpec, direction: Vec2) -> Self {
        let direction = direction.try_normalize().unwrap_or(Vec2::X);
        let along = if direction.x < 0.0 { -1.0 } else { 1.0 };
        Self {
            shooter,
            team,
            hitbox,
            damage: spec.damage,
            knockback: Vec2::new(spec.knockback.x * along, spec.knockback.y),
            velocity: direction * spec.speed,
            ticks_left: spec.lifetime_ticks,
            spent: false,
        }
    }

    /// Moves the projectile one tick. Returns false once it should be removed.
    pub fn advance(&mut self, body: &mut Body, geometry: &LevelGeometry, dt: f32) -> bool {
        if self.spent || self.ticks_left == 0 {
            return false;
        }
        self.ticks_left -= 1;
        body.velocity = self.velocity;
        body.position += self.velocity * dt;
        if geometry.overlaps_solid(&body.aabb()) {
            self.spent = true;
        }
        !self.spent && self.ticks_left > 0
    }

    /// Live hitbox for the current tick.
    #[must_use]
    pub fn active_hitbox(&self, owner: EntityId, body: &Body) -> Option<ActiveHitbox> {
        if self.spent {
            return None;
        }
        Some(ActiveHitbox {
            id: self.hitbox,
            owner,
            attacker: self.shooter,
            team: self.team,
            shape: body.aabb(),
            damage: self.damage,
            knockback: self.knockback,
            aerial: false,
            grapple: false,
        })
    }

    /// Whether the projectile is finished.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.spent || self.ticks_left == 0
    }
}
