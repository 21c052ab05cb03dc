//! Body integration: gravity, variable-height jumps, surface friction.
//!
//! Velocities are in pixels per second and integrated with the tick's
//! `dt`. Per-tick decay factors are expressed against a 60 Hz reference
//! and rescaled by `dt * 60`, so a different fixed step still integrates
//! the same curves.

use serde::{Deserialize, Serialize};
use sinaloa_common::Vec2;

use crate::collision::{Aabb, ContactFlags, LevelGeometry};
use crate::platform::land_on_platforms;

/// Reference tick rate the per-tick factors are tuned against.
pub const REFERENCE_HZ: f32 = 60.0;

/// Ticks a drop-through ignores one-way platforms for.
const DROP_THROUGH_TICKS: u32 = 10;

/// Movement tuning shared by every body driven through [`MovementState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    /// Gravity acceleration (positive = down)
    pub gravity: f32,
    /// Terminal fall speed
    pub max_fall_speed: f32,
    /// Target walking speed
    pub run_speed: f32,
    /// Horizontal acceleration while grounded
    pub ground_accel: f32,
    /// Horizontal acceleration while airborne
    pub air_accel: f32,
    /// Launch speed of the first jump
    pub jump_velocity: f32,
    /// Launch speed of any further jump before landing
    pub double_jump_velocity: f32,
    /// Jumps available between landings
    pub max_jumps: u8,
    /// Ticks the jump button can extend a jump for
    pub jump_hold_ticks: u32,
    /// Extra upward acceleration while the jump is held
    pub jump_hold_accel: f32,
    /// Upward speed an early release is clamped to
    pub jump_cut_speed: f32,
    /// Per-tick horizontal decay while airborne
    pub air_friction: f32,
    /// Speeds below this snap to zero while decaying
    pub stop_speed: f32,
    /// Forced horizontal speed while rolling
    pub roll_speed: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            gravity: 800.0,
            max_fall_speed: 400.0,
            run_speed: 120.0,
            ground_accel: 900.0,
            air_accel: 600.0,
            jump_velocity: 300.0,
            double_jump_velocity: 280.0,
            max_jumps: 2,
            jump_hold_ticks: 12,
            jump_hold_accel: 450.0,
            jump_cut_speed: 90.0,
            air_friction: 0.02,
            stop_speed: 1.0,
            roll_speed: 200.0,
        }
    }
}

impl MovementConfig {
    /// Checks that every value is finite and in range.
    pub fn validate(&self) -> Result<(), String> {
        let positive = [
            ("gravity", self.gravity),
            ("max_fall_speed", self.max_fall_speed),
            ("run_speed", self.run_speed),
            ("ground_accel", self.ground_accel),
            ("air_accel", self.air_accel),
            ("jump_velocity", self.jump_velocity),
            ("double_jump_velocity", self.double_jump_velocity),
            ("roll_speed", self.roll_speed),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(format!("{name} must be positive and finite, got {value}"));
            }
        }
        if !(0.0..=1.0).contains(&self.air_friction) {
            return Err(format!("air_friction must be in [0, 1], got {}", self.air_friction));
        }
        if !self.jump_hold_accel.is_finite() || self.jump_hold_accel < 0.0 {
            return Err("jump_hold_accel must be non-negative".to_string());
        }
        if !self.jump_cut_speed.is_finite() || self.jump_cut_speed < 0.0 {
            return Err("jump_cut_speed must be non-negative".to_string());
        }
        if self.max_jumps == 0 {
            return Err("max_jumps must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Physical state of anything that moves through level geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Body {
    /// Center position
    pub position: Vec2,
    /// Half of the collision box size
    pub half_extents: Vec2,
    /// Velocity in px/s
    pub velocity: Vec2,
    /// Facing: 1.0 right, -1.0 left
    pub facing: f32,
    /// Resting on ground after the last resolve
    pub grounded: bool,
}

impl Body {
    /// Creates a body at rest, facing right.
    #[must_use]
    pub fn new(position: Vec2, size: Vec2) -> Self {
        Self {
            position,
            half_extents: size / 2.0,
            velocity: Vec2::ZERO,
            facing: 1.0,
            grounded: false,
        }
    }

    /// Collision box in world space.
    #[must_use]
    pub fn aabb(&self) -> Aabb {
        Aabb::from_center(self.position, self.half_extents)
    }

    /// Bottom-center point, used for surface lookups.
    #[must_use]
    pub fn feet(&self) -> Vec2 {
        Vec2::new(self.position.x, self.position.y + self.half_extents.y)
    }

    /// Turns toward the sign of `dx` (no change for zero).
    pub fn face(&mut self, dx: f32) {
        if dx > 0.0 {
            self.facing = 1.0;
        } else if dx < 0.0 {
            self.facing = -1.0;
        }
    }
}

/// How horizontal velocity is driven this tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Drive {
    /// Accelerate toward `axis * run_speed`; decay when `axis` is zero
    Walk {
        /// -1, 0 or 1 (enemies may pass a fraction for slower walks)
        axis: f32,
        /// Target speed override (None = config run speed)
        speed: Option<f32>,
    },
    /// No control; knockback and momentum decay with friction
    Locked,
    /// Velocity pinned to this horizontal value (rolls, lunges)
    Forced(f32),
    /// Free flight: both axes pinned, no gravity
    Fly(Vec2),
}

/// Everything the integrator needs to know about intent for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementIntent {
    /// Horizontal drive
    pub drive: Drive,
    /// Jump went down this tick and jumping is allowed
    pub jump_pressed: bool,
    /// Jump is held
    pub jump_held: bool,
    /// Drop through a one-way platform
    pub drop_pressed: bool,
}

impl MovementIntent {
    /// Intent with no input at all.
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            drive: Drive::Walk {
                axis: 0.0,
                speed: None,
            },
            jump_pressed: false,
            jump_held: false,
            drop_pressed: false,
        }
    }

    /// Intent that only applies the given drive.
    #[must_use]
    pub const fn drive(drive: Drive) -> Self {
        Self {
            drive,
            jump_pressed: false,
            jump_held: false,
            drop_pressed: false,
        }
    }
}

/// What happened during one integration step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MoveOutcome {
    /// A jump launched this tick
    pub jumped: bool,
    /// Became grounded this tick after being airborne
    pub landed: bool,
    /// Contacts from collision resolution
    pub contacts: ContactFlags,
}

/// Jump bookkeeping carried between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementState {
    /// Jumps left before the next landing
    pub jumps_remaining: u8,
    /// Ticks the current jump can still be extended
    pub jump_hold_ticks: u32,
    /// Ticks one-way platforms are ignored for
    pub drop_through_ticks: u32,
}

impl MovementState {
    /// Fresh state with a full jump budget.
    #[must_use]
    pub const fn new(config: &MovementConfig) -> Self {
        Self {
            jumps_remaining: config.max_jumps,
            jump_hold_ticks: 0,
            drop_through_ticks: 0,
        }
    }

    /// Integrates `body` for one tick and resolves it against `geometry`.
    pub fn step(
        &mut self,
        body: &mut Body,
        intent: &MovementIntent,
        config: &MovementConfig,
        geometry: &LevelGeometry,
        dt: f32,
    ) -> MoveOutcome {
        self.step_on(body, intent, config, geometry, &[], dt)
    }

    /// Like [`MovementState::step`], also landing on the given platform
    /// boxes. Platforms only block from above.
    pub fn step_on(
        &mut self,
        body: &mut Body,
        intent: &MovementIntent,
        config: &MovementConfig,
        geometry: &LevelGeometry,
        platforms: &[Aabb],
        dt: f32,
    ) -> MoveOutcome {
        let mut outcome = MoveOutcome::default();
        let was_grounded = body.grounded;
        let flying = matches!(intent.drive, Drive::Fly(_));

        if !flying && intent.jump_pressed && self.jumps_remaining > 0 {
            let launch = if self.jumps_remaining == config.max_jumps {
                config.jump_velocity
            } else {
                config.double_jump_velocity
            };
            body.velocity.y = -launch;
            self.jumps_remaining -= 1;
            self.jump_hold_ticks = config.jump_hold_ticks;
            body.grounded = false;
            outcome.jumped = true;
        }

        if !flying && intent.drop_pressed && body.grounded && standing_on_one_way(body, geometry, platforms) {
            self.drop_through_ticks = DROP_THROUGH_TICKS;
            body.grounded = false;
        }

        let scale = dt * REFERENCE_HZ;
        match intent.drive {
            Drive::Walk { axis, speed } if axis != 0.0 => {
                let target = axis * speed.unwrap_or(config.run_speed);
                let accel = if body.grounded {
                    config.ground_accel
                } else {
                    config.air_accel
                };
                body.velocity.x = approach(body.velocity.x, target, accel * dt);
                body.face(axis);
            },
            Drive::Walk { .. } | Drive::Locked => {
                let friction = if body.grounded {
                    geometry.friction_at(body.feet())
                } else {
                    config.air_friction
                };
                body.velocity.x = decay(body.velocity.x, friction, scale, config.stop_speed);
            },
            Drive::Forced(vx) => body.velocity.x = vx,
            Drive::Fly(velocity) => body.velocity = velocity,
        }

        if !flying {
            self.apply_vertical(body, intent, config, dt);
        }

        let before = body.aabb();
        let passing = flying || self.drop_through_ticks > 0;
        let resolution = geometry.resolve_movement(&before, body.velocity * dt, passing);
        let mut delta = resolution.delta;
        let mut contacts = resolution.contacts;
        if !passing {
            if let Some(dy) = land_on_platforms(&before, delta, platforms) {
                delta.y = dy;
                contacts.grounded = true;
            }
        }
        body.position += delta;

        if contacts.wall_left || contacts.wall_right {
            body.velocity.x = 0.0;
        }
        if contacts.ceiling && body.velocity.y < 0.0 {
            body.velocity.y = 0.0;
            self.jump_hold_ticks = 0;
        }
        if contacts.grounded && body.velocity.y >= 0.0 && !flying {
            body.velocity.y = 0.0;
            body.grounded = true;
            if !was_grounded {
                self.jumps_remaining = config.max_jumps;
                outcome.landed = true;
            }
        } else {
            body.grounded = false;
        }

        self.drop_through_ticks = self.drop_through_ticks.saturating_sub(1);
        outcome.contacts = contacts;
        outcome
    }

    fn apply_vertical(&mut self, body: &mut Body, intent: &MovementIntent, config: &MovementConfig, dt: f32) {
        if body.velocity.y < 0.0 && self.jump_hold_ticks > 0 {
            if intent.jump_held {
                body.velocity.y -= config.jump_hold_accel * dt;
                self.jump_hold_ticks -= 1;
            } else {
                // Early release cuts the jump short
                body.velocity.y = body.velocity.y.max(-config.jump_cut_speed);
                self.jump_hold_ticks = 0;
            }
        } else if body.velocity.y >= 0.0 {
            self.jump_hold_ticks = 0;
        }

        body.velocity.y = (body.velocity.y + config.gravity * dt).min(config.max_fall_speed);
    }

    /// Whether a jump may launch right now.
    #[must_use]
    pub const fn can_jump(&self) -> bool {
        self.jumps_remaining > 0
    }
}

fn standing_on_one_way(body: &Body, geometry: &LevelGeometry, platforms: &[Aabb]) -> bool {
    let aabb = body.aabb();
    if platforms.iter().any(|top| aabb.rests_on(top)) {
        return !geometry.is_supported(&aabb, true);
    }
    geometry.is_supported(&aabb, false) && !geometry.is_supported(&aabb, true)
}

/// Moves `current` toward `target` by at most `max_delta`.
#[must_use]
pub fn approach(current: f32, target: f32, max_delta: f32) -> f32 {
    if current < target {
        (current + max_delta).min(target)
    } else {
        (current - max_delta).max(target)
    }
}

/// Multiplicative friction decay scaled to the tick length.
#[must_use]
pub fn decay(velocity: f32, friction: f32, scale: f32, stop_speed: f32) -> f32 {
    let factor = (1.0 - friction.clamp(0.0, 1.0)).powf(scale);
    let next = velocity * factor;
    if next.abs() < stop_speed {
        0.0
    } else {
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{Region, Volume};
    use proptest::prelude::*;

    const DT: f32 = 1.0 / 60.0;

    fn flat_level(friction: f32) -> LevelGeometry {
        LevelGeometry::new(
            Aabb::new(-10_000.0, -10_000.0, 10_000.0, 1_000.0),
            vec![Volume::solid(Aabb::new(-10_000.0, 200.0, 10_000.0, 260.0))],
            Vec::new(),
            friction,
        )
    }

    fn standing_body() -> Body {
        let mut body = Body::new(Vec2::new(0.0, 188.0), Vec2::new(16.0, 24.0));
        body.grounded = true;
        body
    }

    fn jump_intent(pressed: bool, held: bool) -> MovementIntent {
        MovementIntent {
            jump_pressed: pressed,
            jump_held: held,
            ..MovementIntent::idle()
        }
    }

    /// Runs a jump and returns the highest point reached (smallest y).
    fn apex(hold_ticks: u32) -> f32 {
        let level = flat_level(0.25);
        let config = MovementConfig::default();
        let mut state = MovementState::new(&config);
        let mut body = standing_body();
        let mut top = body.position.y;

        for tick in 0..120 {
            let intent = jump_intent(tick == 0, tick < hold_ticks);
            state.step(&mut body, &intent, &config, &level, DT);
            top = top.min(body.position.y);
        }
        top
    }

    #[test]
    fn test_body_rests_on_floor() {
        let level = flat_level(0.25);
        let config = MovementConfig::default();
        let mut state = MovementState::new(&config);
        let mut body = standing_body();

        for _ in 0..10 {
            state.step(&mut body, &MovementIntent::idle(), &config, &level, DT);
        }

        assert!(body.grounded);
        assert!((body.position.y - 188.0).abs() < 1.0e-3);
        assert!(body.velocity.y.abs() < f32::EPSILON);
    }

    #[test]
    fn test_held_jump_goes_higher_than_tap() {
        let tapped = apex(1);
        let held = apex(30);
        // Smaller y = higher
        assert!(held < tapped, "held apex {held} should be above tapped apex {tapped}");
    }

    #[test]
    fn test_early_release_clamps_upward_velocity() {
        let level = flat_level(0.25);
        let config = MovementConfig::default();
        let mut state = MovementState::new(&config);
        let mut body = standing_body();

        state.step(&mut body, &jump_intent(true, true), &config, &level, DT);
        assert!(body.velocity.y < -config.jump_cut_speed);

        state.step(&mut body, &jump_intent(false, false), &config, &level, DT);
        // Clamped to the cut speed, then one tick of gravity
        let expected = -config.jump_cut_speed + config.gravity * DT;
        assert!((body.velocity.y - expected).abs() < 1.0e-3);
        assert_eq!(state.jump_hold_ticks, 0);
    }

    #[test]
    fn test_double_jump_budget_and_refill() {
        let level = flat_level(0.25);
        let config = MovementConfig::default();
        let mut state = MovementState::new(&config);
        let mut body = standing_body();

        let first = state.step(&mut body, &jump_intent(true, true), &config, &level, DT);
        assert!(first.jumped);
        state.step(&mut body, &jump_intent(false, false), &config, &level, DT);
        let second = state.step(&mut body, &jump_intent(true, true), &config, &level, DT);
        assert!(second.jumped);
        state.step(&mut body, &jump_intent(false, false), &config, &level, DT);
        let third = state.step(&mut body, &jump_intent(true, true), &config, &level, DT);
        assert!(!third.jumped, "third jump before landing must be refused");
        assert_eq!(state.jumps_remaining, 0);

        let mut landed = false;
        for _ in 0..240 {
            let outcome = state.step(&mut body, &MovementIntent::idle(), &config, &level, DT);
            landed |= outcome.landed;
        }
        assert!(landed);
        assert_eq!(state.jumps_remaining, config.max_jumps);
    }

    #[test]
    fn test_fall_speed_is_clamped() {
        let level = LevelGeometry::new(Aabb::new(0.0, 0.0, 100.0, 100.0), Vec::new(), Vec::new(), 0.25);
        let config = MovementConfig::default();
        let mut state = MovementState::new(&config);
        let mut body = Body::new(Vec2::new(50.0, 0.0), Vec2::new(16.0, 24.0));

        for _ in 0..300 {
            state.step(&mut body, &MovementIntent::idle(), &config, &level, DT);
        }
        assert!((body.velocity.y - config.max_fall_speed).abs() < 1.0e-3);
    }

    #[test]
    fn test_slippery_surface_slides_further() {
        fn slide(friction: f32) -> f32 {
            let level = flat_level(friction);
            let config = MovementConfig::default();
            let mut state = MovementState::new(&config);
            let mut body = standing_body();
            body.velocity.x = 120.0;
            for _ in 0..600 {
                state.step(&mut body, &MovementIntent::idle(), &config, &level, DT);
                if body.velocity.x == 0.0 {
                    break;
                }
            }
            body.position.x
        }

        let normal = slide(0.25);
        let rain = slide(0.05);
        assert!(rain > normal, "rain slide {rain} should exceed normal slide {normal}");
    }

    #[test]
    fn test_region_friction_applies() {
        let level = LevelGeometry::new(
            Aabb::new(-1_000.0, -1_000.0, 1_000.0, 1_000.0),
            vec![Volume::solid(Aabb::new(-1_000.0, 200.0, 1_000.0, 260.0))],
            vec![Region {
                bounds: Aabb::new(-1_000.0, 150.0, 1_000.0, 250.0),
                friction: 1.0,
                occlusion: crate::collision::Occlusion::None,
            }],
            0.0,
        );
        let config = MovementConfig::default();
        let mut state = MovementState::new(&config);
        let mut body = standing_body();
        body.velocity.x = 100.0;

        state.step(&mut body, &MovementIntent::idle(), &config, &level, DT);
        assert!(body.velocity.x.abs() < f32::EPSILON);
    }

    #[test]
    fn test_drop_through_one_way() {
        let level = LevelGeometry::new(
            Aabb::new(-1_000.0, -1_000.0, 1_000.0, 1_000.0),
            vec![
                Volume::one_way(Aabb::new(-100.0, 100.0, 100.0, 104.0)),
                Volume::solid(Aabb::new(-1_000.0, 200.0, 1_000.0, 260.0)),
            ],
            Vec::new(),
            0.25,
        );
        let config = MovementConfig::default();
        let mut state = MovementState::new(&config);
        let mut body = Body::new(Vec2::new(0.0, 88.0), Vec2::new(16.0, 24.0));
        body.grounded = true;

        let intent = MovementIntent {
            drop_pressed: true,
            ..MovementIntent::idle()
        };
        state.step(&mut body, &intent, &config, &level, DT);
        for _ in 0..120 {
            state.step(&mut body, &MovementIntent::idle(), &config, &level, DT);
        }
        assert!(body.grounded);
        assert!((body.position.y - 188.0).abs() < 1.0e-3, "should land on the floor, got {}", body.position.y);
    }

    #[test]
    fn test_fly_ignores_gravity() {
        let level = flat_level(0.25);
        let config = MovementConfig::default();
        let mut state = MovementState::new(&config);
        let mut body = Body::new(Vec2::new(0.0, 50.0), Vec2::new(16.0, 16.0));

        for _ in 0..30 {
            state.step(&mut body, &MovementIntent::drive(Drive::Fly(Vec2::new(30.0, 0.0))), &config, &level, DT);
        }
        assert!((body.position.y - 50.0).abs() < 1.0e-3);
        assert!(body.position.x > 10.0);
    }

    #[test]
    fn test_lands_on_platform_and_drops_through() {
        let level = flat_level(0.25);
        let config = MovementConfig::default();
        let mut state = MovementState::new(&config);
        let platform = Aabb::new(-40.0, 100.0, 40.0, 108.0);
        let mut body = Body::new(Vec2::new(0.0, 40.0), Vec2::new(16.0, 24.0));

        for _ in 0..60 {
            state.step_on(&mut body, &MovementIntent::idle(), &config, &level, &[platform], DT);
        }
        assert!(body.grounded);
        assert!((body.aabb().max_y - 100.0).abs() < 1.0e-3);

        let intent = MovementIntent {
            drop_pressed: true,
            ..MovementIntent::idle()
        };
        state.step_on(&mut body, &intent, &config, &level, &[platform], DT);
        for _ in 0..120 {
            state.step_on(&mut body, &MovementIntent::idle(), &config, &level, &[platform], DT);
        }
        assert!(body.grounded);
        assert!((body.position.y - 188.0).abs() < 1.0e-3);
    }

    #[test]
    fn test_jumps_up_through_platform() {
        let level = flat_level(0.25);
        let config = MovementConfig::default();
        let mut state = MovementState::new(&config);
        let platform = Aabb::new(-40.0, 160.0, 40.0, 168.0);
        let mut body = standing_body();

        let mut highest = body.position.y;
        for tick in 0..30 {
            state.step_on(&mut body, &jump_intent(tick == 0, true), &config, &level, &[platform], DT);
            highest = highest.min(body.position.y);
        }
        assert!(highest < 160.0, "should pass the platform from below, got {highest}");
    }

    proptest! {
        #[test]
        fn prop_never_more_jumps_than_budget(presses in proptest::collection::vec(any::<bool>(), 1..200)) {
            let level = flat_level(0.25);
            let config = MovementConfig::default();
            let mut state = MovementState::new(&config);
            let mut body = standing_body();
            let mut since_landing = 0u8;

            for pressed in presses {
                let outcome = state.step(&mut body, &jump_intent(pressed, pressed), &config, &level, DT);
                if outcome.landed {
                    since_landing = 0;
                }
                if outcome.jumped {
                    since_landing += 1;
                }
                prop_assert!(since_landing <= config.max_jumps);
            }
        }
    }
}
