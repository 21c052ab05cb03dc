//! Scripted moving hazards.
//!
//! Moving hazards are entities with a fixed trajectory, never changes to
//! level geometry. Two scripts exist:
//! - [`HazardScript::Periodic`]: idles, warns, then sweeps across the level
//!   (the metro train)
//! - [`HazardScript::Waypoints`]: ping-pongs along a path forever
//!
//! Each sweep or leg gets a fresh hitbox instance so a defender can be hit
//! once per pass. [`PathCursor`] is the waypoint walker shared with moving
//! platforms.

use serde::{Deserialize, Serialize};
use sinaloa_common::{EntityId, HitboxId, IdSequence, Vec2};
use tracing::trace;

use crate::hitbox::{knockback_in_range, ActiveHitbox, Team, MAX_KNOCKBACK};
use crate::physics::Body;

/// Trajectory data of a scripted hazard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HazardScript {
    /// Idle for `interval_ticks`, then one sweep from `start` to `end`.
    Periodic {
        /// Sweep start (hazard parks here while idle)
        start: Vec2,
        /// Sweep end
        end: Vec2,
        /// Box size
        size: Vec2,
        /// Sweep speed in px/s
        speed: f32,
        /// Idle ticks between sweeps
        interval_ticks: u32,
        /// Warning lead time before each sweep
        warning_ticks: u32,
        /// Damage on contact
        damage: i32,
        /// Knockback; x is pushed away from the hazard center
        knockback: Vec2,
    },
    /// Endless back-and-forth along `points`.
    Waypoints {
        /// Path, at least two points
        points: Vec<Vec2>,
        /// Box size
        size: Vec2,
        /// Travel speed in px/s
        speed: f32,
        /// Damage on contact
        damage: i32,
        /// Knockback; x is pushed away from the hazard center
        knockback: Vec2,
    },
}

impl HazardScript {
    /// Box size.
    #[must_use]
    pub fn size(&self) -> Vec2 {
        match self {
            Self::Periodic { size, .. } | Self::Waypoints { size, .. } => *size,
        }
    }

    /// Where the hazard starts.
    #[must_use]
    pub fn origin(&self) -> Vec2 {
        match self {
            Self::Periodic { start, .. } => *start,
            Self::Waypoints { points, .. } => points.first().copied().unwrap_or(Vec2::ZERO),
        }
    }

    fn damage(&self) -> (i32, Vec2) {
        match self {
            Self::Periodic { damage, knockback, .. } | Self::Waypoints { damage, knockback, .. } => {
                (*damage, *knockback)
            },
        }
    }

    /// Checks the script for impossible values.
    pub fn validate(&self) -> Result<(), String> {
        let size = self.size();
        if !size.is_finite() || size.x <= 0.0 || size.y <= 0.0 {
            return Err(format!("hazard size must be positive, got {size:?}"));
        }
        let (damage, knockback) = self.damage();
        if damage < 0 || !knockback_in_range(knockback) {
            return Err(format!(
                "hazard damage must be non-negative with knockback at most {MAX_KNOCKBACK}, got {damage} / {knockback:?}"
            ));
        }
        match self {
            Self::Periodic {
                start,
                end,
                speed,
                interval_ticks,
                ..
            } => {
                if !start.is_finite() || !end.is_finite() {
                    return Err("periodic hazard endpoints must be finite".to_string());
                }
                if !speed.is_finite() || *speed <= 0.0 {
                    return Err(format!("periodic hazard speed must be positive, got {speed}"));
                }
                if *interval_ticks == 0 {
                    return Err("periodic hazard interval must be at least 1 tick".to_string());
                }
            },
            Self::Waypoints { points, speed, .. } => {
                if points.len() < 2 {
                    return Err(format!("waypoint hazard needs at least 2 points, got {}", points.len()));
                }
                if points.iter().any(|p| !p.is_finite()) {
                    return Err("waypoints must be finite".to_string());
                }
                if !speed.is_finite() || *speed <= 0.0 {
                    return Err(format!("waypoint hazard speed must be positive, got {speed}"));
                }
            },
        }
        Ok(())
    }
}

/// Progress of a scripted hazard along its trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardMotion {
    script: HazardScript,
    /// Idle ticks since the last sweep (periodic)
    idle_ticks: u32,
    /// Sweeping right now (periodic) / always true (waypoints)
    moving: bool,
    /// Position along the waypoint path
    path: PathCursor,
    hitbox: Option<HitboxId>,
}

/// Ping-pong position along a waypoint path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathCursor {
    /// Index of the waypoint being approached
    target: usize,
    /// Walking the path forward
    forward: bool,
}

impl Default for PathCursor {
    fn default() -> Self {
        Self {
            target: 1,
            forward: true,
        }
    }
}

impl PathCursor {
    /// Index of the waypoint being approached.
    #[must_use]
    pub const fn target(&self) -> usize {
        self.target
    }

    /// Moves `from` up to `distance` toward the current waypoint.
    ///
    /// Returns the new position and whether a waypoint was reached, in
    /// which case the cursor turns toward the next one (reversing at
    /// either end). `points` must hold at least two entries.
    pub fn advance(&mut self, points: &[Vec2], from: Vec2, distance: f32) -> (Vec2, bool) {
        let last = points.len().saturating_sub(1);
        let Some(&goal) = points.get(self.target.min(last)) else {
            return (from, false);
        };
        let (position, arrived) = step_toward(from, goal, distance);
        if arrived && last > 0 {
            if self.forward && self.target >= last {
                self.forward = false;
            } else if !self.forward && self.target == 0 {
                self.forward = true;
            }
            self.target = if self.forward { self.target + 1 } else { self.target - 1 };
        }
        (position, arrived)
    }
}

impl HazardMotion {
    /// Creates the motion state for a script, parked at its origin.
    #[must_use]
    pub fn new(script: HazardScript, ids: &mut IdSequence) -> Self {
        let waypoints = matches!(script, HazardScript::Waypoints { .. });
        Self {
            script,
            idle_ticks: 0,
            moving: waypoints,
            path: PathCursor::default(),
            hitbox: waypoints.then(|| ids.next_hitbox()),
        }
    }

    /// Script driving this hazard.
    #[must_use]
    pub const fn script(&self) -> &HazardScript {
        &self.script
    }

    /// Whether the hazard is moving (and dangerous) right now.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.moving
    }

    /// Hitbox instance of the current pass.
    #[must_use]
    pub const fn live_hitbox(&self) -> Option<HitboxId> {
        self.hitbox
    }

    /// Advances the trajectory by one tick.
    ///
    /// Returns `Some(ticks_until)` on the tick a sweep warning should fire.
    pub fn advance(&mut self, body: &mut Body, ids: &mut IdSequence, dt: f32) -> Option<u32> {
        match &self.script {
            HazardScript::Periodic {
                start,
                end,
                speed,
                interval_ticks,
                warning_ticks,
                ..
            } => {
                let (start, end, speed, interval, warning) = (*start, *end, *speed, *interval_ticks, *warning_ticks);
                if self.moving {
                    let (position, arrived) = step_toward(body.position, end, speed * dt);
                    body.velocity = (position - body.position) / dt.max(f32::EPSILON);
                    body.position = position;
                    if arrived {
                        trace!("Hazard sweep finished");
                        self.moving = false;
                        self.idle_ticks = 0;
                        self.hitbox = None;
                        body.position = start;
                        body.velocity = Vec2::ZERO;
                    }
                    return None;
                }

                self.idle_ticks = self.idle_ticks.saturating_add(1);
                if self.idle_ticks >= interval {
                    self.moving = true;
                    self.hitbox = Some(ids.next_hitbox());
                    body.position = start;
                    return None;
                }
                let warn_at = interval.saturating_sub(warning).max(1);
                (warning > 0 && self.idle_ticks == warn_at).then(|| interval - self.idle_ticks)
            },
            HazardScript::Waypoints { points, speed, .. } => {
                let (position, arrived) = self.path.advance(points, body.position, speed * dt);
                body.velocity = (position - body.position) / dt.max(f32::EPSILON);
                body.position = position;
                if arrived {
                    self.hitbox = Some(ids.next_hitbox());
                }
                None
            },
        }
    }

    /// Live hitbox for this tick.
    #[must_use]
    pub fn active_hitbox(&self, owner: EntityId, body: &Body) -> Option<ActiveHitbox> {
        let id = self.hitbox?;
        if !self.moving {
            return None;
        }
        let (damage, knockback) = self.script.damage();
        Some(ActiveHitbox {
            id,
            owner,
            attacker: owner,
            team: Team::Environment,
            shape: body.aabb(),
            damage,
            knockback,
            aerial: false,
            grapple: false,
        })
    }
}

/// Moves `from` toward `to` by at most `distance`; reports arrival.
pub(crate) fn step_toward(from: Vec2, to: Vec2, distance: f32) -> (Vec2, bool) {
    let offset = to - from;
    let length = offset.length();
    if length <= distance || length <= f32::EPSILON {
        (to, true)
    } else {
        (from + offset / length * distance, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn metro() -> HazardScript {
        HazardScript::Periodic {
            start: Vec2::new(0.0, 100.0),
            end: Vec2::new(60.0, 100.0),
            size: Vec2::new(40.0, 20.0),
            speed: 600.0,
            interval_ticks: 30,
            warning_ticks: 10,
            damage: 25,
            knockback: Vec2::new(200.0, -100.0),
        }
    }

    #[test]
    fn test_periodic_warns_then_sweeps() {
        let mut ids = IdSequence::new();
        let script = metro();
        let mut body = Body::new(script.origin(), script.size());
        let mut motion = HazardMotion::new(script, &mut ids);
        let owner = EntityId::from_raw(1);

        assert!(!motion.is_active());
        assert!(motion.active_hitbox(owner, &body).is_none());

        let mut warnings = Vec::new();
        for tick in 1..=30 {
            if let Some(until) = motion.advance(&mut body, &mut ids, DT) {
                warnings.push((tick, until));
            }
        }
        assert_eq!(warnings, vec![(20, 10)]);
        assert!(motion.is_active());
        assert!(motion.active_hitbox(owner, &body).is_some());

        // 60 px at 10 px per tick
        for _ in 0..6 {
            motion.advance(&mut body, &mut ids, DT);
        }
        assert!(!motion.is_active());
        assert!(motion.active_hitbox(owner, &body).is_none());
        assert!((body.position.x - 0.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_periodic_new_hitbox_per_pass() {
        let mut ids = IdSequence::new();
        let script = metro();
        let mut body = Body::new(script.origin(), script.size());
        let mut motion = HazardMotion::new(script, &mut ids);

        let mut passes = Vec::new();
        for _ in 0..200 {
            motion.advance(&mut body, &mut ids, DT);
            if let Some(id) = motion.live_hitbox() {
                if passes.last() != Some(&id) {
                    passes.push(id);
                }
            }
        }
        assert!(passes.len() >= 2);
        assert_ne!(passes[0], passes[1]);
    }

    #[test]
    fn test_waypoints_ping_pong() {
        let mut ids = IdSequence::new();
        let script = HazardScript::Waypoints {
            points: vec![Vec2::new(0.0, 0.0), Vec2::new(30.0, 0.0)],
            size: Vec2::new(8.0, 8.0),
            speed: 300.0,
            damage: 5,
            knockback: Vec2::new(50.0, 0.0),
        };
        let mut body = Body::new(script.origin(), script.size());
        let mut motion = HazardMotion::new(script, &mut ids);
        let first = motion.live_hitbox();
        assert!(motion.is_active());

        // 5 px per tick: 6 ticks out, 6 ticks back
        for _ in 0..6 {
            motion.advance(&mut body, &mut ids, DT);
        }
        assert!((body.position.x - 30.0).abs() < 1.0e-3);
        assert_ne!(motion.live_hitbox(), first);

        for _ in 0..6 {
            motion.advance(&mut body, &mut ids, DT);
        }
        assert!(body.position.x.abs() < 1.0e-3);
    }

    #[test]
    fn test_validate_rejects_bad_scripts() {
        assert!(metro().validate().is_ok());
        let single = HazardScript::Waypoints {
            points: vec![Vec2::ZERO],
            size: Vec2::new(8.0, 8.0),
            speed: 10.0,
            damage: 1,
            knockback: Vec2::ZERO,
        };
        assert!(single.validate().is_err());

        let HazardScript::Periodic { start, end, size, warning_ticks, damage, knockback, .. } = metro() else {
            unreachable!()
        };
        let stopped = HazardScript::Periodic {
            start,
            end,
            size,
            speed: 0.0,
            interval_ticks: 10,
            warning_ticks,
            damage,
            knockback,
        };
        assert!(stopped.validate().is_err());
    }
}
