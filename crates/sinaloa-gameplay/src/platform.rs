//! Moving and crumbling platforms.
//!
//! Platforms are scripted entities that bodies stand on. Like one-way
//! volumes they only block from above, and they never touch the level
//! geometry:
//! - [`PlatformScript::Moving`] ping-pongs along waypoints and carries
//!   whatever rides it
//! - [`PlatformScript::Crumbling`] gives way a while after something lands
//!   on it, then grows back

use serde::{Deserialize, Serialize};
use sinaloa_common::Vec2;
use tracing::trace;

use crate::collision::Aabb;
use crate::hazard::PathCursor;
use crate::physics::Body;

/// Bodies whose feet sank at most this far into a platform top get lifted
/// back onto it.
pub const PLATFORM_SNAP: f32 = 2.0;

fn default_crumble_ticks() -> u32 {
    60
}

fn default_gone_ticks() -> u32 {
    180
}

fn default_regrow_ticks() -> u32 {
    30
}

/// Behavior data of a platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformScript {
    /// Endless back-and-forth along `points`, starting at the first one.
    Moving {
        /// Path, at least two points
        points: Vec<Vec2>,
        /// Box size
        size: Vec2,
        /// Travel speed in px/s
        speed: f32,
    },
    /// Stays put until stood on, then crumbles and later regrows.
    Crumbling {
        /// Center
        position: Vec2,
        /// Box size
        size: Vec2,
        /// Ticks between the first landing and collapse
        #[serde(default = "default_crumble_ticks")]
        crumble_ticks: u32,
        /// Ticks spent gone
        #[serde(default = "default_gone_ticks")]
        gone_ticks: u32,
        /// Ticks of regrowth before it can be stood on again
        #[serde(default = "default_regrow_ticks")]
        regrow_ticks: u32,
    },
}

impl PlatformScript {
    /// Box size.
    #[must_use]
    pub fn size(&self) -> Vec2 {
        match self {
            Self::Moving { size, .. } | Self::Crumbling { size, .. } => *size,
        }
    }

    /// Where the platform starts.
    #[must_use]
    pub fn origin(&self) -> Vec2 {
        match self {
            Self::Moving { points, .. } => points.first().copied().unwrap_or(Vec2::ZERO),
            Self::Crumbling { position, .. } => *position,
        }
    }

    /// Checks the script for impossible values.
    pub fn validate(&self) -> Result<(), String> {
        let size = self.size();
        if !size.is_finite() || size.x <= 0.0 || size.y <= 0.0 {
            return Err(format!("platform size must be positive, got {size:?}"));
        }
        match self {
            Self::Moving { points, speed, .. } => {
                if points.len() < 2 {
                    return Err(format!("moving platform needs at least 2 points, got {}", points.len()));
                }
                if points.iter().any(|p| !p.is_finite()) {
                    return Err("platform waypoints must be finite".to_string());
                }
                if !speed.is_finite() || *speed <= 0.0 {
                    return Err(format!("platform speed must be positive, got {speed}"));
                }
            },
            Self::Crumbling {
                position,
                crumble_ticks,
                gone_ticks,
                ..
            } => {
                if !position.is_finite() {
                    return Err("crumbling platform position must be finite".to_string());
                }
                if *crumble_ticks == 0 || *gone_ticks == 0 {
                    return Err("crumble_ticks and gone_ticks must be at least 1".to_string());
                }
            },
        }
        Ok(())
    }
}

/// Life cycle of a crumbling platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrumbleState {
    /// Waiting for someone to land
    Intact,
    /// Stood on; collapses when the timer runs out
    Shaking {
        /// Ticks until collapse
        ticks_left: u32,
    },
    /// Not there at all
    Gone {
        /// Ticks until regrowth starts
        ticks_left: u32,
    },
    /// Visible again but not yet solid
    Regrowing {
        /// Ticks until solid
        ticks_left: u32,
    },
}

/// Runtime state of a platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformMotion {
    script: PlatformScript,
    path: PathCursor,
    crumble: CrumbleState,
}

impl PlatformMotion {
    /// Creates the platform state at its origin.
    #[must_use]
    pub fn new(script: PlatformScript) -> Self {
        Self {
            script,
            path: PathCursor::default(),
            crumble: CrumbleState::Intact,
        }
    }

    /// Script driving this platform.
    #[must_use]
    pub const fn script(&self) -> &PlatformScript {
        &self.script
    }

    /// Crumble life cycle; always `Intact` for moving platforms.
    #[must_use]
    pub const fn crumble_state(&self) -> CrumbleState {
        self.crumble
    }

    /// Whether bodies can stand on it right now.
    #[must_use]
    pub const fn is_solid(&self) -> bool {
        matches!(self.crumble, CrumbleState::Intact | CrumbleState::Shaking { .. })
    }

    /// Snapshot label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match (&self.script, self.crumble) {
            (PlatformScript::Moving { .. }, _) => "moving",
            (_, CrumbleState::Intact) => "intact",
            (_, CrumbleState::Shaking { .. }) => "shaking",
            (_, CrumbleState::Gone { .. }) => "gone",
            (_, CrumbleState::Regrowing { .. }) => "regrowing",
        }
    }

    /// Advances one tick. `ridden` tells whether anything stood on the
    /// platform at the start of the tick.
    pub fn advance(&mut self, body: &mut Body, ridden: bool, dt: f32) {
        match &self.script {
            PlatformScript::Moving { points, speed, .. } => {
                let (position, _) = self.path.advance(points, body.position, speed * dt);
                body.velocity = (position - body.position) / dt.max(f32::EPSILON);
                body.position = position;
            },
            PlatformScript::Crumbling {
                crumble_ticks,
                gone_ticks,
                regrow_ticks,
                ..
            } => {
                let (crumble, gone, regrow) = (*crumble_ticks, *gone_ticks, *regrow_ticks);
                self.crumble = match self.crumble {
                    CrumbleState::Intact if ridden => {
                        trace!("Platform starts crumbling");
                        CrumbleState::Shaking { ticks_left: crumble }
                    },
                    CrumbleState::Intact => CrumbleState::Intact,
                    CrumbleState::Shaking { ticks_left } if ticks_left <= 1 => {
                        trace!("Platform collapsed");
                        CrumbleState::Gone { ticks_left: gone }
                    },
                    CrumbleState::Shaking { ticks_left } => CrumbleState::Shaking {
                        ticks_left: ticks_left - 1,
                    },
                    CrumbleState::Gone { ticks_left } if ticks_left <= 1 => {
                        if regrow == 0 {
                            CrumbleState::Intact
                        } else {
                            CrumbleState::Regrowing { ticks_left: regrow }
                        }
                    },
                    CrumbleState::Gone { ticks_left } => CrumbleState::Gone {
                        ticks_left: ticks_left - 1,
                    },
                    CrumbleState::Regrowing { ticks_left } if ticks_left <= 1 => CrumbleState::Intact,
                    CrumbleState::Regrowing { ticks_left } => CrumbleState::Regrowing {
                        ticks_left: ticks_left - 1,
                    },
                };
            },
        }
    }
}

/// Vertical correction that lands a falling body on the highest platform
/// top it crosses this step.
///
/// `before` is the body box before moving and `delta` the movement already
/// resolved against static geometry. Returns the replacement vertical
/// delta, or `None` when no platform catches the body.
#[must_use]
pub fn land_on_platforms(before: &Aabb, delta: Vec2, platforms: &[Aabb]) -> Option<f32> {
    if delta.y <= 0.0 {
        return None;
    }
    let moved = before.translated(Vec2::new(delta.x, 0.0));
    platforms
        .iter()
        .filter(|top| moved.min_x < top.max_x && moved.max_x > top.min_x)
        .filter(|top| before.max_y <= top.min_y + PLATFORM_SNAP && before.max_y + delta.y >= top.min_y)
        .map(|top| top.min_y - before.max_y)
        .reduce(f32::min)
        .filter(|&dy| dy <= delta.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn elevator() -> PlatformScript {
        PlatformScript::Moving {
            points: vec![Vec2::new(0.0, 100.0), Vec2::new(0.0, 40.0)],
            size: Vec2::new(48.0, 8.0),
            speed: 50.0,
        }
    }

    fn ledge() -> PlatformScript {
        PlatformScript::Crumbling {
            position: Vec2::new(0.0, 100.0),
            size: Vec2::new(32.0, 8.0),
            crumble_ticks: 3,
            gone_ticks: 4,
            regrow_ticks: 2,
        }
    }

    fn body_for(script: &PlatformScript) -> Body {
        Body::new(script.origin(), script.size())
    }

    #[test]
    fn test_moving_platform_ping_pongs() {
        let script = elevator();
        let mut body = body_for(&script);
        let mut motion = PlatformMotion::new(script);

        // 60 px at 50 px/s takes 72 ticks, then 8 ticks back down
        for _ in 0..80 {
            motion.advance(&mut body, false, DT);
        }
        assert!(body.position.y > 45.0 && body.position.y < 48.0, "got {}", body.position.y);
        assert!(body.velocity.y > 0.0);

        // Back at the start by tick 144, then 16 ticks up again
        for _ in 0..80 {
            motion.advance(&mut body, false, DT);
        }
        assert!(body.position.y > 85.0 && body.position.y < 89.0, "got {}", body.position.y);
        assert!(body.velocity.y < 0.0);
        assert!(motion.is_solid());
        assert_eq!(motion.label(), "moving");
    }

    #[test]
    fn test_crumbling_life_cycle() {
        let script = ledge();
        let mut body = body_for(&script);
        let mut motion = PlatformMotion::new(script);

        motion.advance(&mut body, false, DT);
        assert_eq!(motion.crumble_state(), CrumbleState::Intact);

        motion.advance(&mut body, true, DT);
        assert_eq!(motion.crumble_state(), CrumbleState::Shaking { ticks_left: 3 });
        assert!(motion.is_solid());

        let mut labels = Vec::new();
        for _ in 0..9 {
            // Riding no longer matters once triggered
            motion.advance(&mut body, true, DT);
            labels.push(motion.label());
        }
        assert_eq!(
            labels,
            vec!["shaking", "shaking", "gone", "gone", "gone", "gone", "regrowing", "regrowing", "intact"]
        );
        assert!(motion.is_solid());
        assert_eq!(body.position, Vec2::new(0.0, 100.0));
    }

    #[test]
    fn test_gone_platform_is_not_solid() {
        let script = ledge();
        let mut body = body_for(&script);
        let mut motion = PlatformMotion::new(script);
        motion.advance(&mut body, true, DT);
        for _ in 0..3 {
            motion.advance(&mut body, false, DT);
        }
        assert!(matches!(motion.crumble_state(), CrumbleState::Gone { .. }));
        assert!(!motion.is_solid());
    }

    #[test]
    fn test_falling_body_lands_on_top() {
        let top = Aabb::new(0.0, 100.0, 48.0, 108.0);
        let feet = Aabb::new(10.0, 80.0, 26.0, 98.0);

        assert_eq!(land_on_platforms(&feet, Vec2::new(0.0, 5.0), &[top]), Some(2.0));
        // Not far enough to reach it
        assert_eq!(land_on_platforms(&feet, Vec2::new(0.0, 1.0), &[top]), None);
        // Rising bodies pass through
        assert_eq!(land_on_platforms(&feet, Vec2::new(0.0, -5.0), &[top]), None);
        // Beside it
        let aside = feet.translated(Vec2::new(60.0, 0.0));
        assert_eq!(land_on_platforms(&aside, Vec2::new(0.0, 5.0), &[top]), None);
    }

    #[test]
    fn test_body_below_top_is_not_caught() {
        let top = Aabb::new(0.0, 100.0, 48.0, 108.0);
        let under = Aabb::new(10.0, 90.0, 26.0, 106.0);
        assert_eq!(land_on_platforms(&under, Vec2::new(0.0, 5.0), &[top]), None);

        // Sunk in slightly: lifted back up
        let sunk = Aabb::new(10.0, 83.0, 26.0, 101.0);
        assert_eq!(land_on_platforms(&sunk, Vec2::new(0.0, 5.0), &[top]), Some(-1.0));
    }

    #[test]
    fn test_validate_rejects_bad_scripts() {
        assert!(elevator().validate().is_ok());
        assert!(ledge().validate().is_ok());

        let stuck = PlatformScript::Moving {
            points: vec![Vec2::ZERO],
            size: Vec2::new(10.0, 4.0),
            speed: 30.0,
        };
        assert!(stuck.validate().is_err());

        let instant = PlatformScript::Crumbling {
            position: Vec2::ZERO,
            size: Vec2::new(10.0, 4.0),
            crumble_ticks: 0,
            gone_ticks: 10,
            regrow_ticks: 0,
        };
        assert!(instant.validate().is_err());
    }
}
