//! Boss phase controller.
//!
//! A boss runs the regular enemy state machine; this controller only
//! decides which phase it is in and which moves and telegraph length that
//! phase uses. Phases are ordered and only ever advance.

use serde::{Deserialize, Serialize};
use sinaloa_common::Vec2;
use tracing::info;

use crate::enemy::EnemyMove;
use crate::hitbox::AttackProfile;

/// Invincibility granted on entering a new phase.
pub const PHASE_TRANSITION_IFRAMES: u32 = 60;

/// One boss phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BossPhase {
    /// Phase becomes current once health is at or below this value
    pub enter_at_health: i32,
    /// Telegraph length used by every move in this phase
    pub telegraph_ticks: u32,
    /// Moves used round-robin
    pub moves: Vec<EnemyMove>,
}

/// Tracks the active phase of one boss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BossController {
    phases: Vec<BossPhase>,
    phase: u8,
    move_cursor: usize,
}

impl BossController {
    /// Creates a controller starting in phase 0.
    ///
    /// Phases must be ordered by strictly decreasing `enter_at_health` and
    /// each must have at least one move.
    pub fn new(phases: Vec<BossPhase>) -> Result<Self, String> {
        if phases.is_empty() {
            return Err("boss needs at least one phase".to_string());
        }
        if phases.len() > usize::from(u8::MAX) {
            return Err(format!("too many boss phases: {}", phases.len()));
        }
        for (index, pair) in phases.windows(2).enumerate() {
            if pair[1].enter_at_health >= pair[0].enter_at_health {
                return Err(format!(
                    "phase {} threshold {} is not below phase {} threshold {}",
                    index + 1,
                    pair[1].enter_at_health,
                    index,
                    pair[0].enter_at_health
                ));
            }
        }
        if let Some(index) = phases.iter().position(|p| p.moves.is_empty()) {
            return Err(format!("phase {index} has no moves"));
        }
        Ok(Self {
            phases,
            phase: 0,
            move_cursor: 0,
        })
    }

    /// El Jaguar: 240 HP across three phases.
    #[must_use]
    pub fn jaguar() -> Self {
        let pounce = EnemyMove {
            attack: AttackProfile::new(4, 10, 14, 18, Vec2::new(32.0, 28.0), Vec2::new(140.0, -60.0)),
            lunge_speed: 250.0,
            projectile: None,
        };
        let shockwave = EnemyMove {
            attack: AttackProfile::new(6, 8, 18, 14, Vec2::new(80.0, 16.0), Vec2::new(100.0, -80.0))
                .with_offset(Vec2::new(-56.0, 8.0)),
            lunge_speed: 0.0,
            projectile: None,
        };
        let chain_grab = EnemyMove {
            attack: AttackProfile::new(4, 12, 16, 22, Vec2::new(40.0, 28.0), Vec2::new(160.0, -50.0)).as_grapple(),
            lunge_speed: 180.0,
            projectile: None,
        };

        Self {
            phases: vec![
                BossPhase {
                    enter_at_health: i32::MAX,
                    telegraph_ticks: 40,
                    moves: vec![pounce.clone()],
                },
                BossPhase {
                    enter_at_health: 140,
                    telegraph_ticks: 28,
                    moves: vec![pounce, shockwave.clone()],
                },
                BossPhase {
                    enter_at_health: 60,
                    telegraph_ticks: 18,
                    moves: vec![shockwave, chain_grab],
                },
            ],
            phase: 0,
            move_cursor: 0,
        }
    }

    /// Current phase index.
    #[must_use]
    pub const fn phase(&self) -> u8 {
        self.phase
    }

    /// Number of phases.
    #[must_use]
    pub fn phase_count(&self) -> usize {
        self.phases.len()
    }

    /// Data of the current phase.
    #[must_use]
    pub fn current(&self) -> &BossPhase {
        &self.phases[usize::from(self.phase)]
    }

    /// Moves to the deepest phase whose threshold `health` has reached.
    ///
    /// Returns the new phase when it changed. Crossing several thresholds at
    /// once lands directly in the deepest one and reports a single change.
    pub fn check_phase(&mut self, health: i32) -> Option<u8> {
        let deepest = self
            .phases
            .iter()
            .rposition(|p| health <= p.enter_at_health)
            .map_or(0, |i| i as u8);
        if deepest <= self.phase {
            return None;
        }
        info!("Boss phase {} -> {} at {} hp", self.phase, deepest, health);
        self.phase = deepest;
        self.move_cursor = 0;
        Some(deepest)
    }

    /// Next move of the current phase (round-robin).
    pub fn next_move(&mut self) -> EnemyMove {
        let moves = &self.phases[usize::from(self.phase)].moves;
        let chosen = moves[self.move_cursor % moves.len()].clone();
        self.move_cursor = self.move_cursor.wrapping_add(1);
        chosen
    }
}
