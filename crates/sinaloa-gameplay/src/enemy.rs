//! Enemy behavior engine.
//!
//! This module provides:
//! - Archetype classifications and their data profiles
//! - One shared state machine (patrol, telegraph, attack, recover, hitstun,
//!   dead) driven entirely by the profile data
//! - Projectile requests for ranged moves
//! - Grapple interruption by a rolling defender
//!
//! Per-archetype behavior lives in [`ArchetypeProfile`] values, not in
//! per-archetype code paths.

use serde::{Deserialize, Serialize};
use sinaloa_common::{EntityId, HitboxId, IdSequence, Vec2};
use tracing::debug;

use crate::boss::BossController;
use crate::hitbox::{knockback_in_range, ActiveHitbox, AttackProfile, FrameRange, Team};
use crate::physics::{Body, Drive};

/// Targets inside an occluded region are only noticed this close.
pub const OCCLUDED_DETECTION_RANGE: f32 = 32.0;

/// Ticks a dead enemy stays in the world before removal.
pub const DEATH_LINGER_TICKS: u32 = 30;

/// Vertical distance within which a ground enemy will start an attack.
const VERTICAL_REACH: f32 = 48.0;

/// Drones steer back to their hover line at this rate (1/s).
const HOVER_GAIN: f32 = 4.0;

// ============================================================================
// Archetypes
// ============================================================================

/// Enemy archetypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    /// Slow bruiser with a long wind-up punch
    Maton,
    /// Knife thrower with a steady rhythm
    Chacal,
    /// Wrestler whose lunging grab can be rolled through
    Luchador,
    /// Flying drone that fires lasers
    SecurityDrone,
    /// Boss
    Jaguar,
}

impl Archetype {
    /// Get display name.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Maton => "Matón",
            Self::Chacal => "Chacal",
            Self::Luchador => "Luchador",
            Self::SecurityDrone => "Security Drone",
            Self::Jaguar => "El Jaguar",
        }
    }

    /// Check if this archetype is a boss.
    #[must_use]
    pub fn is_boss(self) -> bool {
        matches!(self, Self::Jaguar)
    }

    /// Get all archetypes.
    #[must_use]
    pub const fn all() -> [Self; 5] {
        [
            Self::Maton,
            Self::Chacal,
            Self::Luchador,
            Self::SecurityDrone,
            Self::Jaguar,
        ]
    }
}

/// What an archetype can do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Close-range hitbox attacks
    pub melee: bool,
    /// Spawns projectiles
    pub ranged: bool,
    /// Flies along its patrol instead of walking
    pub aerial_patrol: bool,
}

/// Weaknesses that change how combat treats an enemy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vulnerability {
    /// Takes extra damage from attacks started in the air
    AerialAttacks,
    /// Its grapples break against a rolling target
    RollInterrupt,
}

/// A fired projectile's data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectileSpec {
    /// Flight speed
    pub speed: f32,
    /// Box size
    pub size: Vec2,
    /// Damage on contact
    pub damage: i32,
    /// Knockback; x is along the flight direction
    pub knockback: Vec2,
    /// Ticks before it disappears
    pub lifetime_ticks: u32,
    /// Aim at the target instead of straight ahead
    pub aimed: bool,
}

/// One attack pattern: timing and box, plus optional lunge or projectile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyMove {
    /// Timing and hitbox; for ranged moves only the timing is used
    pub attack: AttackProfile,
    /// Forward speed during the active frames (0 = none)
    #[serde(default)]
    pub lunge_speed: f32,
    /// Fired on the first active frame instead of a melee hitbox
    #[serde(default)]
    pub projectile: Option<ProjectileSpec>,
}

/// Data that fully describes one archetype's behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeProfile {
    /// Archetype this profile belongs to
    pub archetype: Archetype,
    /// Starting and maximum health
    pub max_health: i32,
    /// Body size
    pub size: Vec2,
    /// Walk or flight speed
    pub move_speed: f32,
    /// What it can do
    pub capabilities: Capabilities,
    /// Distance at which the target is noticed
    pub detection_range: f32,
    /// Horizontal distance at which an attack starts
    pub attack_range: f32,
    /// Total width of the patrol route around the spawn point
    pub patrol_distance: f32,
    /// Wind-up before each attack
    pub telegraph_ticks: u32,
    /// Pause after each attack
    pub recover_ticks: u32,
    /// Ticks after recovering before the next telegraph may start
    pub attack_cooldown_ticks: u32,
    /// Attack patterns, used round-robin
    pub moves: Vec<EnemyMove>,
    /// Weaknesses
    pub vulnerabilities: Vec<Vulnerability>,
    /// Fraction of incoming knockback applied to the body
    pub knockback_scale: f32,
}

impl ArchetypeProfile {
    /// Built-in profile for an archetype.
    #[must_use]
    pub fn for_archetype(archetype: Archetype) -> Self {
        match archetype {
            Archetype::Maton => Self {
                archetype,
                max_health: 30,
                size: Vec2::new(16.0, 16.0),
                move_speed: 40.0,
                capabilities: Capabilities {
                    melee: true,
                    ..Capabilities::default()
                },
                detection_range: 160.0,
                attack_range: 28.0,
                patrol_distance: 96.0,
                telegraph_ticks: 60,
                recover_ticks: 40,
                attack_cooldown_ticks: 30,
                moves: vec![EnemyMove {
                    attack: AttackProfile::new(2, 8, 4, 15, Vec2::new(30.0, 20.0), Vec2::new(100.0, -30.0)),
                    lunge_speed: 0.0,
                    projectile: None,
                }],
                vulnerabilities: Vec::new(),
                knockback_scale: 0.8,
            },
            Archetype::Chacal => Self {
                archetype,
                max_health: 20,
                size: Vec2::new(16.0, 16.0),
                move_speed: 60.0,
                capabilities: Capabilities {
                    ranged: true,
                    ..Capabilities::default()
                },
                detection_range: 220.0,
                attack_range: 160.0,
                patrol_distance: 96.0,
                telegraph_ticks: 15,
                recover_ticks: 20,
                attack_cooldown_ticks: 85,
                moves: vec![EnemyMove {
                    attack: AttackProfile::new(2, 1, 5, 0, Vec2::new(6.0, 6.0), Vec2::ZERO),
                    lunge_speed: 0.0,
                    projectile: Some(ProjectileSpec {
                        speed: 180.0,
                        size: Vec2::new(6.0, 6.0),
                        damage: 8,
                        knockback: Vec2::new(40.0, -10.0),
                        lifetime_ticks: 60,
                        aimed: false,
                    }),
                }],
                vulnerabilities: Vec::new(),
                knockback_scale: 1.0,
            },
            Archetype::Luchador => Self {
                archetype,
                max_health: 35,
                size: Vec2::new(16.0, 16.0),
                move_speed: 80.0,
                capabilities: Capabilities {
                    melee: true,
                    ..Capabilities::default()
                },
                detection_range: 160.0,
                attack_range: 48.0,
                patrol_distance: 128.0,
                telegraph_ticks: 24,
                recover_ticks: 30,
                attack_cooldown_ticks: 45,
                moves: vec![EnemyMove {
                    attack: AttackProfile::new(6, 10, 12, 20, Vec2::new(24.0, 28.0), Vec2::new(150.0, -50.0))
                        .as_grapple(),
                    lunge_speed: 160.0,
                    projectile: None,
                }],
                vulnerabilities: vec![Vulnerability::RollInterrupt],
                knockback_scale: 0.9,
            },
            Archetype::SecurityDrone => Self {
                archetype,
                max_health: 15,
                size: Vec2::new(16.0, 16.0),
                move_speed: 50.0,
                capabilities: Capabilities {
                    ranged: true,
                    aerial_patrol: true,
                    ..Capabilities::default()
                },
                detection_range: 160.0,
                attack_range: 140.0,
                patrol_distance: 128.0,
                telegraph_ticks: 20,
                recover_ticks: 8,
                attack_cooldown_ticks: 90,
                moves: vec![EnemyMove {
                    attack: AttackProfile::new(3, 1, 8, 0, Vec2::new(4.0, 4.0), Vec2::ZERO),
                    lunge_speed: 0.0,
                    projectile: Some(ProjectileSpec {
                        speed: 220.0,
                        size: Vec2::new(4.0, 4.0),
                        damage: 5,
                        knockback: Vec2::new(30.0, 0.0),
                        lifetime_ticks: 90,
                        aimed: true,
                    }),
                }],
                vulnerabilities: vec![Vulnerability::AerialAttacks],
                knockback_scale: 1.0,
            },
            Archetype::Jaguar => Self {
                archetype,
                max_health: 240,
                size: Vec2::new(32.0, 32.0),
                move_speed: 90.0,
                capabilities: Capabilities {
                    melee: true,
                    ..Capabilities::default()
                },
                detection_range: 400.0,
                attack_range: 64.0,
                patrol_distance: 64.0,
                telegraph_ticks: 40,
                recover_ticks: 30,
                attack_cooldown_ticks: 30,
                moves: BossController::jaguar().current().moves.clone(),
                vulnerabilities: Vec::new(),
                knockback_scale: 0.3,
            },
        }
    }

    /// Whether the profile carries a vulnerability tag.
    #[must_use]
    pub fn has(&self, vulnerability: Vulnerability) -> bool {
        self.vulnerabilities.contains(&vulnerability)
    }

    /// Checks the profile for impossible values.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_health <= 0 {
            return Err(format!("max_health must be positive, got {}", self.max_health));
        }
        if !self.size.is_finite() || self.size.x <= 0.0 || self.size.y <= 0.0 {
            return Err(format!("size must be positive, got {:?}", self.size));
        }
        let ranges = [
            ("move_speed", self.move_speed),
            ("detection_range", self.detection_range),
            ("attack_range", self.attack_range),
            ("patrol_distance", self.patrol_distance),
            ("knockback_scale", self.knockback_scale),
        ];
        for (name, value) in ranges {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{name} must be non-negative and finite, got {value}"));
            }
        }
        if self.moves.is_empty() {
            return Err("at least one move is required".to_string());
        }
        for (index, m) in self.moves.iter().enumerate() {
            m.attack.validate().map_err(|e| format!("move {index}: {e}"))?;
            if m.projectile.is_some() && !self.capabilities.ranged {
                return Err(format!("move {index} fires a projectile but the profile is not ranged"));
            }
            if let Some(p) = m.projectile {
                if !p.speed.is_finite() || p.speed <= 0.0 || p.lifetime_ticks == 0 {
                    return Err(format!("move {index}: projectile needs positive speed and lifetime"));
                }
                if !knockback_in_range(p.knockback) {
                    return Err(format!("move {index}: projectile knockback {:?} out of range", p.knockback));
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// State machine
// ============================================================================

/// State of the shared enemy state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnemyState {
    /// Walking the patrol route or closing in on the target
    Patrol,
    /// Winding up a visible tell
    Telegraph,
    /// Attack in progress
    Attack,
    /// Cooling down after an attack
    Recover,
    /// Knocked back
    Hitstun,
    /// Terminal
    Dead,
}

impl EnemyState {
    /// Short label for snapshots and logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Patrol => "patrol",
            Self::Telegraph => "telegraph",
            Self::Attack => "attack",
            Self::Recover => "recover",
            Self::Hitstun => "hitstun",
            Self::Dead => "dead",
        }
    }
}

/// What the enemy knows about its target this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetInfo {
    /// Target entity
    pub id: EntityId,
    /// Target center
    pub position: Vec2,
    /// Target stands in an occluded region
    pub occluded: bool,
}

/// Request to spawn a projectile, produced by [`EnemyBrain::think`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectileRequest {
    /// Spawn position
    pub origin: Vec2,
    /// Normalised flight direction
    pub direction: Vec2,
    /// Projectile data
    pub spec: ProjectileSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct EnemyAttack {
    chosen: EnemyMove,
    hitbox: HitboxId,
    fired: bool,
}

/// Behavior state of one enemy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyBrain {
    profile: ArchetypeProfile,
    state: EnemyState,
    state_ticks: u32,
    hitstun_ticks: u32,
    cooldown: u32,
    home: Vec2,
    patrol_dir: f32,
    move_cursor: usize,
    attack: Option<EnemyAttack>,
    drive: Drive,
    boss: Option<BossController>,
}

impl EnemyBrain {
    /// Creates a brain patrolling around `home`.
    #[must_use]
    pub fn new(profile: ArchetypeProfile, home: Vec2) -> Self {
        let boss = profile.archetype.is_boss().then(BossController::jaguar);
        Self {
            profile,
            state: EnemyState::Patrol,
            state_ticks: 0,
            hitstun_ticks: 0,
            cooldown: 0,
            home,
            patrol_dir: 1.0,
            move_cursor: 0,
            attack: None,
            drive: Drive::Locked,
            boss,
        }
    }

    /// Replaces the boss controller (custom phase data).
    #[must_use]
    pub fn with_boss(mut self, boss: BossController) -> Self {
        self.boss = Some(boss);
        self
    }

    /// Profile driving this brain.
    #[must_use]
    pub const fn profile(&self) -> &ArchetypeProfile {
        &self.profile
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> EnemyState {
        self.state
    }

    /// Ticks spent in the current state.
    #[must_use]
    pub const fn state_ticks(&self) -> u32 {
        self.state_ticks
    }

    /// Boss phase controller, for bosses.
    #[must_use]
    pub const fn boss(&self) -> Option<&BossController> {
        self.boss.as_ref()
    }

    /// Mutable boss phase controller.
    pub fn boss_mut(&mut self) -> Option<&mut BossController> {
        self.boss.as_mut()
    }

    /// Movement drive chosen on the last think.
    #[must_use]
    pub const fn drive(&self) -> Drive {
        self.drive
    }

    /// True once dead.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.state == EnemyState::Dead
    }

    /// Dead long enough to be removed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_dead() && self.state_ticks >= DEATH_LINGER_TICKS
    }

    fn enter(&mut self, state: EnemyState) {
        if self.state != state {
            debug!("{} {:?} -> {:?}", self.profile.archetype.display_name(), self.state, state);
        }
        self.state = state;
        self.state_ticks = 0;
    }

    fn telegraph_ticks(&self) -> u32 {
        self.boss
            .as_ref()
            .map_or(self.profile.telegraph_ticks, |b| b.current().telegraph_ticks)
    }

    fn pick_move(&mut self) -> EnemyMove {
        if let Some(boss) = self.boss.as_mut() {
            return boss.next_move();
        }
        let chosen = self.profile.moves[self.move_cursor % self.profile.moves.len()].clone();
        self.move_cursor = self.move_cursor.wrapping_add(1);
        chosen
    }

    fn sees(&self, position: Vec2, target: &TargetInfo) -> bool {
        let distance = position.distance(target.position);
        distance <= self.profile.detection_range && (!target.occluded || distance <= OCCLUDED_DETECTION_RANGE)
    }

    fn in_attack_range(&self, position: Vec2, target: &TargetInfo) -> bool {
        let dx = (target.position.x - position.x).abs();
        let dy = (target.position.y - position.y).abs();
        dx <= self.profile.attack_range && (self.profile.capabilities.aerial_patrol || dy <= VERTICAL_REACH)
    }

    /// Advances the state machine by one tick and picks next tick's drive.
    ///
    /// Returns a projectile request when a ranged move reaches its first
    /// active frame.
    pub fn think(
        &mut self,
        body: &mut Body,
        target: Option<&TargetInfo>,
        ids: &mut IdSequence,
    ) -> Option<ProjectileRequest> {
        self.state_ticks = self.state_ticks.saturating_add(1);
        if self.is_dead() {
            self.drive = Drive::Locked;
            return None;
        }
        self.cooldown = self.cooldown.saturating_sub(1);

        let position = body.position;
        let seen = target.filter(|t| self.sees(position, t)).copied();
        let mut request = None;

        match self.state {
            EnemyState::Patrol => {
                if let Some(t) = seen {
                    body.face(t.position.x - body.position.x);
                    if self.cooldown == 0 && self.in_attack_range(position, &t) {
                        self.enter(EnemyState::Telegraph);
                        self.drive = self.hold();
                    } else {
                        self.drive = self.pursue(body, &t);
                    }
                } else {
                    self.drive = self.patrol(body);
                }
            },
            EnemyState::Telegraph => {
                self.drive = self.hold();
                if let Some(t) = seen {
                    body.face(t.position.x - body.position.x);
                }
                if self.state_ticks >= self.telegraph_ticks() {
                    let chosen = self.pick_move();
                    self.attack = Some(EnemyAttack {
                        chosen,
                        hitbox: ids.next_hitbox(),
                        fired: false,
                    });
                    self.enter(EnemyState::Attack);
                }
            },
            EnemyState::Attack => {
                let (total, startup, active, lunge) = match &self.attack {
                    Some(a) => (
                        a.chosen.attack.total_ticks(),
                        a.chosen.attack.startup,
                        a.chosen.attack.active_frames(),
                        a.chosen.lunge_speed,
                    ),
                    None => (0, 0, FrameRange::new(0, 0), 0.0),
                };
                if self.state_ticks >= total {
                    self.attack = None;
                    self.enter(EnemyState::Recover);
                    self.drive = self.hold();
                } else {
                    request = self.fire_if_due(body, seen.as_ref(), startup);
                    self.drive = if lunge > 0.0 && active.contains(self.state_ticks) {
                        self.forward(body, lunge)
                    } else {
                        self.hold()
                    };
                }
            },
            EnemyState::Recover => {
                self.drive = self.hold();
                if self.state_ticks >= self.profile.recover_ticks {
                    self.cooldown = self.profile.attack_cooldown_ticks;
                    self.enter(EnemyState::Patrol);
                }
            },
            EnemyState::Hitstun => {
                self.drive = if self.profile.capabilities.aerial_patrol {
                    Drive::Fly(Vec2::ZERO)
                } else {
                    Drive::Locked
                };
                if self.state_ticks >= self.hitstun_ticks {
                    self.enter(EnemyState::Patrol);
                }
            },
            EnemyState::Dead => {},
        }
        request
    }

    fn fire_if_due(&mut self, body: &Body, target: Option<&TargetInfo>, startup: u32) -> Option<ProjectileRequest> {
        let attack = self.attack.as_mut()?;
        let spec = attack.chosen.projectile?;
        if attack.fired || self.state_ticks < startup {
            return None;
        }
        attack.fired = true;
        let forward = Vec2::new(body.facing, 0.0);
        let direction = match target {
            Some(t) if spec.aimed => (t.position - body.position).try_normalize().unwrap_or(forward),
            _ => forward,
        };
        let origin = body.position + direction * (body.half_extents.x + spec.size.x / 2.0 + 1.0);
        Some(ProjectileRequest {
            origin,
            direction,
            spec,
        })
    }

    fn hold(&self) -> Drive {
        if self.profile.capabilities.aerial_patrol {
            Drive::Fly(Vec2::ZERO)
        } else {
            Drive::Walk {
                axis: 0.0,
                speed: None,
            }
        }
    }

    fn forward(&self, body: &Body, speed: f32) -> Drive {
        if self.profile.capabilities.aerial_patrol {
            Drive::Fly(Vec2::new(body.facing * speed, 0.0))
        } else {
            Drive::Forced(body.facing * speed)
        }
    }

    fn walk(&self, body: &Body, axis: f32) -> Drive {
        if self.profile.capabilities.aerial_patrol {
            let vy = ((self.home.y - body.position.y) * HOVER_GAIN)
                .clamp(-self.profile.move_speed, self.profile.move_speed);
            Drive::Fly(Vec2::new(axis * self.profile.move_speed, vy))
        } else {
            Drive::Walk {
                axis,
                speed: Some(self.profile.move_speed),
            }
        }
    }

    fn patrol(&mut self, body: &Body) -> Drive {
        let half = self.profile.patrol_distance / 2.0;
        if half <= 0.0 {
            return self.hold();
        }
        if body.position.x >= self.home.x + half {
            self.patrol_dir = -1.0;
        } else if body.position.x <= self.home.x - half {
            self.patrol_dir = 1.0;
        }
        self.walk(body, self.patrol_dir)
    }

    fn pursue(&self, body: &Body, target: &TargetInfo) -> Drive {
        let dx = target.position.x - body.position.x;
        let close = dx.abs() <= self.profile.attack_range;
        if close && !self.profile.capabilities.melee {
            // Ranged enemies hold their distance and wait out the cooldown
            return self.walk(body, 0.0);
        }
        if close {
            return self.hold();
        }
        self.walk(body, dx.signum())
    }

    /// Live melee hitbox for this tick, if the current move is in its
    /// active frames.
    #[must_use]
    pub fn active_hitbox(&self, owner: EntityId, body: &Body) -> Option<ActiveHitbox> {
        if self.state != EnemyState::Attack {
            return None;
        }
        let attack = self.attack.as_ref()?;
        if attack.chosen.projectile.is_some() {
            return None;
        }
        let profile = &attack.chosen.attack;
        profile.active_frames().contains(self.state_ticks).then(|| ActiveHitbox {
            id: attack.hitbox,
            owner,
            attacker: owner,
            team: Team::Enemy,
            shape: profile.shape_for(body),
            damage: profile.damage,
            knockback: profile.directed_knockback(body.facing),
            aerial: !body.grounded,
            grapple: profile.grapple,
        })
    }

    /// Hitbox instance still alive (for ledger pruning).
    #[must_use]
    pub fn live_hitbox(&self) -> Option<HitboxId> {
        self.attack.as_ref().map(|a| a.hitbox)
    }

    /// Knocks the enemy into hitstun, cancelling any attack.
    pub fn enter_hitstun(&mut self, ticks: u32) {
        if self.is_dead() {
            return;
        }
        self.attack = None;
        self.hitstun_ticks = ticks.max(1);
        self.enter(EnemyState::Hitstun);
    }

    /// Breaks a grapple: straight to recover.
    pub fn interrupt_grapple(&mut self) {
        if self.state != EnemyState::Attack {
            return;
        }
        self.attack = None;
        self.enter(EnemyState::Recover);
        self.drive = self.hold();
    }

    /// Resets after a boss phase change: no hitstun, no attack in flight.
    pub fn phase_reset(&mut self) {
        if self.is_dead() {
            return;
        }
        self.attack = None;
        self.hitstun_ticks = 0;
        self.cooldown = 0;
        self.enter(EnemyState::Patrol);
    }

    /// Enters the terminal state.
    pub fn kill(&mut self) {
        self.attack = None;
        self.drive = Drive::Locked;
        self.enter(EnemyState::Dead);
    }
}
