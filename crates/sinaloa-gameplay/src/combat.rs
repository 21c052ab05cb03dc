//! Player combat state machine.
//!
//! This module provides:
//! - The combat states (idle, moving, jumping, attacking, parrying,
//!   rolling, hitstun, dead) and their guarded transitions
//! - The three-tier light combo with a trailing chain window
//! - A one-slot input buffer for attack and roll presses
//! - Roll cooldown and the perfect-parry window
//!
//! All timers count whole ticks and only advance in [`CombatController::begin_tick`].

use serde::{Deserialize, Serialize};
use sinaloa_common::{EntityId, HitboxId, IdSequence, Vec2};
use tracing::debug;

use crate::hitbox::{ActiveHitbox, AttackProfile, Team};
use crate::input::{Action, InputSnapshot};
use crate::physics::{Body, Drive, MovementConfig, MovementIntent};

/// Number of light combo tiers.
pub const COMBO_TIERS: u8 = 3;

// ============================================================================
// Tuning
// ============================================================================

/// Combat timing and attack data. Tick counts assume a 60 Hz step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatTuning {
    /// Light combo tiers, in chain order
    pub light_combo: [AttackProfile; COMBO_TIERS as usize],
    /// Heavy attack (never chains)
    pub heavy: AttackProfile,
    /// Length of the chain window, counted back from the end of the
    /// active frames
    pub chain_window_ticks: u32,
    /// How early an attack or roll press may arrive and still be queued
    pub input_buffer_ticks: u32,
    /// Roll duration (invincible throughout)
    pub roll_ticks: u32,
    /// Ticks from roll start until another roll is allowed
    pub roll_cooldown_ticks: u32,
    /// Parry stance duration
    pub parry_ticks: u32,
    /// Leading part of the parry that counts as perfect
    pub perfect_parry_ticks: u32,
    /// Hitstun forced on an attacker whose hit was parried
    pub parry_punish_ticks: u32,
    /// Minimum hitstun
    pub hitstun_base_ticks: u32,
    /// Extra hitstun per unit of knockback magnitude
    pub hitstun_per_knockback: f32,
    /// Hitstun cap
    pub hitstun_max_ticks: u32,
    /// Invincibility after the player takes a hit
    pub player_hurt_iframes: u32,
    /// Damage multiplier for airborne attacks against targets weak to them
    pub aerial_damage_multiplier: f32,
}

impl Default for CombatTuning {
    fn default() -> Self {
        Self {
            light_combo: [
                AttackProfile::new(4, 6, 8, 8, Vec2::new(24.0, 16.0), Vec2::new(50.0, -20.0)),
                AttackProfile::new(3, 8, 6, 10, Vec2::new(28.0, 18.0), Vec2::new(60.0, -15.0)),
                AttackProfile::new(5, 10, 12, 12, Vec2::new(32.0, 20.0), Vec2::new(80.0, -40.0)),
            ],
            heavy: AttackProfile::new(8, 12, 15, 20, Vec2::new(36.0, 24.0), Vec2::new(120.0, -60.0)),
            chain_window_ticks: 4,
            input_buffer_ticks: 6,
            roll_ticks: 18,
            roll_cooldown_ticks: 30,
            parry_ticks: 24,
            perfect_parry_ticks: 9,
            parry_punish_ticks: 48,
            hitstun_base_ticks: 10,
            hitstun_per_knockback: 0.1,
            hitstun_max_ticks: 45,
            player_hurt_iframes: 36,
            aerial_damage_multiplier: 2.0,
        }
    }
}

impl CombatTuning {
    /// Hitstun caused by a hit with the given knockback.
    #[must_use]
    pub fn hitstun_for(&self, knockback: Vec2) -> u32 {
        let extra = (knockback.length() * self.hitstun_per_knockback).clamp(0.0, self.hitstun_max_ticks as f32) as u32;
        self.hitstun_base_ticks
            .saturating_add(extra)
            .clamp(self.hitstun_base_ticks, self.hitstun_max_ticks)
    }

    /// First state tick of an attack's chain window.
    #[must_use]
    pub fn chain_opens_at(&self, profile: &AttackProfile) -> u32 {
        (profile.startup + profile.active).saturating_sub(self.chain_window_ticks)
    }

    /// Checks ranges and attack data.
    pub fn validate(&self) -> Result<(), String> {
        for (tier, profile) in self.light_combo.iter().enumerate() {
            profile.validate().map_err(|e| format!("light_combo[{tier}]: {e}"))?;
        }
        self.heavy.validate().map_err(|e| format!("heavy: {e}"))?;
        if self.roll_ticks == 0 || self.parry_ticks == 0 {
            return Err("roll_ticks and parry_ticks must be at least 1".to_string());
        }
        if self.perfect_parry_ticks > self.parry_ticks {
            return Err(format!(
                "perfect_parry_ticks ({}) exceeds parry_ticks ({})",
                self.perfect_parry_ticks, self.parry_ticks
            ));
        }
        if self.hitstun_max_ticks < self.hitstun_base_ticks {
            return Err("hitstun_max_ticks is below hitstun_base_ticks".to_string());
        }
        if !self.hitstun_per_knockback.is_finite() || self.hitstun_per_knockback < 0.0 {
            return Err("hitstun_per_knockback must be non-negative".to_string());
        }
        if !self.aerial_damage_multiplier.is_finite() || self.aerial_damage_multiplier < 1.0 {
            return Err("aerial_damage_multiplier must be at least 1".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// States
// ============================================================================

/// Combat state of the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatState {
    /// Standing still on the ground
    Idle,
    /// Walking on the ground
    Moving,
    /// Airborne
    Jumping,
    /// Attacking; the value is the combo tier
    Attacking(u8),
    /// Parry stance
    Parrying,
    /// Dodge roll
    Rolling,
    /// Knocked back, no control
    Hitstun,
    /// Terminal
    Dead,
}

impl CombatState {
    /// Idle, Moving or Jumping: the states that accept new actions at once.
    #[must_use]
    pub const fn is_free(&self) -> bool {
        matches!(self, Self::Idle | Self::Moving | Self::Jumping)
    }

    /// Short label for snapshots and logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Moving => "moving",
            Self::Jumping => "jumping",
            Self::Attacking(_) => "attacking",
            Self::Parrying => "parrying",
            Self::Rolling => "rolling",
            Self::Hitstun => "hitstun",
            Self::Dead => "dead",
        }
    }
}

/// Which button started the current attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackKind {
    /// Light combo tier
    Light,
    /// Heavy attack
    Heavy,
}

/// An action that goes through the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatAction {
    /// Start or chain an attack
    Attack(AttackKind),
    /// Dodge roll
    Roll,
    /// Parry (never buffered)
    Parry,
}

/// When an action may start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Right now
    Open,
    /// After this many more ticks
    OpensIn(u32),
    /// Not from the current state
    Closed,
}

/// Queued press waiting for its gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAction {
    /// What was pressed
    pub action: CombatAction,
    /// Ticks left before the press is forgotten
    pub expires_in: u32,
}

/// The attack being performed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurrentAttack {
    /// Light or heavy
    pub kind: AttackKind,
    /// Timing and box
    pub profile: AttackProfile,
    /// Hitbox instance for this swing
    pub hitbox: HitboxId,
    /// Started while airborne
    pub aerial: bool,
}

/// Result of feeding one tick of input to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionResult {
    /// No combat press this tick
    None,
    /// An action started
    Started(CombatAction),
    /// The light combo advanced to this tier
    ComboExtended(u8),
    /// The press was queued
    Buffered,
    /// The press was illegal and outside the buffer
    Dropped,
}

/// How a parry stance treats an incoming hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParryCheck {
    /// Not parrying
    None,
    /// Inside the perfect window
    Perfect,
    /// Parrying but too late; the hit lands
    Late,
}

// ============================================================================
// Controller
// ============================================================================

/// Per-player combat controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatController {
    state: CombatState,
    state_ticks: u32,
    hitstun_ticks: u32,
    roll_cooldown: u32,
    attack: Option<CurrentAttack>,
    pending: Option<PendingAction>,
}

impl Default for CombatController {
    fn default() -> Self {
        Self::new()
    }
}

impl CombatController {
    /// Creates a controller in `Idle`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: CombatState::Idle,
            state_ticks: 0,
            hitstun_ticks: 0,
            roll_cooldown: 0,
            attack: None,
            pending: None,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> CombatState {
        self.state
    }

    /// Ticks spent in the current state.
    #[must_use]
    pub const fn state_ticks(&self) -> u32 {
        self.state_ticks
    }

    /// Queued action, if any.
    #[must_use]
    pub const fn pending(&self) -> Option<PendingAction> {
        self.pending
    }

    /// The attack in progress, if any.
    #[must_use]
    pub const fn attack(&self) -> Option<&CurrentAttack> {
        self.attack.as_ref()
    }

    /// Ticks until the roll is available again.
    #[must_use]
    pub const fn roll_cooldown(&self) -> u32 {
        self.roll_cooldown
    }

    /// True while rolling.
    #[must_use]
    pub fn is_rolling(&self) -> bool {
        self.state == CombatState::Rolling
    }

    /// True once dead.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.state == CombatState::Dead
    }

    fn enter(&mut self, state: CombatState) {
        if self.state != state {
            debug!("Combat state {:?} -> {:?}", self.state, state);
        }
        self.state = state;
        self.state_ticks = 0;
    }

    /// Advances every timer by one tick and ends expired timed states.
    pub fn begin_tick(&mut self, tuning: &CombatTuning) {
        if self.is_dead() {
            return;
        }
        self.state_ticks = self.state_ticks.saturating_add(1);
        self.roll_cooldown = self.roll_cooldown.saturating_sub(1);

        if let Some(pending) = self.pending.as_mut() {
            pending.expires_in = pending.expires_in.saturating_sub(1);
            if pending.expires_in == 0 {
                self.pending = None;
            }
        }

        let expired = match self.state {
            CombatState::Attacking(_) => self
                .attack
                .map_or(true, |a| self.state_ticks >= a.profile.total_ticks()),
            CombatState::Rolling => self.state_ticks >= tuning.roll_ticks,
            CombatState::Parrying => self.state_ticks >= tuning.parry_ticks,
            CombatState::Hitstun => self.state_ticks >= self.hitstun_ticks,
            _ => false,
        };
        if expired {
            self.attack = None;
            self.enter(CombatState::Idle);
        }
    }

    /// Ticks until `action` may start from the current state.
    #[must_use]
    pub fn gate(&self, action: CombatAction, tuning: &CombatTuning) -> Gate {
        let remaining = |total: u32| Gate::OpensIn(total.saturating_sub(self.state_ticks));
        let base = match (self.state, action) {
            (CombatState::Dead, _) => Gate::Closed,
            (s, _) if s.is_free() => Gate::Open,
            (CombatState::Attacking(tier), CombatAction::Attack(AttackKind::Light)) => match self.attack {
                Some(a) if a.kind == AttackKind::Light && tier + 1 < COMBO_TIERS => {
                    remaining(tuning.chain_opens_at(&a.profile))
                },
                _ => Gate::Closed,
            },
            (CombatState::Attacking(_), CombatAction::Roll) => match self.attack {
                Some(a) => remaining(tuning.chain_opens_at(&a.profile)),
                None => Gate::Open,
            },
            (CombatState::Attacking(_), _) => Gate::Closed,
            (_, CombatAction::Parry) => Gate::Closed,
            (CombatState::Rolling, _) => remaining(tuning.roll_ticks),
            (CombatState::Parrying, _) => remaining(tuning.parry_ticks),
            (CombatState::Hitstun, _) => remaining(self.hitstun_ticks),
            _ => Gate::Closed,
        };
        let base = match base {
            Gate::OpensIn(0) => Gate::Open,
            other => other,
        };

        if action != CombatAction::Roll || self.roll_cooldown == 0 {
            return base;
        }
        match base {
            Gate::Closed => Gate::Closed,
            Gate::Open => Gate::OpensIn(self.roll_cooldown),
            Gate::OpensIn(n) => Gate::OpensIn(n.max(self.roll_cooldown)),
        }
    }

    /// Applies this tick's presses (or the queued one) to the state machine.
    pub fn apply_input(
        &mut self,
        input: &InputSnapshot,
        body: &mut Body,
        ids: &mut IdSequence,
        tuning: &CombatTuning,
    ) -> ActionResult {
        if self.is_dead() {
            return ActionResult::None;
        }

        let fresh = requested_action(input).map(|action| self.try_action(action, true, input, body, ids, tuning));
        if let Some(result) = fresh.filter(|&r| r != ActionResult::Dropped) {
            return result;
        }

        // A rejected press still lets the queued action fire this tick
        let queued = match self.pending {
            Some(p) => self.try_action(p.action, false, input, body, ids, tuning),
            None => ActionResult::None,
        };
        match (fresh, queued) {
            (Some(dropped), ActionResult::None) => dropped,
            (_, result) => result,
        }
    }

    fn try_action(
        &mut self,
        action: CombatAction,
        fresh: bool,
        input: &InputSnapshot,
        body: &mut Body,
        ids: &mut IdSequence,
        tuning: &CombatTuning,
    ) -> ActionResult {
        match self.gate(action, tuning) {
            Gate::Open => {
                self.pending = None;
                let axis = input.horizontal_axis();
                self.start(action, axis, body, ids, tuning)
            },
            Gate::OpensIn(n) if fresh && action != CombatAction::Parry && n <= tuning.input_buffer_ticks => {
                self.pending = Some(PendingAction {
                    action,
                    expires_in: tuning.input_buffer_ticks + 1,
                });
                ActionResult::Buffered
            },
            Gate::OpensIn(_) if !fresh => ActionResult::None,
            _ => ActionResult::Dropped,
        }
    }

    fn start(
        &mut self,
        action: CombatAction,
        axis: f32,
        body: &mut Body,
        ids: &mut IdSequence,
        tuning: &CombatTuning,
    ) -> ActionResult {
        match action {
            CombatAction::Roll => {
                body.face(axis);
                self.attack = None;
                self.roll_cooldown = tuning.roll_cooldown_ticks;
                self.enter(CombatState::Rolling);
                ActionResult::Started(action)
            },
            CombatAction::Parry => {
                self.attack = None;
                self.enter(CombatState::Parrying);
                ActionResult::Started(action)
            },
            CombatAction::Attack(kind) => {
                let (tier, profile) = match (kind, self.state) {
                    (AttackKind::Light, CombatState::Attacking(tier)) => {
                        (tier + 1, tuning.light_combo[usize::from(tier + 1)])
                    },
                    (AttackKind::Light, _) => (0, tuning.light_combo[0]),
                    (AttackKind::Heavy, _) => (0, tuning.heavy),
                };
                if self.state.is_free() {
                    body.face(axis);
                }
                self.attack = Some(CurrentAttack {
                    kind,
                    profile,
                    hitbox: ids.next_hitbox(),
                    aerial: !body.grounded,
                });
                self.enter(CombatState::Attacking(tier));
                if tier > 0 {
                    ActionResult::ComboExtended(tier)
                } else {
                    ActionResult::Started(action)
                }
            },
        }
    }

    /// Movement intent for this tick's state.
    #[must_use]
    pub fn movement_intent(&self, input: &InputSnapshot, body: &Body, movement: &MovementConfig) -> MovementIntent {
        let drive = match self.state {
            s if s.is_free() => Drive::Walk {
                axis: input.horizontal_axis(),
                speed: None,
            },
            CombatState::Rolling => Drive::Forced(body.facing * movement.roll_speed),
            _ => Drive::Locked,
        };
        MovementIntent {
            drive,
            jump_pressed: self.state.is_free() && input.pressed(Action::Jump),
            jump_held: input.held(Action::Jump),
            drop_pressed: self.state.is_free() && input.pressed(Action::MoveDown),
        }
    }

    /// Settles Idle / Moving / Jumping from the resolved body.
    pub fn settle_free_state(&mut self, body: &Body) {
        if !self.state.is_free() {
            return;
        }
        let next = if !body.grounded {
            CombatState::Jumping
        } else if body.velocity.x.abs() > 0.0 {
            CombatState::Moving
        } else {
            CombatState::Idle
        };
        if next != self.state {
            self.enter(next);
        }
    }

    /// Live hitbox for this tick, if the attack is in its active frames.
    #[must_use]
    pub fn active_hitbox(&self, owner: EntityId, body: &Body) -> Option<ActiveHitbox> {
        let attack = self.attack?;
        if !matches!(self.state, CombatState::Attacking(_)) {
            return None;
        }
        attack
            .profile
            .active_frames()
            .contains(self.state_ticks)
            .then(|| ActiveHitbox {
                id: attack.hitbox,
                owner,
                attacker: owner,
                team: Team::Player,
                shape: attack.profile.shape_for(body),
                damage: attack.profile.damage,
                knockback: attack.profile.directed_knockback(body.facing),
                aerial: attack.aerial,
                grapple: false,
            })
    }

    /// Hitbox instance that is still alive (for ledger pruning).
    #[must_use]
    pub fn live_hitbox(&self) -> Option<HitboxId> {
        self.attack.map(|a| a.hitbox)
    }

    /// How the current parry stance treats a hit landing now.
    #[must_use]
    pub fn parry_check(&self, tuning: &CombatTuning) -> ParryCheck {
        match self.state {
            CombatState::Parrying if self.state_ticks < tuning.perfect_parry_ticks => ParryCheck::Perfect,
            CombatState::Parrying => ParryCheck::Late,
            _ => ParryCheck::None,
        }
    }

    /// Forces hitstun, cancelling any attack, stance or queued press.
    pub fn enter_hitstun(&mut self, ticks: u32) {
        if self.is_dead() {
            return;
        }
        self.attack = None;
        self.pending = None;
        self.hitstun_ticks = ticks.max(1);
        self.enter(CombatState::Hitstun);
    }

    /// Ends hitstun immediately (respawn, level reset).
    pub fn clear_hitstun(&mut self) {
        if self.state == CombatState::Hitstun {
            self.enter(CombatState::Idle);
        }
    }

    /// Enters the terminal state.
    pub fn kill(&mut self) {
        self.attack = None;
        self.pending = None;
        self.enter(CombatState::Dead);
    }
}

/// Highest-priority combat press of the tick.
fn requested_action(input: &InputSnapshot) -> Option<CombatAction> {
    if input.pressed(Action::Roll) {
        Some(CombatAction::Roll)
    } else if input.pressed(Action::Parry) {
        Some(CombatAction::Parry)
    } else if input.pressed(Action::LightAttack) {
        Some(CombatAction::Attack(AttackKind::Light))
    } else if input.pressed(Action::HeavyAttack) {
        Some(CombatAction::Attack(AttackKind::Heavy))
    } else {
        None
    }
}
