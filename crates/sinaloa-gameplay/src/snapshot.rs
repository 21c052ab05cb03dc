//! Read-only world snapshots for render, audio, UI and save collaborators.
//!
//! Collaborators never touch the entity arena; after a tick they read a
//! [`WorldSnapshot`] instead.

use serde::{Deserialize, Serialize};
use sinaloa_common::{EntityId, SchemaVersion, Vec2};

use crate::entity::{Brain, Entity, EntityKind};
use crate::hitbox::Team;
use crate::simulation::LevelOutcome;

/// Public state of one entity after a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Entity id
    pub id: EntityId,
    /// Entity kind
    pub kind: EntityKind,
    /// Team
    pub team: Team,
    /// Center position
    pub position: Vec2,
    /// Velocity in px/s
    pub velocity: Vec2,
    /// 1.0 right, -1.0 left
    pub facing: f32,
    /// Resting on ground
    pub grounded: bool,
    /// Current health
    pub health: Option<i32>,
    /// Maximum health
    pub max_health: Option<i32>,
    /// Invincibility ticks left
    pub invincibility: u32,
    /// State machine label ("idle", "telegraph", ...)
    pub state: String,
    /// Boss phase, for bosses
    pub boss_phase: Option<u8>,
}

impl EntitySnapshot {
    /// Captures an entity.
    #[must_use]
    pub fn capture(entity: &Entity) -> Self {
        let (state, boss_phase) = match &entity.brain {
            Brain::Player(p) => (p.combat.state().label(), None),
            Brain::Enemy(e) => (e.state().label(), e.boss().map(crate::boss::BossController::phase)),
            Brain::Projectile(p) => (if p.is_finished() { "spent" } else { "flying" }, None),
            Brain::Hazard(h) => (if h.is_active() { "moving" } else { "idle" }, None),
            Brain::Platform(p) => (p.label(), None),
        };
        Self {
            id: entity.id,
            kind: entity.kind,
            team: entity.team,
            position: entity.body.position,
            velocity: entity.body.velocity,
            facing: entity.body.facing,
            grounded: entity.body.grounded,
            health: entity.health.map(|h| h.current()),
            max_health: entity.health.map(|h| h.max()),
            invincibility: entity.invincibility,
            state: state.to_string(),
            boss_phase,
        }
    }
}

/// Public state of a whole level after a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Snapshot format version
    pub version: SchemaVersion,
    /// Tick the snapshot was taken after
    pub tick: u64,
    /// Level outcome
    pub outcome: LevelOutcome,
    /// Entities in ascending id order
    pub entities: Vec<EntitySnapshot>,
}

impl WorldSnapshot {
    /// Serializes to JSON for save files and tooling.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Reads a snapshot back from JSON.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Looks up one entity.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&EntitySnapshot> {
        self.entities.iter().find(|e| e.id == id)
    }

    /// The player entity.
    #[must_use]
    pub fn player(&self) -> Option<&EntitySnapshot> {
        self.entities.iter().find(|e| e.kind == EntityKind::Player)
    }

    /// Enemies that are still alive.
    pub fn living_enemies(&self) -> impl Iterator<Item = &EntitySnapshot> {
        self.entities
            .iter()
            .filter(|e| matches!(e.kind, EntityKind::Enemy(_)) && e.health.is_some_and(|h| h > 0))
    }
}

/// Player state carried across a level boundary by the save system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProgress {
    /// Health to start the next level with
    pub health: i32,
}

impl PlayerProgress {
    /// Reads the player's progress from a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: &WorldSnapshot) -> Option<Self> {
        snapshot.player().and_then(|p| p.health).map(|health| Self { health })
    }
}
