//! Entity system with arena-based storage.
//!
//! Every actor in a level (player, enemies, projectiles, hazards, platforms) is
//! an [`Entity`]: a [`Body`] plus health, an invincibility timer and a
//! [`Brain`] holding its kind-specific state machine.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use sinaloa_common::{EntityId, HitboxId, Vec2};
use thiserror::Error;

use crate::combat::CombatController;
use crate::enemy::{Archetype, ArchetypeProfile, EnemyBrain};
use crate::collision::Aabb;
use crate::hazard::HazardMotion;
use crate::hitbox::{ActiveHitbox, Hurtbox, Team};
use crate::physics::{Body, MovementConfig, MovementState};
use crate::platform::PlatformMotion;
use crate::projectile::Projectile;

/// Player collision box size.
pub const PLAYER_SIZE: Vec2 = Vec2::new(16.0, 24.0);

/// Player starting and maximum health.
pub const PLAYER_MAX_HEALTH: i32 = 100;

/// Error types for entity operations.
#[derive(Debug, Error)]
pub enum EntityError {
    /// Entity not found
    #[error("Entity not found: {0}")]
    NotFound(EntityId),
    /// Id already in use
    #[error("Entity id already in use: {0}")]
    DuplicateId(EntityId),
}

/// Result type for entity operations.
pub type EntityResult<T> = Result<T, EntityError>;

/// Health component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Current health
    current: i32,
    /// Maximum health
    max: i32,
}

impl Health {
    /// Creates full health.
    #[must_use]
    pub const fn new(max: i32) -> Self {
        Self { current: max, max }
    }

    /// Gets current health.
    #[must_use]
    pub const fn current(&self) -> i32 {
        self.current
    }

    /// Gets max health.
    #[must_use]
    pub const fn max(&self) -> i32 {
        self.max
    }

    /// Removes health, clamped at zero. Returns the amount actually removed.
    pub fn damage(&mut self, amount: i32) -> i32 {
        let before = self.current;
        self.current = self.current.saturating_sub(amount.max(0)).max(0);
        before - self.current
    }

    /// Adds health, clamped at max. Returns the amount actually added.
    pub fn heal(&mut self, amount: i32) -> i32 {
        let before = self.current;
        self.current = self.current.saturating_add(amount.max(0)).min(self.max);
        self.current - before
    }

    /// Sets health directly, clamped to [0, max].
    pub fn set(&mut self, value: i32) {
        self.current = value.clamp(0, self.max);
    }

    /// Checks if dead.
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.current <= 0
    }
}

/// Kind of entity, with the archetype for enemies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Player character
    Player,
    /// Enemy or boss
    Enemy(Archetype),
    /// Knife or laser bolt
    Projectile,
    /// Scripted moving hazard
    Hazard,
    /// Moving or crumbling platform
    Platform,
}

/// Player-only state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerBrain {
    /// Combat state machine
    pub combat: CombatController,
    /// Jump budget and drop-through timers
    pub movement: MovementState,
}

/// Kind-specific behavior state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Brain {
    /// Player combat and movement
    Player(PlayerBrain),
    /// Enemy state machine
    Enemy(Box<EnemyBrain>),
    /// Projectile flight
    Projectile(Projectile),
    /// Scripted hazard trajectory
    Hazard(Box<HazardMotion>),
    /// Platform motion and crumble timers
    Platform(Box<PlatformMotion>),
}

/// An actor in the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier
    pub id: EntityId,
    /// Entity kind
    pub kind: EntityKind,
    /// Side it fights for
    pub team: Team,
    /// Physical state
    pub body: Body,
    /// Health (players and enemies only)
    pub health: Option<Health>,
    /// Ticks of invincibility left
    pub invincibility: u32,
    /// Behavior state
    pub brain: Brain,
}

impl Entity {
    /// Creates the player standing at `position`.
    #[must_use]
    pub fn player(id: EntityId, position: Vec2, movement: &MovementConfig) -> Self {
        Self {
            id,
            kind: EntityKind::Player,
            team: Team::Player,
            body: Body::new(position, PLAYER_SIZE),
            health: Some(Health::new(PLAYER_MAX_HEALTH)),
            invincibility: 0,
            brain: Brain::Player(PlayerBrain {
                combat: CombatController::new(),
                movement: MovementState::new(movement),
            }),
        }
    }

    /// Creates an enemy from its profile, patrolling around `position`.
    #[must_use]
    pub fn enemy(id: EntityId, profile: ArchetypeProfile, position: Vec2) -> Self {
        let mut body = Body::new(position, profile.size);
        body.facing = -1.0;
        Self {
            id,
            kind: EntityKind::Enemy(profile.archetype),
            team: Team::Enemy,
            body,
            health: Some(Health::new(profile.max_health)),
            invincibility: 0,
            brain: Brain::Enemy(Box::new(EnemyBrain::new(profile, position))),
        }
    }

    /// Creates an in-flight projectile.
    #[must_use]
    pub fn projectile(id: EntityId, projectile: Projectile, origin: Vec2, size: Vec2) -> Self {
        let mut body = Body::new(origin, size);
        body.velocity = projectile.velocity;
        body.face(projectile.velocity.x);
        Self {
            id,
            kind: EntityKind::Projectile,
            team: projectile.team,
            body,
            health: None,
            invincibility: 0,
            brain: Brain::Projectile(projectile),
        }
    }

    /// Creates a scripted hazard at its origin.
    #[must_use]
    pub fn hazard(id: EntityId, motion: HazardMotion) -> Self {
        let script = motion.script();
        Self {
            id,
            kind: EntityKind::Hazard,
            team: Team::Environment,
            body: Body::new(script.origin(), script.size()),
            health: None,
            invincibility: 0,
            brain: Brain::Hazard(Box::new(motion)),
        }
    }

    /// Spawns a platform at its script origin.
    #[must_use]
    pub fn platform(id: EntityId, motion: PlatformMotion) -> Self {
        let script = motion.script();
        Self {
            id,
            kind: EntityKind::Platform,
            team: Team::Environment,
            body: Body::new(script.origin(), script.size()),
            health: None,
            invincibility: 0,
            brain: Brain::Platform(Box::new(motion)),
        }
    }

    /// Box bodies can stand on this tick, for platforms that are solid.
    #[must_use]
    pub fn platform_top(&self) -> Option<Aabb> {
        match &self.brain {
            Brain::Platform(p) if p.is_solid() => Some(self.body.aabb()),
            _ => None,
        }
    }

    /// Whether hits are currently ignored.
    #[must_use]
    pub fn is_invincible(&self) -> bool {
        if self.invincibility > 0 {
            return true;
        }
        match &self.brain {
            Brain::Player(p) => p.combat.is_rolling(),
            _ => false,
        }
    }

    /// True once the entity reached its terminal state.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        match &self.brain {
            Brain::Player(p) => p.combat.is_dead(),
            Brain::Enemy(e) => e.is_dead(),
            Brain::Projectile(p) => p.is_finished(),
            Brain::Hazard(_) | Brain::Platform(_) => false,
        }
    }

    /// Damageable box for this tick; entities without health have none.
    #[must_use]
    pub fn hurtbox(&self) -> Option<Hurtbox> {
        self.health?;
        if self.is_dead() {
            return None;
        }
        Some(Hurtbox {
            entity: self.id,
            team: self.team,
            shape: self.body.aabb(),
            vulnerable: !self.is_invincible(),
        })
    }

    /// Live hitbox for this tick.
    #[must_use]
    pub fn active_hitbox(&self) -> Option<ActiveHitbox> {
        match &self.brain {
            Brain::Player(p) => p.combat.active_hitbox(self.id, &self.body),
            Brain::Enemy(e) => e.active_hitbox(self.id, &self.body),
            Brain::Projectile(p) => p.active_hitbox(self.id, &self.body),
            Brain::Hazard(h) => h.active_hitbox(self.id, &self.body),
            Brain::Platform(_) => None,
        }
    }

    /// Hitbox instance still alive, whether or not it is in active frames.
    #[must_use]
    pub fn live_hitbox(&self) -> Option<HitboxId> {
        match &self.brain {
            Brain::Player(p) => p.combat.live_hitbox(),
            Brain::Enemy(e) => e.live_hitbox(),
            Brain::Projectile(p) => (!p.is_finished()).then_some(p.hitbox),
            Brain::Hazard(h) => h.live_hitbox(),
            Brain::Platform(_) => None,
        }
    }

    /// Forces hitstun on players and enemies.
    pub fn enter_hitstun(&mut self, ticks: u32) {
        match &mut self.brain {
            Brain::Player(p) => p.combat.enter_hitstun(ticks),
            Brain::Enemy(e) => e.enter_hitstun(ticks),
            Brain::Projectile(_) | Brain::Hazard(_) | Brain::Platform(_) => {},
        }
    }

    /// Moves the entity to its terminal state.
    pub fn kill(&mut self) {
        if let Some(health) = self.health.as_mut() {
            health.set(0);
        }
        match &mut self.brain {
            Brain::Player(p) => p.combat.kill(),
            Brain::Enemy(e) => e.kill(),
            Brain::Projectile(p) => p.spent = true,
            Brain::Hazard(_) | Brain::Platform(_) => {},
        }
    }

    /// Current health, 0 for entities without health.
    #[must_use]
    pub fn health_points(&self) -> i32 {
        self.health.map_or(0, |h| h.current())
    }
}

/// Arena-based entity storage.
///
/// Uses a free list for slot reuse and a map from id to slot for lookup.
/// Iteration for simulation purposes goes through [`EntityArena::sorted_ids`]
/// so update order never depends on slot reuse.
#[derive(Debug, Default, Clone)]
pub struct EntityArena {
    /// Storage slots for entities
    entities: Vec<Option<Entity>>,
    /// Free slot indices for reuse
    free_list: Vec<usize>,
    /// Map from EntityId to slot index
    id_to_index: AHashMap<EntityId, usize>,
}

impl EntityArena {
    /// Creates a new empty entity arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.id_to_index.len()
    }

    /// Returns true if there are no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id_to_index.is_empty()
    }

    /// Inserts an entity under its own id.
    pub fn spawn_entity(&mut self, entity: Entity) -> EntityResult<EntityId> {
        let id = entity.id;
        if self.id_to_index.contains_key(&id) {
            return Err(EntityError::DuplicateId(id));
        }

        let index = if let Some(free_index) = self.free_list.pop() {
            self.entities[free_index] = Some(entity);
            free_index
        } else {
            let index = self.entities.len();
            self.entities.push(Some(entity));
            index
        };

        self.id_to_index.insert(id, index);
        Ok(id)
    }

    /// Removes an entity by id.
    pub fn despawn(&mut self, id: EntityId) -> EntityResult<Entity> {
        let index = self.id_to_index.remove(&id).ok_or(EntityError::NotFound(id))?;
        let entity = self.entities[index].take().ok_or(EntityError::NotFound(id))?;
        self.free_list.push(index);
        Ok(entity)
    }

    /// Gets a reference to an entity by id.
    pub fn get(&self, id: EntityId) -> EntityResult<&Entity> {
        let index = self.id_to_index.get(&id).ok_or(EntityError::NotFound(id))?;
        self.entities[*index].as_ref().ok_or(EntityError::NotFound(id))
    }

    /// Gets a mutable reference to an entity by id.
    pub fn get_mut(&mut self, id: EntityId) -> EntityResult<&mut Entity> {
        let index = self.id_to_index.get(&id).ok_or(EntityError::NotFound(id))?;
        self.entities[*index].as_mut().ok_or(EntityError::NotFound(id))
    }

    /// Checks if an entity with the given id exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.id_to_index.contains_key(&id)
    }

    /// Iterates over entities in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter_map(|slot| slot.as_ref())
    }

    /// Mutable iteration in slot order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.iter_mut().filter_map(|slot| slot.as_mut())
    }

    /// All ids in ascending order.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.id_to_index.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Removes every entity.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.free_list.clear();
        self.id_to_index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: u64) -> Entity {
        Entity::player(EntityId::from_raw(id), Vec2::ZERO, &MovementConfig::default())
    }

    #[test]
    fn test_health_clamps() {
        let mut health = Health::new(10);
        assert_eq!(health.damage(4), 4);
        assert_eq!(health.damage(4), 4);
        assert_eq!(health.damage(4), 2);
        assert_eq!(health.current(), 0);
        assert!(health.is_dead());
        assert_eq!(health.damage(4), 0);

        assert_eq!(health.heal(100), 10);
        assert_eq!(health.current(), 10);
        // Negative amounts never move health
        assert_eq!(health.damage(-5), 0);
        assert_eq!(health.heal(-5), 0);
    }

    #[test]
    fn test_spawn_get_despawn() {
        let mut arena = EntityArena::new();
        let id = arena.spawn_entity(player(1)).expect("spawn");
        assert!(arena.contains(id));
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.get(id).expect("get").kind, EntityKind::Player);

        arena.get_mut(id).expect("get_mut").invincibility = 5;
        assert_eq!(arena.get(id).expect("get").invincibility, 5);

        let removed = arena.despawn(id).expect("despawn");
        assert_eq!(removed.id, id);
        assert!(arena.is_empty());
        assert!(matches!(arena.get(id), Err(EntityError::NotFound(_))));
        assert!(arena.despawn(id).is_err());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut arena = EntityArena::new();
        arena.spawn_entity(player(1)).expect("spawn");
        assert!(matches!(arena.spawn_entity(player(1)), Err(EntityError::DuplicateId(_))));
    }

    #[test]
    fn test_sorted_ids_ignore_slot_reuse() {
        let mut arena = EntityArena::new();
        for id in 1..=3 {
            arena.spawn_entity(player(id)).expect("spawn");
        }
        arena.despawn(EntityId::from_raw(1)).expect("despawn");
        arena.spawn_entity(player(9)).expect("spawn");

        let ids: Vec<u64> = arena.sorted_ids().into_iter().map(EntityId::raw).collect();
        assert_eq!(ids, vec![2, 3, 9]);
        // Slot 0 was reused by #9
        assert_eq!(arena.iter().next().map(|e| e.id.raw()), Some(9));
    }

    #[test]
    fn test_rolling_player_is_invincible() {
        let mut entity = player(1);
        assert!(!entity.is_invincible());
        entity.invincibility = 3;
        assert!(entity.is_invincible());
        let hurtbox = entity.hurtbox().expect("player has a hurtbox");
        assert!(!hurtbox.vulnerable);
    }

    #[test]
    fn test_enemy_constructor_uses_profile() {
        let profile = ArchetypeProfile::for_archetype(Archetype::Luchador);
        let entity = Entity::enemy(EntityId::from_raw(4), profile.clone(), Vec2::new(50.0, 50.0));
        assert_eq!(entity.kind, EntityKind::Enemy(Archetype::Luchador));
        assert_eq!(entity.health_points(), profile.max_health);
        assert_eq!(entity.team, Team::Enemy);
        assert!(entity.active_hitbox().is_none());
    }

    #[test]
    fn test_kill_clamps_health() {
        let mut entity = player(1);
        entity.kill();
        assert_eq!(entity.health_points(), 0);
        assert!(entity.is_dead());
        assert!(entity.hurtbox().is_none());
    }
}
