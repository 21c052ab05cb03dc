//! The level simulation.
//!
//! A [`LevelInstance`] owns every entity of one level and advances them by
//! one fixed step per [`LevelInstance::tick`]. Inside a tick the work always
//! happens in the same order:
//!
//! 1. Platforms move and carry their riders
//! 2. Timers and player input
//! 3. Movement and collision for every other entity, in ascending id order
//! 4. Hit resolution
//! 5. Enemy decisions (which may spawn projectiles)
//! 6. Boss phase checks
//! 7. Pruning of expired entities
//! 8. Level outcome
//!
//! Nothing in here reads a clock or a random source, so identical inputs
//! always produce identical snapshots.

use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use sinaloa_common::{EntityId, HitboxId, IdSequence, SchemaVersion, Vec2};
use tracing::{debug, info, trace, warn};

use crate::boss::PHASE_TRANSITION_IFRAMES;
use crate::collision::{Aabb, LevelGeometry};
use crate::combat::ActionResult;
use crate::config::SimConfig;
use crate::damage;
use crate::enemy::{ProjectileRequest, TargetInfo};
use crate::entity::{Brain, Entity, EntityArena, EntityKind, EntityResult};
use crate::events::{FrameEvent, FrameEvents};
use crate::hazard::HazardMotion;
use crate::hitbox::{DamageSource, HitLedger, Team};
use crate::input::InputSnapshot;
use crate::level::{self, LevelDescriptor, LevelResult};
use crate::physics::{MovementIntent, MovementState};
use crate::platform::PlatformMotion;
use crate::projectile::Projectile;
use crate::snapshot::{EntitySnapshot, PlayerProgress, WorldSnapshot};

/// Longest step a single tick may integrate, in seconds.
pub const MAX_STEP: f32 = 0.1;

/// How a level ended, if it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelOutcome {
    /// Still being played
    #[default]
    InProgress,
    /// Every enemy is dead
    Cleared,
    /// The player died
    PlayerDefeated,
}

impl LevelOutcome {
    /// True once the level was won or lost.
    #[must_use]
    pub const fn is_over(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

/// One running level.
#[derive(Debug, Clone)]
pub struct LevelInstance {
    name: String,
    config: SimConfig,
    geometry: LevelGeometry,
    entities: EntityArena,
    ledger: HitLedger,
    ids: IdSequence,
    tick: u64,
    player: EntityId,
    player_spawn: Vec2,
    enemy_total: usize,
    outcome: LevelOutcome,
}

impl LevelInstance {
    /// Validates `descriptor` and `config` and builds the level.
    pub fn load(descriptor: &LevelDescriptor, config: SimConfig) -> LevelResult<Self> {
        level::load_level(descriptor, config)
    }

    /// Parses a RON level and builds it.
    pub fn from_ron_str(text: &str, config: SimConfig) -> LevelResult<Self> {
        let descriptor = LevelDescriptor::from_ron_str(text)?;
        Self::load(&descriptor, config)
    }

    /// Builds a level from an already validated descriptor.
    ///
    /// Ids are handed out in spawn order: player, enemies, hazards, platforms.
    pub(crate) fn build(descriptor: &LevelDescriptor, config: SimConfig) -> Self {
        let mut ids = IdSequence::new();
        let player = ids.next_entity();
        let mut spawned = vec![Entity::player(player, descriptor.player_spawn, &config.movement)];
        for spawn in &descriptor.enemies {
            spawned.push(Entity::enemy(ids.next_entity(), spawn.profile(), spawn.position));
        }
        for script in &descriptor.hazards {
            let id = ids.next_entity();
            let motion = HazardMotion::new(script.clone(), &mut ids);
            spawned.push(Entity::hazard(id, motion));
        }
        for script in &descriptor.platforms {
            spawned.push(Entity::platform(ids.next_entity(), PlatformMotion::new(script.clone())));
        }

        let mut level = Self {
            name: descriptor.name.clone(),
            config,
            geometry: descriptor.geometry(),
            entities: EntityArena::new(),
            ledger: HitLedger::new(),
            ids,
            tick: 0,
            player,
            player_spawn: descriptor.player_spawn,
            enemy_total: descriptor.enemies.len(),
            outcome: LevelOutcome::InProgress,
        };
        for entity in spawned {
            level.insert(entity);
        }
        level
    }

    fn insert(&mut self, entity: Entity) -> Option<EntityId> {
        match self.entities.spawn_entity(entity) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Dropped spawn: {}", e);
                None
            },
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Level name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tuning in use.
    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Static collision world.
    #[must_use]
    pub const fn geometry(&self) -> &LevelGeometry {
        &self.geometry
    }

    /// Number of ticks run so far.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Current outcome.
    #[must_use]
    pub const fn outcome(&self) -> LevelOutcome {
        self.outcome
    }

    /// The player's id.
    #[must_use]
    pub const fn player_id(&self) -> EntityId {
        self.player
    }

    /// The player entity.
    #[must_use]
    pub fn player(&self) -> Option<&Entity> {
        self.entities.get(self.player).ok()
    }

    /// Looks up an entity.
    pub fn entity(&self, id: EntityId) -> EntityResult<&Entity> {
        self.entities.get(id)
    }

    /// Iterates entities in storage order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    // ========================================================================
    // Host operations
    // ========================================================================

    /// Restores health. The only operation that raises health.
    ///
    /// Returns the amount actually restored; dead entities get nothing.
    pub fn heal(&mut self, id: EntityId, amount: i32) -> EntityResult<i32> {
        let entity = self.entities.get_mut(id)?;
        if entity.is_dead() {
            return Ok(0);
        }
        Ok(entity.health.as_mut().map_or(0, |h| h.heal(amount)))
    }

    /// Carries player state over from a previous level.
    ///
    /// Health is clamped to `[1, max]` so a level never starts lost.
    pub fn restore_player(&mut self, progress: PlayerProgress) -> EntityResult<()> {
        let player = self.entities.get_mut(self.player)?;
        if let Some(health) = player.health.as_mut() {
            health.set(progress.health.clamp(1, health.max()));
        }
        Ok(())
    }

    /// Player state to carry into the next level.
    #[must_use]
    pub fn player_progress(&self) -> Option<PlayerProgress> {
        self.player().and_then(|p| p.health).map(|h| PlayerProgress { health: h.current() })
    }

    /// Read-only view of every entity, in ascending id order.
    #[must_use]
    pub fn snapshot(&self) -> WorldSnapshot {
        let entities = self
            .entities
            .sorted_ids()
            .into_iter()
            .filter_map(|id| self.entities.get(id).ok())
            .map(EntitySnapshot::capture)
            .collect();
        WorldSnapshot {
            version: SchemaVersion::SNAPSHOT,
            tick: self.tick,
            outcome: self.outcome,
            entities,
        }
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Advances the level by one step.
    ///
    /// A non-finite or non-positive `dt` is replaced by the configured fixed
    /// step. Once the level is won or lost the tick counter still advances
    /// but the world is frozen.
    pub fn tick(&mut self, input: &InputSnapshot, dt: f32) -> FrameEvents {
        let dt = self.step_length(dt);
        self.tick += 1;
        let mut events = FrameEvents::new(self.tick);
        if self.outcome.is_over() {
            return events;
        }

        let order = self.entities.sorted_ids();
        self.move_platforms(&order, dt);
        let platforms: Vec<Aabb> = order
            .iter()
            .filter_map(|&id| self.entities.get(id).ok().and_then(Entity::platform_top))
            .collect();
        for &id in &order {
            let Ok(entity) = self.entities.get_mut(id) else {
                continue;
            };
            entity.invincibility = entity.invincibility.saturating_sub(1);
            let world = World {
                config: &self.config,
                geometry: &self.geometry,
                platforms: &platforms,
            };
            step_entity(entity, input, &world, &mut self.ids, dt, &mut events);
            check_bounds(entity, &self.geometry, &self.config, self.player_spawn, &mut events);
        }

        damage::resolve_hits(
            &mut self.entities,
            &self.geometry,
            &mut self.ledger,
            &self.config.combat,
            &mut events,
        );

        self.think_enemies(&order);
        self.check_boss_phases(&order, &mut events);
        self.prune();
        self.update_outcome(&mut events);

        trace!("Tick {}: {} events", self.tick, events.len());
        events
    }

    /// Moves platforms first and carries whatever stood on them.
    fn move_platforms(&mut self, order: &[EntityId], dt: f32) {
        for &id in order {
            let Ok(platform) = self.entities.get(id) else {
                continue;
            };
            if platform.kind != EntityKind::Platform {
                continue;
            }
            let riders: Vec<EntityId> = platform.platform_top().map_or_else(Vec::new, |top| {
                order
                    .iter()
                    .copied()
                    .filter(|&other| self.entities.get(other).map_or(false, |e| is_riding(e, &top)))
                    .collect()
            });

            let Ok(platform) = self.entities.get_mut(id) else {
                continue;
            };
            let Entity { body, brain, .. } = platform;
            let Brain::Platform(motion) = brain else {
                continue;
            };
            let from = body.position;
            motion.advance(body, !riders.is_empty(), dt);
            let shift = body.position - from;
            if shift == Vec2::ZERO {
                continue;
            }
            for rider in riders {
                if let Ok(entity) = self.entities.get_mut(rider) {
                    let carried = self.geometry.resolve_movement(&entity.body.aabb(), shift, false);
                    entity.body.position += carried.delta;
                }
            }
        }
    }

    fn step_length(&self, dt: f32) -> f32 {
        if dt.is_finite() && dt > 0.0 {
            dt.min(MAX_STEP)
        } else {
            warn!("Rejected step length {}, using {}", dt, self.config.fixed_dt);
            self.config.fixed_dt
        }
    }

    fn think_enemies(&mut self, order: &[EntityId]) {
        let target = self.player_target();
        let mut requests = Vec::new();
        for &id in order {
            let Ok(entity) = self.entities.get_mut(id) else {
                continue;
            };
            let Entity { body, brain, .. } = entity;
            if let Brain::Enemy(enemy) = brain {
                if let Some(request) = enemy.think(body, target.as_ref(), &mut self.ids) {
                    requests.push((id, request));
                }
            }
        }
        for (shooter, request) in requests {
            self.spawn_projectile(shooter, &request);
        }
    }

    fn player_target(&self) -> Option<TargetInfo> {
        let player = self.player()?;
        if player.is_dead() {
            return None;
        }
        let position = player.body.position;
        Some(TargetInfo {
            id: player.id,
            position,
            occluded: self.geometry.is_occluded(position, self.tick),
        })
    }

    fn spawn_projectile(&mut self, shooter: EntityId, request: &ProjectileRequest) -> Option<EntityId> {
        let hitbox = self.ids.next_hitbox();
        let projectile = Projectile::launch(shooter, Team::Enemy, hitbox, &request.spec, request.direction);
        let id = self.ids.next_entity();
        let spawned = self.insert(Entity::projectile(id, projectile, request.origin, request.spec.size));
        if spawned.is_some() {
            debug!("{} fired projectile {}", shooter, id);
        }
        spawned
    }

    fn check_boss_phases(&mut self, order: &[EntityId], events: &mut FrameEvents) {
        for &id in order {
            let Ok(entity) = self.entities.get_mut(id) else {
                continue;
            };
            if entity.is_dead() {
                continue;
            }
            let health = entity.health_points();
            let Brain::Enemy(enemy) = &mut entity.brain else {
                continue;
            };
            let Some(phase) = enemy.boss_mut().and_then(|b| b.check_phase(health)) else {
                continue;
            };
            enemy.phase_reset();
            entity.invincibility = PHASE_TRANSITION_IFRAMES;
            events.push(FrameEvent::BossPhaseChanged { boss: id, phase });
        }
    }

    fn prune(&mut self) {
        let mut expired: Vec<EntityId> = self
            .entities
            .iter()
            .filter(|e| match &e.brain {
                Brain::Enemy(enemy) => enemy.is_expired(),
                Brain::Projectile(projectile) => projectile.is_finished(),
                Brain::Player(_) | Brain::Hazard(_) | Brain::Platform(_) => false,
            })
            .map(|e| e.id)
            .collect();
        expired.sort_unstable();
        for id in expired {
            if self.entities.despawn(id).is_ok() {
                debug!("Pruned {}", id);
            }
        }

        let live: AHashSet<HitboxId> = self.entities.iter().filter_map(Entity::live_hitbox).collect();
        self.ledger.retain_live(&live);
    }

    fn update_outcome(&mut self, events: &mut FrameEvents) {
        let player_dead = self.player().map_or(true, Entity::is_dead);
        let enemies_left = self
            .entities
            .iter()
            .any(|e| matches!(e.kind, EntityKind::Enemy(_)) && !e.is_dead());

        let outcome = if player_dead {
            LevelOutcome::PlayerDefeated
        } else if self.enemy_total > 0 && !enemies_left {
            LevelOutcome::Cleared
        } else {
            LevelOutcome::InProgress
        };

        if outcome != self.outcome {
            info!("Level '{}' {:?} at tick {}", self.name, outcome, self.tick);
            self.outcome = outcome;
            events.push(FrameEvent::LevelOutcomeChanged { outcome });
        }
    }
}

/// Read-only world state bodies move through this tick.
struct World<'a> {
    config: &'a SimConfig,
    geometry: &'a LevelGeometry,
    platforms: &'a [Aabb],
}

fn is_riding(entity: &Entity, top: &Aabb) -> bool {
    matches!(entity.kind, EntityKind::Player | EntityKind::Enemy(_))
        && !entity.is_dead()
        && entity.body.grounded
        && entity.body.aabb().rests_on(top)
}

fn step_entity(
    entity: &mut Entity,
    input: &InputSnapshot,
    world: &World<'_>,
    ids: &mut IdSequence,
    dt: f32,
    events: &mut FrameEvents,
) {
    let World {
        config,
        geometry,
        platforms,
    } = *world;
    let id = entity.id;
    let Entity { body, brain, .. } = entity;
    match brain {
        Brain::Player(player) => {
            player.combat.begin_tick(&config.combat);
            if let ActionResult::ComboExtended(index) = player.combat.apply_input(input, body, ids, &config.combat) {
                events.push(FrameEvent::ComboExtended { entity: id, index });
            }
            let intent = player.combat.movement_intent(input, body, &config.movement);
            player.movement.step_on(body, &intent, &config.movement, geometry, platforms, dt);
            player.combat.settle_free_state(body);
        },
        Brain::Enemy(enemy) => {
            // Enemies never jump, so a fresh jump budget every tick is fine
            let intent = MovementIntent::drive(enemy.drive());
            MovementState::new(&config.movement).step_on(body, &intent, &config.movement, geometry, platforms, dt);
        },
        Brain::Projectile(projectile) => {
            if !projectile.advance(body, geometry, dt) {
                trace!("Projectile {} finished", id);
            }
        },
        Brain::Hazard(hazard) => {
            if let Some(ticks_until) = hazard.advance(body, ids, dt) {
                events.push(FrameEvent::HazardWarning { hazard: id, ticks_until });
            }
        },
        // Moved before everything else in move_platforms
        Brain::Platform(_) => {},
    }
}

fn check_bounds(
    entity: &mut Entity,
    geometry: &LevelGeometry,
    config: &SimConfig,
    player_spawn: Vec2,
    events: &mut FrameEvents,
) {
    let bounds = geometry.bounds();
    let aabb = entity.body.aabb();
    let fell = aabb.min_y > bounds.max_y;
    let outside = fell || aabb.max_y < bounds.min_y || aabb.max_x < bounds.min_x || aabb.min_x > bounds.max_x;
    if !outside || entity.is_dead() {
        return;
    }

    match entity.kind {
        EntityKind::Player if fell => fall_out(entity, config, player_spawn, events),
        EntityKind::Enemy(_) if fell => {
            debug!("{} fell out of the level", entity.id);
            entity.kill();
            events.push(FrameEvent::EntityDied { entity: entity.id });
        },
        EntityKind::Projectile => entity.kill(),
        EntityKind::Player | EntityKind::Enemy(_) | EntityKind::Hazard | EntityKind::Platform => {},
    }
}

fn fall_out(player: &mut Entity, config: &SimConfig, spawn: Vec2, events: &mut FrameEvents) {
    let Some(health) = player.health.as_mut() else {
        return;
    };
    let removed = health.damage(config.fall_damage);
    let dead = health.is_dead();
    if removed > 0 {
        events.push(FrameEvent::DamageDealt {
            attacker: DamageSource::Fall,
            defender: player.id,
            amount: removed,
        });
    }
    if dead {
        player.kill();
        events.push(FrameEvent::EntityDied { entity: player.id });
        return;
    }

    info!("Player fell out, respawning at ({}, {})", spawn.x, spawn.y);
    player.body.position = spawn;
    player.body.velocity = Vec2::ZERO;
    player.body.grounded = false;
    player.invincibility = config.combat.player_hurt_iframes;
}
