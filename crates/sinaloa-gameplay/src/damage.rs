//! Hit resolution: turns hitbox/hurtbox overlaps into damage, hitstun,
//! parries and grapple breaks.
//!
//! Resolution walks attackers and defenders in ascending entity id order so
//! the outcome of a tick never depends on storage order. Every hit goes
//! through the [`HitLedger`] first, which is what keeps a lingering hitbox
//! from damaging the same defender twice.

use sinaloa_common::{EntityId, Vec2, VolumeId};
use tracing::trace;

use crate::collision::{LevelGeometry, VolumeKind};
use crate::combat::{CombatTuning, ParryCheck};
use crate::enemy::Vulnerability;
use crate::entity::{Brain, Entity, EntityArena, EntityKind};
use crate::events::{FrameEvent, FrameEvents};
use crate::hitbox::{check_hit, ActiveHitbox, DamageSource, HitLedger, Team};

/// One confirmed hit, before it is applied to the defender.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitPayload {
    /// Credited source
    pub source: DamageSource,
    /// Damage before defender modifiers
    pub damage: i32,
    /// Knockback in world space
    pub knockback: Vec2,
    /// Attack launched while airborne
    pub aerial: bool,
}

/// Resolves every live hitbox against every hurtbox, then static hazard
/// volumes.
pub fn resolve_hits(
    entities: &mut EntityArena,
    geometry: &LevelGeometry,
    ledger: &mut HitLedger,
    tuning: &CombatTuning,
    events: &mut FrameEvents,
) {
    let order = entities.sorted_ids();
    let hitboxes: Vec<ActiveHitbox> = order
        .iter()
        .filter_map(|id| entities.get(*id).ok())
        .filter_map(Entity::active_hitbox)
        .collect();

    for hitbox in hitboxes {
        resolve_hitbox(entities, &order, &hitbox, ledger, tuning, events);
    }
    resolve_volumes(entities, &order, geometry, ledger, tuning, events);
}

fn still_live(entities: &EntityArena, hitbox: &ActiveHitbox) -> bool {
    entities
        .get(hitbox.owner)
        .is_ok_and(|owner| !owner.is_dead() && owner.live_hitbox() == Some(hitbox.id))
}

fn resolve_hitbox(
    entities: &mut EntityArena,
    order: &[EntityId],
    hitbox: &ActiveHitbox,
    ledger: &mut HitLedger,
    tuning: &CombatTuning,
    events: &mut FrameEvents,
) {
    for &defender_id in order {
        // An earlier hit this tick may have cancelled the attack
        if !still_live(entities, hitbox) {
            return;
        }
        let Some(hurtbox) = entities.get(defender_id).ok().and_then(Entity::hurtbox) else {
            continue;
        };

        if hitbox.grapple && try_break_grapple(entities, hitbox, defender_id, ledger, events) {
            return;
        }
        if !check_hit(hitbox, &hurtbox, ledger) {
            continue;
        }
        ledger.record(hitbox.id, defender_id);

        if hitbox.team == Team::Enemy && parry_check(entities, defender_id, tuning) == ParryCheck::Perfect {
            apply_parry(entities, hitbox, defender_id, tuning, events);
        } else {
            let payload = HitPayload {
                source: DamageSource::Entity(hitbox.attacker),
                damage: hitbox.damage,
                knockback: oriented_knockback(hitbox.team, hitbox.knockback, hitbox.shape.center(), entities, defender_id),
                aerial: hitbox.aerial,
            };
            if let Ok(defender) = entities.get_mut(defender_id) {
                apply_hit(defender, &payload, tuning, events);
            }
        }

        if hitbox.owner != hitbox.attacker {
            spend_projectile(entities, hitbox.owner);
            return;
        }
    }
}

fn parry_check(entities: &EntityArena, defender: EntityId, tuning: &CombatTuning) -> ParryCheck {
    match entities.get(defender).map(|e| &e.brain) {
        Ok(Brain::Player(p)) => p.combat.parry_check(tuning),
        _ => ParryCheck::None,
    }
}

fn apply_parry(
    entities: &mut EntityArena,
    hitbox: &ActiveHitbox,
    defender: EntityId,
    tuning: &CombatTuning,
    events: &mut FrameEvents,
) {
    trace!("{} parried {}", defender, hitbox.attacker);
    events.push(FrameEvent::ParrySucceeded {
        defender,
        attacker: hitbox.attacker,
    });
    // Parried projectiles just vanish; melee attackers are punished
    if hitbox.owner == hitbox.attacker {
        if let Ok(attacker) = entities.get_mut(hitbox.attacker) {
            attacker.enter_hitstun(tuning.parry_punish_ticks);
        }
    }
}

fn try_break_grapple(
    entities: &mut EntityArena,
    hitbox: &ActiveHitbox,
    defender_id: EntityId,
    ledger: &mut HitLedger,
    events: &mut FrameEvents,
) -> bool {
    let rolling = match entities.get(defender_id) {
        Ok(defender) => {
            matches!(&defender.brain, Brain::Player(p) if p.combat.is_rolling())
                && hitbox.team.can_hit(defender.team)
                && hitbox.shape.overlaps(&defender.body.aabb())
        },
        Err(_) => false,
    };
    if !rolling || ledger.has_hit(hitbox.id, defender_id) {
        return false;
    }
    let Ok(owner) = entities.get_mut(hitbox.owner) else {
        return false;
    };
    let Brain::Enemy(brain) = &mut owner.brain else {
        return false;
    };
    if !brain.profile().has(Vulnerability::RollInterrupt) {
        return false;
    }
    brain.interrupt_grapple();
    ledger.record(hitbox.id, defender_id);
    trace!("{} broke the grapple of {}", defender_id, hitbox.owner);
    events.push(FrameEvent::GrappleBroken {
        enemy: hitbox.owner,
        defender: defender_id,
    });
    true
}

fn spend_projectile(entities: &mut EntityArena, id: EntityId) {
    if let Ok(entity) = entities.get_mut(id) {
        if let Brain::Projectile(p) = &mut entity.brain {
            p.spent = true;
        }
    }
}

/// Environment knockback pushes away from the hazard; everything else is
/// already directed by its owner.
fn oriented_knockback(team: Team, knockback: Vec2, origin: Vec2, entities: &EntityArena, defender: EntityId) -> Vec2 {
    if team != Team::Environment {
        return knockback;
    }
    let defender_x = entities.get(defender).map_or(origin.x, |e| e.body.position.x);
    let away = if defender_x < origin.x { -1.0 } else { 1.0 };
    Vec2::new(knockback.x.abs() * away, knockback.y)
}

/// Applies a confirmed hit to a defender: damage, death or knockback and
/// hitstun.
pub fn apply_hit(defender: &mut Entity, payload: &HitPayload, tuning: &CombatTuning, events: &mut FrameEvents) {
    let Some(health) = defender.health.as_mut() else {
        return;
    };
    if health.is_dead() {
        return;
    }

    let (multiplier, knockback_scale) = match &defender.brain {
        Brain::Enemy(e) => {
            let profile = e.profile();
            let weak = payload.aerial && profile.has(Vulnerability::AerialAttacks);
            (if weak { tuning.aerial_damage_multiplier } else { 1.0 }, profile.knockback_scale)
        },
        _ => (1.0, 1.0),
    };
    let amount = (payload.damage as f32 * multiplier).round() as i32;
    let removed = health.damage(amount);
    let dead = health.is_dead();

    if removed > 0 {
        trace!("{} took {} from {:?}", defender.id, removed, payload.source);
        events.push(FrameEvent::DamageDealt {
            attacker: payload.source,
            defender: defender.id,
            amount: removed,
        });
    }

    if dead {
        defender.kill();
        events.push(FrameEvent::EntityDied { entity: defender.id });
        return;
    }

    defender.body.velocity = payload.knockback * knockback_scale;
    if payload.knockback.y < 0.0 {
        defender.body.grounded = false;
    }
    defender.enter_hitstun(tuning.hitstun_for(payload.knockback));
    if defender.kind == EntityKind::Player {
        defender.invincibility = tuning.player_hurt_iframes;
    }
}

fn resolve_volumes(
    entities: &mut EntityArena,
    order: &[EntityId],
    geometry: &LevelGeometry,
    ledger: &mut HitLedger,
    tuning: &CombatTuning,
    events: &mut FrameEvents,
) {
    let mut touching: Vec<(VolumeId, EntityId)> = Vec::new();
    for &id in order {
        let Ok(entity) = entities.get(id) else {
            continue;
        };
        if entity.hurtbox().is_none() || !Team::Environment.can_hit(entity.team) {
            continue;
        }
        for (volume_id, volume) in geometry.query_overlap(&entity.body.aabb()) {
            if volume.kind.is_damaging() {
                touching.push((volume_id, id));
            }
        }
    }
    ledger.cool_volume_contacts();
    ledger.retain_volume_contacts(|v, e| touching.contains(&(v, e)));

    for (volume_id, id) in touching {
        if ledger.in_volume(volume_id, id) {
            continue;
        }
        let Some(volume) = geometry.volume(volume_id) else {
            continue;
        };
        let (damage, knockback, rearm_after) = match volume.kind {
            VolumeKind::Hazard { damage, knockback } => (damage, knockback, None),
            VolumeKind::Lava { damage, interval_ticks } => (damage, Vec2::ZERO, Some(interval_ticks)),
            VolumeKind::Solid | VolumeKind::OneWay => continue,
        };
        let Ok(defender) = entities.get_mut(id) else {
            continue;
        };
        if defender.is_invincible() || defender.is_dead() {
            continue;
        }
        ledger.enter_volume(volume_id, id, rearm_after);

        let center = volume.bounds.center();
        let away = if defender.body.position.x < center.x { -1.0 } else { 1.0 };
        let payload = HitPayload {
            source: DamageSource::Volume(volume_id),
            damage,
            knockback: Vec2::new(knockback.x.abs() * away, knockback.y),
            aerial: false,
        };
        apply_hit(defender, &payload, tuning, events);
    }
}
