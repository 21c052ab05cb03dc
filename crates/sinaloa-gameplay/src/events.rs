//! Per-tick event batch handed to render, audio and UI.

use serde::{Deserialize, Serialize};
use sinaloa_common::EntityId;

use crate::hitbox::DamageSource;
use crate::simulation::LevelOutcome;

/// Something observable that happened during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameEvent {
    /// Health was removed from an entity
    DamageDealt {
        /// Who or what dealt the damage
        attacker: DamageSource,
        /// Entity that lost health
        defender: EntityId,
        /// Health actually removed
        amount: i32,
    },
    /// An entity's health reached zero; emitted once per entity
    EntityDied {
        /// Dead entity
        entity: EntityId,
    },
    /// A hit landed inside the defender's perfect-parry window
    ParrySucceeded {
        /// Parrying entity
        defender: EntityId,
        /// Entity whose hit was parried
        attacker: EntityId,
    },
    /// The light combo advanced
    ComboExtended {
        /// Attacking entity
        entity: EntityId,
        /// New combo tier (1 or 2)
        index: u8,
    },
    /// The boss entered a deeper phase
    BossPhaseChanged {
        /// Boss entity
        boss: EntityId,
        /// New phase index
        phase: u8,
    },
    /// A scripted hazard is about to sweep
    HazardWarning {
        /// Hazard entity
        hazard: EntityId,
        /// Ticks until the sweep starts
        ticks_until: u32,
    },
    /// A grapple was broken by a roll
    GrappleBroken {
        /// Grappling enemy
        enemy: EntityId,
        /// Rolling defender
        defender: EntityId,
    },
    /// The level was won or lost
    LevelOutcomeChanged {
        /// New outcome
        outcome: LevelOutcome,
    },
}

/// Everything that happened during one tick, in emission order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameEvents {
    /// Tick number these events belong to
    pub tick: u64,
    /// Events in emission order
    pub events: Vec<FrameEvent>,
}

impl FrameEvents {
    /// Empty batch for `tick`.
    #[must_use]
    pub const fn new(tick: u64) -> Self {
        Self {
            tick,
            events: Vec::new(),
        }
    }

    /// Appends an event.
    pub fn push(&mut self, event: FrameEvent) {
        self.events.push(event);
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when nothing happened.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Iterates over events.
    pub fn iter(&self) -> impl Iterator<Item = &FrameEvent> {
        self.events.iter()
    }

    /// Damage events as (source, defender, amount).
    pub fn damage(&self) -> impl Iterator<Item = (DamageSource, EntityId, i32)> + '_ {
        self.events.iter().filter_map(|e| match *e {
            FrameEvent::DamageDealt {
                attacker,
                defender,
                amount,
            } => Some((attacker, defender, amount)),
            _ => None,
        })
    }

    /// Entities that died this tick.
    pub fn deaths(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.events.iter().filter_map(|e| match *e {
            FrameEvent::EntityDied { entity } => Some(entity),
            _ => None,
        })
    }

    /// Boss phase changes as (boss, phase).
    pub fn phase_changes(&self) -> impl Iterator<Item = (EntityId, u8)> + '_ {
        self.events.iter().filter_map(|e| match *e {
            FrameEvent::BossPhaseChanged { boss, phase } => Some((boss, phase)),
            _ => None,
        })
    }

    /// Number of events matching a predicate.
    pub fn count(&self, predicate: impl Fn(&FrameEvent) -> bool) -> usize {
        self.events.iter().filter(|e| predicate(e)).count()
    }
}

impl IntoIterator for FrameEvents {
    type Item = FrameEvent;
    type IntoIter = std::vec::IntoIter<FrameEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_filters() {
        let player = EntityId::from_raw(1);
        let boss = EntityId::from_raw(2);
        let mut events = FrameEvents::new(7);
        events.push(FrameEvent::DamageDealt {
            attacker: DamageSource::Entity(player),
            defender: boss,
            amount: 12,
        });
        events.push(FrameEvent::BossPhaseChanged { boss, phase: 1 });
        events.push(FrameEvent::EntityDied { entity: boss });

        assert_eq!(events.len(), 3);
        assert_eq!(events.damage().collect::<Vec<_>>(), vec![(DamageSource::Entity(player), boss, 12)]);
        assert_eq!(events.phase_changes().collect::<Vec<_>>(), vec![(boss, 1)]);
        assert_eq!(events.deaths().collect::<Vec<_>>(), vec![boss]);
        assert_eq!(
            events.count(|e| matches!(e, FrameEvent::EntityDied { .. })),
            1
        );
    }

    #[test]
    fn test_events_serialize() {
        let mut events = FrameEvents::new(3);
        events.push(FrameEvent::ComboExtended {
            entity: EntityId::from_raw(1),
            index: 2,
        });
        let text = ron::to_string(&events).expect("should serialize");
        let back: FrameEvents = ron::from_str(&text).expect("should deserialize");
        assert_eq!(back, events);
    }
}
