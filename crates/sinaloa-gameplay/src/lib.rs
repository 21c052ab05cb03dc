//! # Sinaloa Gameplay
//!
//! Deterministic simulation core of the Sinaloa brawler.
//!
//! This crate provides:
//! - Per-frame input snapshots
//! - AABB collision against static level volumes (solid, one-way, hazard, lava)
//!   and friction regions
//! - Player movement (run, variable jump, double jump, drop-through)
//! - The player combat state machine (light combo, heavy, roll, parry)
//! - Hitbox/hurtbox resolution with a per-hitbox hit ledger
//! - Enemy archetypes, projectiles, scripted hazards and the boss
//! - Moving and crumbling platforms
//! - Level loading from RON descriptors
//! - Per-tick event batches and read-only world snapshots
//!
//! ## Determinism
//!
//! A [`LevelInstance`] never reads a clock or a random source. Entities are
//! always updated in ascending id order, and ids come from a per-level
//! sequence, so the same level fed the same inputs yields the same
//! snapshots.
//!
//! ## Collaborators
//!
//! Render, audio and UI code reads [`WorldSnapshot`] and [`FrameEvents`]
//! after each tick. None of them mutate the simulation.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod boss;
pub mod collision;
pub mod combat;
pub mod config;
pub mod damage;
pub mod enemy;
pub mod entity;
pub mod events;
pub mod hazard;
pub mod hitbox;
pub mod input;
pub mod level;
pub mod pause;
pub mod physics;
pub mod platform;
pub mod projectile;
pub mod simulation;
pub mod snapshot;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::boss::*;
    pub use crate::collision::*;
    pub use crate::combat::*;
    pub use crate::config::*;
    pub use crate::damage::*;
    pub use crate::enemy::*;
    pub use crate::entity::*;
    pub use crate::events::*;
    pub use crate::hazard::*;
    pub use crate::hitbox::*;
    pub use crate::input::*;
    pub use crate::level::*;
    pub use crate::pause::*;
    pub use crate::physics::*;
    pub use crate::platform::*;
    pub use crate::projectile::*;
    pub use crate::simulation::*;
    pub use crate::snapshot::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_archetype_profile_is_valid() {
        for archetype in Archetype::all() {
            let profile = ArchetypeProfile::for_archetype(archetype);
            assert!(profile.validate().is_ok(), "{archetype:?} profile invalid");
            assert_eq!(profile.archetype, archetype);
        }
    }

    #[test]
    fn test_default_config_matches_reference_rate() {
        let config = SimConfig::default();
        assert!((config.fixed_dt * REFERENCE_HZ - 1.0).abs() < 1e-6);
    }
}
