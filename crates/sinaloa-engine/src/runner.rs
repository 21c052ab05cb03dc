//! Headless replay runner.
//!
//! Feeds a replay through the pause gate into a freshly loaded level and
//! tallies what happened. The final snapshot is reduced to a hash so two
//! runs can be compared without keeping both worlds around.

use serde::{Deserialize, Serialize};
use sinaloa_gameplay::{
    EntitySnapshot, FrameEvent, LevelDescriptor, LevelInstance, LevelOutcome, PauseGate, WorldSnapshot,
};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::replay::{ReplayError, ReplayFile, ReplayResult};

/// What a replay run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Simulation ticks executed
    pub ticks_run: u64,
    /// Frames skipped while paused
    pub paused_frames: u64,
    /// `DamageDealt` events
    pub damage_events: u32,
    /// `EntityDied` events
    pub deaths: u32,
    /// `BossPhaseChanged` events
    pub phase_changes: u32,
    /// `ParrySucceeded` events
    pub parries: u32,
    /// Outcome after the last tick
    pub outcome: LevelOutcome,
    /// Hash of the final world snapshot
    pub state_hash: u64,
}

/// Runs `replay` on a fresh instance of `level`.
///
/// With `verify_determinism` set the replay runs twice and both final
/// state hashes must match.
pub fn run_replay(level: &LevelDescriptor, replay: &ReplayFile, config: &EngineConfig) -> ReplayResult<RunSummary> {
    replay.validate()?;
    if (replay.fixed_dt - config.gameplay.fixed_dt).abs() > f32::EPSILON {
        warn!(
            "Replay recorded at dt {} but config uses {}; replaying at the recorded step",
            replay.fixed_dt, config.gameplay.fixed_dt
        );
    }

    let summary = run_once(level, replay, config)?;
    if config.verify_determinism {
        let second = run_once(level, replay, config)?;
        if second.state_hash != summary.state_hash {
            return Err(ReplayError::Nondeterministic {
                first: summary.state_hash,
                second: second.state_hash,
            });
        }
        info!("Determinism verified: {:#018x}", summary.state_hash);
    }
    Ok(summary)
}

fn run_once(level: &LevelDescriptor, replay: &ReplayFile, config: &EngineConfig) -> ReplayResult<RunSummary> {
    let mut instance = LevelInstance::load(level, config.gameplay.clone())?;
    let mut gate = PauseGate::new();
    let mut summary = RunSummary {
        ticks_run: 0,
        paused_frames: 0,
        damage_events: 0,
        deaths: 0,
        phase_changes: 0,
        parries: 0,
        outcome: LevelOutcome::InProgress,
        state_hash: 0,
    };

    for (frame, input) in replay.inputs().iter().enumerate() {
        if config.max_ticks > 0 && frame as u64 >= config.max_ticks {
            debug!("Stopping at max_ticks {}", config.max_ticks);
            break;
        }
        if !gate.admit(input) {
            continue;
        }

        let events = instance.tick(input, replay.fixed_dt);
        summary.ticks_run += 1;
        for event in events.iter() {
            match event {
                FrameEvent::DamageDealt { .. } => summary.damage_events += 1,
                FrameEvent::EntityDied { .. } => summary.deaths += 1,
                FrameEvent::BossPhaseChanged { .. } => summary.phase_changes += 1,
                FrameEvent::ParrySucceeded { .. } => summary.parries += 1,
                _ => {},
            }
        }
        if instance.outcome().is_over() {
            info!("Level over after {} ticks: {:?}", summary.ticks_run, instance.outcome());
            break;
        }
    }

    summary.paused_frames = gate.paused_frames();
    summary.outcome = instance.outcome();
    summary.state_hash = state_hash(&instance.snapshot());
    Ok(summary)
}

/// Hashes a snapshot, comparing floats by their exact bit patterns.
#[must_use]
pub fn state_hash(snapshot: &WorldSnapshot) -> u64 {
    let mut hasher = DefaultHasher::new();
    snapshot.version.hash(&mut hasher);
    snapshot.tick.hash(&mut hasher);
    snapshot.outcome.hash(&mut hasher);
    for entity in &snapshot.entities {
        hash_entity(entity, &mut hasher);
    }
    hasher.finish()
}

fn hash_entity(entity: &EntitySnapshot, hasher: &mut impl Hasher) {
    entity.id.hash(hasher);
    entity.kind.hash(hasher);
    entity.team.hash(hasher);
    for value in [
        entity.position.x,
        entity.position.y,
        entity.velocity.x,
        entity.velocity.y,
        entity.facing,
    ] {
        value.to_bits().hash(hasher);
    }
    entity.grounded.hash(hasher);
    entity.health.hash(hasher);
    entity.max_health.hash(hasher);
    entity.invincibility.hash(hasher);
    entity.state.hash(hasher);
    entity.boss_phase.hash(hasher);
}
