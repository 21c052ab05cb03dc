//! Level descriptors and their validation.
//!
//! A level arrives from the level-data collaborator as a RON document:
//! geometry volumes, friction/occlusion regions, an enemy spawn list,
//! hazard scripts and platforms. [`LevelDescriptor::validate`] rejects every malformed
//! case up front so that building a [`LevelInstance`] never fails halfway.
//!
//! [`LevelInstance`]: crate::simulation::LevelInstance

use serde::{Deserialize, Serialize};
use sinaloa_common::{SchemaVersion, SinaloaError, Vec2};
use thiserror::Error;
use tracing::info;

use crate::collision::{Aabb, LevelGeometry, Region, Volume, VolumeKind};
use crate::config::SimConfig;
use crate::enemy::{Archetype, ArchetypeProfile};
use crate::entity::PLAYER_SIZE;
use crate::hazard::HazardScript;
use crate::hitbox::knockback_in_range;
use crate::platform::PlatformScript;
use crate::simulation::LevelInstance;

/// Default surface friction when a level does not specify one.
pub const DEFAULT_FRICTION: f32 = 0.25;

/// Errors raised while loading a level.
#[derive(Debug, Error)]
pub enum LevelLoadError {
    /// Document could not be parsed
    #[error("Level parse error: {0}")]
    Parse(String),

    /// Document was written for an incompatible format
    #[error(transparent)]
    Version(#[from] SinaloaError),

    /// Level bounds are empty or non-finite
    #[error("Invalid level bounds: {0:?}")]
    InvalidBounds(Aabb),

    /// A geometry volume is malformed
    #[error("Volume {index} is invalid: {reason}")]
    InvalidVolume {
        /// Position in the volume list
        index: usize,
        /// What is wrong
        reason: String,
    },

    /// A friction/occlusion region is malformed
    #[error("Region {index} is invalid: {reason}")]
    InvalidRegion {
        /// Position in the region list
        index: usize,
        /// What is wrong
        reason: String,
    },

    /// Default friction outside [0, 1]
    #[error("Default friction must be in [0, 1], got {0}")]
    InvalidFriction(f32),

    /// A spawn point is unusable
    #[error("Spawn of {what} at ({x}, {y}) is invalid: {reason}")]
    InvalidSpawn {
        /// Which spawn
        what: String,
        /// Spawn x
        x: f32,
        /// Spawn y
        y: f32,
        /// What is wrong
        reason: String,
    },

    /// An enemy spawn's profile is malformed
    #[error("Enemy {index} ({archetype:?}) is invalid: {reason}")]
    InvalidEnemy {
        /// Position in the spawn list
        index: usize,
        /// Archetype of the spawn
        archetype: Archetype,
        /// What is wrong
        reason: String,
    },

    /// A hazard script is malformed
    #[error("Hazard {index} is invalid: {reason}")]
    InvalidHazard {
        /// Position in the hazard list
        index: usize,
        /// What is wrong
        reason: String,
    },

    /// A platform script is malformed
    #[error("Platform {index} is invalid: {reason}")]
    InvalidPlatform {
        /// Position in the platform list
        index: usize,
        /// What is wrong
        reason: String,
    },

    /// Simulation tuning rejected
    #[error("Invalid simulation config: {0}")]
    InvalidConfig(String),
}

/// Result type for level loading.
pub type LevelResult<T> = Result<T, LevelLoadError>;

/// One enemy in the spawn list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemySpawn {
    /// Archetype to spawn
    pub archetype: Archetype,
    /// Spawn center; also the center of its patrol route
    pub position: Vec2,
    /// Patrol route width override
    #[serde(default)]
    pub patrol_distance: Option<f32>,
}

impl EnemySpawn {
    /// Built-in profile with this spawn's overrides applied.
    #[must_use]
    pub fn profile(&self) -> ArchetypeProfile {
        let mut profile = ArchetypeProfile::for_archetype(self.archetype);
        if let Some(distance) = self.patrol_distance {
            profile.patrol_distance = distance;
        }
        profile
    }
}

fn default_friction() -> f32 {
    DEFAULT_FRICTION
}

/// Everything needed to build a level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelDescriptor {
    /// Format version
    #[serde(default)]
    pub version: SchemaVersion,
    /// Display name
    pub name: String,
    /// Playable area; leaving it through the bottom is a fall
    pub bounds: Aabb,
    /// Player spawn center
    pub player_spawn: Vec2,
    /// Friction outside every region
    #[serde(default = "default_friction")]
    pub default_friction: f32,
    /// Static geometry
    #[serde(default)]
    pub volumes: Vec<Volume>,
    /// Friction and occlusion regions
    #[serde(default)]
    pub regions: Vec<Region>,
    /// Enemy spawn list
    #[serde(default)]
    pub enemies: Vec<EnemySpawn>,
    /// Scripted moving hazards
    #[serde(default)]
    pub hazards: Vec<HazardScript>,
    /// Moving and crumbling platforms
    #[serde(default)]
    pub platforms: Vec<PlatformScript>,
}

impl LevelDescriptor {
    /// Parses a RON document.
    pub fn from_ron_str(text: &str) -> LevelResult<Self> {
        ron::from_str(text).map_err(|e| LevelLoadError::Parse(e.to_string()))
    }

    /// Serializes to pretty RON.
    pub fn to_ron_string(&self) -> LevelResult<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| LevelLoadError::Parse(e.to_string()))
    }

    /// Builds the static geometry.
    #[must_use]
    pub fn geometry(&self) -> LevelGeometry {
        LevelGeometry::new(self.bounds, self.volumes.clone(), self.regions.clone(), self.default_friction)
    }

    /// Checks every part of the descriptor. Fails on the first problem.
    pub fn validate(&self) -> LevelResult<()> {
        SinaloaError::check_version(SchemaVersion::LEVEL_FORMAT, self.version)?;

        if !self.bounds.is_finite() || self.bounds.is_degenerate() {
            return Err(LevelLoadError::InvalidBounds(self.bounds));
        }
        if !(0.0..=1.0).contains(&self.default_friction) {
            return Err(LevelLoadError::InvalidFriction(self.default_friction));
        }

        for (index, volume) in self.volumes.iter().enumerate() {
            let reason = if !volume.bounds.is_finite() {
                Some("bounds are not finite".to_string())
            } else if volume.bounds.is_degenerate() {
                Some("bounds have zero area".to_string())
            } else {
                match volume.kind {
                    VolumeKind::Hazard { damage, knockback } if damage < 0 || !knockback_in_range(knockback) => {
                        Some(format!("hazard damage {damage} or knockback {knockback:?} out of range"))
                    },
                    VolumeKind::Lava { damage, interval_ticks } if damage < 0 || interval_ticks == 0 => {
                        Some(format!("lava damage {damage} or interval {interval_ticks} out of range"))
                    },
                    _ => None,
                }
            };
            if let Some(reason) = reason {
                return Err(LevelLoadError::InvalidVolume { index, reason });
            }
        }

        for (index, region) in self.regions.iter().enumerate() {
            let reason = if !region.bounds.is_finite() || region.bounds.is_degenerate() {
                Some("bounds are empty or not finite".to_string())
            } else if !(0.0..=1.0).contains(&region.friction) {
                Some(format!("friction must be in [0, 1], got {}", region.friction))
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(LevelLoadError::InvalidRegion { index, reason });
            }
        }

        let geometry = self.geometry();
        check_spawn(&geometry, "player", self.player_spawn, PLAYER_SIZE)?;

        for (index, spawn) in self.enemies.iter().enumerate() {
            let profile = spawn.profile();
            profile.validate().map_err(|reason| LevelLoadError::InvalidEnemy {
                index,
                archetype: spawn.archetype,
                reason,
            })?;
            check_spawn(&geometry, &format!("enemy {index}"), spawn.position, profile.size)?;
        }

        for (index, script) in self.hazards.iter().enumerate() {
            script
                .validate()
                .map_err(|reason| LevelLoadError::InvalidHazard { index, reason })?;
        }

        for (index, script) in self.platforms.iter().enumerate() {
            script
                .validate()
                .map_err(|reason| LevelLoadError::InvalidPlatform { index, reason })?;
        }
        Ok(())
    }
}

fn check_spawn(geometry: &LevelGeometry, what: &str, position: Vec2, size: Vec2) -> LevelResult<()> {
    let fail = |reason: &str| LevelLoadError::InvalidSpawn {
        what: what.to_string(),
        x: position.x,
        y: position.y,
        reason: reason.to_string(),
    };
    if !position.is_finite() {
        return Err(fail("position is not finite"));
    }
    if !geometry.bounds().contains_point(position) {
        return Err(fail("outside the level bounds"));
    }
    if geometry.overlaps_solid(&Aabb::from_center(position, size / 2.0)) {
        return Err(fail("inside solid geometry"));
    }
    Ok(())
}

/// Validates a descriptor and builds a ready-to-tick level.
pub fn load_level(descriptor: &LevelDescriptor, config: SimConfig) -> LevelResult<LevelInstance> {
    descriptor.validate()?;
    config.validate().map_err(|e| LevelLoadError::InvalidConfig(e.to_string()))?;
    let level = LevelInstance::build(descriptor, config);
    info!(
        "Loaded level '{}': {} volumes, {} regions, {} enemies, {} hazards, {} platforms",
        descriptor.name,
        descriptor.volumes.len(),
        descriptor.regions.len(),
        descriptor.enemies.len(),
        descriptor.hazards.len(),
        descriptor.platforms.len()
    );
    Ok(level)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::hitbox::MAX_KNOCKBACK;

    pub(crate) const ARENA_RON: &str = r#"
(
    name: "Mercado",
    bounds: (min_x: 0.0, min_y: 0.0, max_x: 800.0, max_y: 400.0),
    player_spawn: (100.0, 188.0),
    volumes: [
        (kind: solid, bounds: (min_x: 0.0, min_y: 200.0, max_x: 800.0, max_y: 240.0)),
        (kind: one_way, bounds: (min_x: 300.0, min_y: 140.0, max_x: 380.0, max_y: 144.0)),
        (kind: hazard(damage: 5, knockback: (80.0, -120.0)), bounds: (min_x: 600.0, min_y: 190.0, max_x: 620.0, max_y: 200.0)),
    ],
    regions: [
        (bounds: (min_x: 400.0, min_y: 100.0, max_x: 600.0, max_y: 220.0), friction: 0.02, occlusion: always),
    ],
    enemies: [
        (archetype: maton, position: (500.0, 192.0)),
        (archetype: security_drone, position: (300.0, 80.0), patrol_distance: Some(200.0)),
    ],
    hazards: [
        periodic(
            start: (0.0, 180.0),
            end: (800.0, 180.0),
            size: (60.0, 30.0),
            speed: 480.0,
            interval_ticks: 600,
            warning_ticks: 120,
            damage: 25,
            knockback: (200.0, -150.0),
        ),
    ],
)
"#;

    #[test]
    fn test_parse_and_validate() {
        let level = LevelDescriptor::from_ron_str(ARENA_RON).expect("should parse");
        assert_eq!(level.name, "Mercado");
        assert_eq!(level.version, SchemaVersion::LEVEL_FORMAT);
        assert!((level.default_friction - DEFAULT_FRICTION).abs() < f32::EPSILON);
        assert_eq!(level.volumes.len(), 3);
        assert_eq!(level.enemies[1].patrol_distance, Some(200.0));
        assert!(level.validate().is_ok());
    }

    #[test]
    fn test_ron_round_trip() {
        let level = LevelDescriptor::from_ron_str(ARENA_RON).expect("should parse");
        let text = level.to_ron_string().expect("should serialize");
        let back = LevelDescriptor::from_ron_str(&text).expect("should reparse");
        assert_eq!(back, level);
    }

    #[test]
    fn test_rejects_malformed_text() {
        assert!(matches!(
            LevelDescriptor::from_ron_str("(name: 3)"),
            Err(LevelLoadError::Parse(_))
        ));
    }

    #[test]
    fn test_rejects_bad_data() {
        let base = LevelDescriptor::from_ron_str(ARENA_RON).expect("should parse");

        let mut level = base.clone();
        level.volumes[0].bounds = Aabb::new(10.0, 10.0, 10.0, 50.0);
        assert!(matches!(level.validate(), Err(LevelLoadError::InvalidVolume { index: 0, .. })));

        let mut level = base.clone();
        level.regions[0].friction = 1.5;
        assert!(matches!(level.validate(), Err(LevelLoadError::InvalidRegion { index: 0, .. })));

        let mut level = base.clone();
        level.player_spawn = Vec2::new(100.0, 220.0);
        assert!(matches!(level.validate(), Err(LevelLoadError::InvalidSpawn { .. })));

        let mut level = base.clone();
        level.enemies[0].position = Vec2::new(5_000.0, 0.0);
        assert!(matches!(level.validate(), Err(LevelLoadError::InvalidSpawn { .. })));

        let mut level = base.clone();
        level.enemies[0].patrol_distance = Some(-1.0);
        assert!(matches!(level.validate(), Err(LevelLoadError::InvalidEnemy { index: 0, .. })));

        let mut level = base.clone();
        level.hazards.push(HazardScript::Waypoints {
            points: Vec::new(),
            size: Vec2::new(4.0, 4.0),
            speed: 10.0,
            damage: 1,
            knockback: Vec2::ZERO,
        });
        assert!(matches!(level.validate(), Err(LevelLoadError::InvalidHazard { index: 1, .. })));

        let mut level = base.clone();
        level.default_friction = -0.1;
        assert!(matches!(level.validate(), Err(LevelLoadError::InvalidFriction(_))));

        let mut level = base;
        level.version = SchemaVersion::new(2, 0, 0);
        assert!(matches!(level.validate(), Err(LevelLoadError::Version(_))));
    }

    #[test]
    fn test_rejects_runaway_knockback() {
        let base = LevelDescriptor::from_ron_str(ARENA_RON).expect("should parse");

        let mut level = base.clone();
        level.volumes[2].kind = VolumeKind::Hazard {
            damage: 1,
            knockback: Vec2::new(1.0e12, 0.0),
        };
        assert!(matches!(level.validate(), Err(LevelLoadError::InvalidVolume { index: 2, .. })));

        let mut level = base.clone();
        if let HazardScript::Periodic { knockback, .. } = &mut level.hazards[0] {
            *knockback = Vec2::new(0.0, -(MAX_KNOCKBACK + 1.0));
        }
        assert!(matches!(level.validate(), Err(LevelLoadError::InvalidHazard { index: 0, .. })));

        let mut level = base;
        level.volumes[2].kind = VolumeKind::Hazard {
            damage: 1,
            knockback: Vec2::new(MAX_KNOCKBACK, 0.0),
        };
        assert!(level.validate().is_ok());
    }

    #[test]
    fn test_platforms_and_lava_parse() {
        let text = ARENA_RON.replacen(
            "    hazards: [",
            r#"    platforms: [
        moving(points: [(200.0, 120.0), (260.0, 120.0)], size: (48.0, 8.0), speed: 50.0),
        crumbling(position: (450.0, 150.0), size: (40.0, 8.0)),
    ],
    hazards: ["#,
            1,
        );
        let mut level = LevelDescriptor::from_ron_str(&text).expect("should parse");
        assert_eq!(level.platforms.len(), 2);
        assert!(matches!(
            level.platforms[1],
            PlatformScript::Crumbling {
                crumble_ticks: 60,
                gone_ticks: 180,
                regrow_ticks: 30,
                ..
            }
        ));
        assert!(level.validate().is_ok());

        level.volumes.push(Volume::lava(Aabb::new(620.0, 190.0, 700.0, 200.0), 3, 0));
        assert!(matches!(level.validate(), Err(LevelLoadError::InvalidVolume { index: 3, .. })));
        level.volumes.pop();

        level.platforms[0] = PlatformScript::Moving {
            points: vec![Vec2::new(200.0, 120.0)],
            size: Vec2::new(48.0, 8.0),
            speed: 50.0,
        };
        assert!(matches!(level.validate(), Err(LevelLoadError::InvalidPlatform { index: 0, .. })));
    }

    #[test]
    fn test_load_level_builds_instance() {
        let descriptor = LevelDescriptor::from_ron_str(ARENA_RON).expect("should parse");
        let level = load_level(&descriptor, SimConfig::default()).expect("should load");
        // Player, two enemies, one hazard
        assert_eq!(level.entity_count(), 4);
    }

    #[test]
    fn test_load_level_rejects_bad_config() {
        let descriptor = LevelDescriptor::from_ron_str(ARENA_RON).expect("should parse");
        let mut config = SimConfig::default();
        config.fixed_dt = 0.0;
        assert!(matches!(
            load_level(&descriptor, config),
            Err(LevelLoadError::InvalidConfig(_))
        ));
    }
}
