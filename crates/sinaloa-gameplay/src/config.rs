//! Simulation tuning.
//!
//! Groups movement and combat tuning with the fixed step length. Every
//! field has a default, so a TOML document only needs the values it
//! changes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::combat::CombatTuning;
use crate::physics::{MovementConfig, REFERENCE_HZ};

/// Errors raised while reading or validating tuning.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// TOML could not be parsed
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML could not be written
    #[error("Config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is out of range
    #[error("Invalid {section} config: {reason}")]
    Invalid {
        /// Table the value belongs to
        section: &'static str,
        /// What is wrong
        reason: String,
    },
}

/// Result type for config operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Complete simulation tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed step length in seconds
    pub fixed_dt: f32,
    /// Damage taken when falling out of the level
    pub fall_damage: i32,
    /// Player movement
    pub movement: MovementConfig,
    /// Combat timing and attack data
    pub combat: CombatTuning,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / REFERENCE_HZ,
            fall_damage: 10,
            movement: MovementConfig::default(),
            combat: CombatTuning::default(),
        }
    }
}

impl SimConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes to pretty TOML.
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks every section.
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.fixed_dt.is_finite() || self.fixed_dt <= 0.0 || self.fixed_dt > 0.1 {
            return Err(ConfigError::Invalid {
                section: "simulation",
                reason: format!("fixed_dt must be in (0, 0.1], got {}", self.fixed_dt),
            });
        }
        if self.fall_damage < 0 {
            return Err(ConfigError::Invalid {
                section: "simulation",
                reason: format!("fall_damage must be non-negative, got {}", self.fall_damage),
            });
        }
        self.movement
            .validate()
            .map_err(|reason| ConfigError::Invalid {
                section: "movement",
                reason,
            })?;
        self.combat.validate().map_err(|reason| ConfigError::Invalid {
            section: "combat",
            reason,
        })
    }
}
