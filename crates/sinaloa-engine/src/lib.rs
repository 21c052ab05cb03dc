//! # Sinaloa Engine
//!
//! Headless host for the Sinaloa simulation.
//!
//! This crate ties the gameplay core to the outside world:
//! - Engine configuration loaded from TOML
//! - Replay files holding recorded per-frame input
//! - A replay runner that tallies events and hashes the final state
//!
//! The `sinaloa` binary loads a level and a replay and prints the run
//! summary as JSON.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod replay;
pub mod runner;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::*;
    pub use crate::replay::*;
    pub use crate::runner::*;
}

pub use prelude::*;
