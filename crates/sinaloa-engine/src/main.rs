//! # Sinaloa
//!
//! Runs a level against a recorded replay without rendering.
//!
//! Usage: `sinaloa <level.ron> <replay.json> [config.toml]`

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

use anyhow::{bail, Context, Result};
use sinaloa_engine::{run_replay, EngineConfig, ReplayFile};
use sinaloa_gameplay::LevelDescriptor;
use std::fs;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Main entry point.
fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 || args.len() > 3 {
        bail!("usage: sinaloa <level.ron> <replay.json> [config.toml]");
    }

    let config = args.get(2).map_or_else(EngineConfig::default, EngineConfig::load_from);

    // RUST_LOG wins over the config file
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_filter))?;
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    info!("Sinaloa starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let level_text = fs::read_to_string(&args[0]).with_context(|| format!("reading level {}", args[0]))?;
    let level = LevelDescriptor::from_ron_str(&level_text).with_context(|| format!("parsing level {}", args[0]))?;
    let replay = ReplayFile::load(&args[1]).with_context(|| format!("loading replay {}", args[1]))?;

    let summary = run_replay(&level, &replay, &config)?;
    info!(
        "Ran {} ticks of '{}': {:?}, state hash {:#018x}",
        summary.ticks_run, level.name, summary.outcome, summary.state_hash
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
