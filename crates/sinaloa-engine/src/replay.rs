//! Recorded input sequences.
//!
//! A replay stores the set of actions held on every frame. Edges (pressed,
//! released) are rebuilt from consecutive frames, so a replay always
//! reproduces exactly the snapshots the simulation saw.

use serde::{Deserialize, Serialize};
use sinaloa_common::{SchemaVersion, SinaloaError};
use sinaloa_gameplay::{Action, InputSnapshot, LevelLoadError};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Errors raised while loading or running replays.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// File could not be read or written
    #[error("Replay IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid replay JSON
    #[error("Replay JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Replay was written by an incompatible build
    #[error(transparent)]
    Version(#[from] SinaloaError),

    /// Step length is unusable
    #[error("Invalid replay step length: {0}")]
    InvalidStep(f32),

    /// Level failed to load
    #[error("Level error: {0}")]
    Level(#[from] LevelLoadError),

    /// Two runs of the same replay diverged
    #[error("Replay is not deterministic: state hash {first:#018x} then {second:#018x}")]
    Nondeterministic {
        /// Hash of the first run
        first: u64,
        /// Hash of the second run
        second: u64,
    },
}

/// Result type for replay operations.
pub type ReplayResult<T> = Result<T, ReplayError>;

/// Actions held during one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayFrame {
    /// Held actions
    #[serde(default)]
    pub held: Vec<Action>,
}

/// A recorded input sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayFile {
    /// Format version
    pub version: SchemaVersion,
    /// Step length the replay was recorded at
    pub fixed_dt: f32,
    /// One entry per frame
    pub frames: Vec<ReplayFrame>,
}

impl ReplayFile {
    /// Empty replay at `fixed_dt`.
    #[must_use]
    pub fn new(fixed_dt: f32) -> Self {
        Self {
            version: SchemaVersion::REPLAY_FORMAT,
            fixed_dt,
            frames: Vec::new(),
        }
    }

    /// Appends a frame.
    pub fn push(&mut self, held: &[Action]) {
        self.frames.push(ReplayFrame { held: held.to_vec() });
    }

    /// Appends `count` identical frames.
    pub fn push_repeated(&mut self, held: &[Action], count: usize) {
        for _ in 0..count {
            self.push(held);
        }
    }

    /// Number of frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Check if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Checks version and step length.
    pub fn validate(&self) -> ReplayResult<()> {
        SinaloaError::check_version(SchemaVersion::REPLAY_FORMAT, self.version)?;
        if !self.fixed_dt.is_finite() || self.fixed_dt <= 0.0 {
            return Err(ReplayError::InvalidStep(self.fixed_dt));
        }
        Ok(())
    }

    /// Parses and validates replay JSON.
    pub fn from_json_str(text: &str) -> ReplayResult<Self> {
        let replay: Self = serde_json::from_str(text)?;
        replay.validate()?;
        Ok(replay)
    }

    /// Serializes to pretty JSON.
    pub fn to_json_string(&self) -> ReplayResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Loads a replay file.
    pub fn load<P: AsRef<Path>>(path: P) -> ReplayResult<Self> {
        let path = path.as_ref();
        let replay = Self::from_json_str(&fs::read_to_string(path)?)?;
        info!("Loaded replay from {} ({} frames)", path.display(), replay.len());
        Ok(replay)
    }

    /// Writes a replay file, creating parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> ReplayResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json_string()?)?;
        info!("Saved replay to {}", path.display());
        Ok(())
    }

    /// Per-frame input snapshots, with edges taken from the previous frame.
    #[must_use]
    pub fn inputs(&self) -> Vec<InputSnapshot> {
        let mut previous: &[Action] = &[];
        self.frames
            .iter()
            .map(|frame| {
                let input = InputSnapshot::from_held(previous, &frame.held);
                previous = &frame.held;
                input
            })
            .collect()
    }
}
