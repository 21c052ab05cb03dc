//! Pause state handling.
//!
//! The host asks the [`PauseGate`] before each tick. While paused it simply
//! does not call `tick`, so every simulation timer stays exactly where it
//! was. Only whole paused frames are counted; no wall-clock time is used.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::input::{Action, InputSnapshot};

/// Why the simulation is paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PauseReason {
    /// Not paused
    #[default]
    NotPaused,
    /// Paused by the player's pause action
    PlayerPaused,
    /// Paused by the host (focus loss, menus, loading)
    Host,
}

impl PauseReason {
    /// Check if actually paused.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        !matches!(self, Self::NotPaused)
    }
}

/// Decides, frame by frame, whether the simulation should tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseGate {
    reason: PauseReason,
    paused_frames: u64,
    pause_count: u32,
}

impl PauseGate {
    /// Creates an unpaused gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current pause reason.
    #[must_use]
    pub const fn reason(&self) -> PauseReason {
        self.reason
    }

    /// Check if paused.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.reason.is_paused()
    }

    /// Frames spent paused so far.
    #[must_use]
    pub const fn paused_frames(&self) -> u64 {
        self.paused_frames
    }

    /// Number of times the simulation was paused.
    #[must_use]
    pub const fn pause_count(&self) -> u32 {
        self.pause_count
    }

    /// Feeds one frame of input. Returns true when the simulation should
    /// tick this frame.
    ///
    /// A `Pause` press toggles the player pause. A host pause is not lifted
    /// by the pause button.
    pub fn admit(&mut self, input: &InputSnapshot) -> bool {
        if input.pressed(Action::Pause) {
            match self.reason {
                PauseReason::NotPaused => self.pause(PauseReason::PlayerPaused),
                PauseReason::PlayerPaused => self.resume(),
                PauseReason::Host => {},
            }
        }
        if self.is_paused() {
            self.paused_frames += 1;
            false
        } else {
            true
        }
    }

    /// Pauses for a reason. No effect if already paused.
    pub fn pause(&mut self, reason: PauseReason) {
        if self.is_paused() || !reason.is_paused() {
            return;
        }
        info!("Simulation paused: {:?}", reason);
        self.reason = reason;
        self.pause_count += 1;
    }

    /// Resumes from any pause.
    pub fn resume(&mut self) {
        if self.is_paused() {
            info!("Simulation resumed after {} paused frames", self.paused_frames);
            self.reason = PauseReason::NotPaused;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pause_press() -> InputSnapshot {
        InputSnapshot::new().press(Action::Pause)
    }

    #[test]
    fn test_pause_toggles() {
        let mut gate = PauseGate::new();
        assert!(gate.admit(&InputSnapshot::new()));

        assert!(!gate.admit(&pause_press()));
        assert!(gate.is_paused());
        assert!(!gate.admit(&InputSnapshot::new()));
        assert!(!gate.admit(&InputSnapshot::new().hold(Action::Pause)));

        assert!(gate.admit(&pause_press()));
        assert!(!gate.is_paused());
        assert_eq!(gate.paused_frames(), 3);
        assert_eq!(gate.pause_count(), 1);
    }

    #[test]
    fn test_host_pause_ignores_button() {
        let mut gate = PauseGate::new();
        gate.pause(PauseReason::Host);
        assert!(!gate.admit(&pause_press()));
        assert_eq!(gate.reason(), PauseReason::Host);

        gate.resume();
        assert!(gate.admit(&InputSnapshot::new()));
    }

    #[test]
    fn test_double_pause_counts_once() {
        let mut gate = PauseGate::new();
        gate.pause(PauseReason::Host);
        gate.pause(PauseReason::PlayerPaused);
        assert_eq!(gate.pause_count(), 1);
        assert_eq!(gate.reason(), PauseReason::Host);
    }
}
