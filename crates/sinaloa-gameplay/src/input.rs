//! Per-tick input snapshot.
//!
//! The simulation never talks to a device. The host samples whatever input
//! source it has once per tick and hands the result over as an
//! [`InputSnapshot`]: one [`ButtonState`] per logical [`Action`].

use serde::{Deserialize, Serialize};

/// Logical actions the player can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Walk left
    MoveLeft,
    /// Walk right
    MoveRight,
    /// Drop through a one-way platform
    MoveDown,
    /// Jump / double jump
    Jump,
    /// Light attack (chains into the combo)
    LightAttack,
    /// Heavy attack
    HeavyAttack,
    /// Dodge roll
    Roll,
    /// Parry
    Parry,
    /// Toggle pause (handled by the host, see `PauseGate`)
    Pause,
}

impl Action {
    /// Number of actions.
    pub const COUNT: usize = 9;

    /// All actions in declaration order.
    #[must_use]
    pub const fn all() -> [Action; Self::COUNT] {
        [
            Action::MoveLeft,
            Action::MoveRight,
            Action::MoveDown,
            Action::Jump,
            Action::LightAttack,
            Action::HeavyAttack,
            Action::Roll,
            Action::Parry,
            Action::Pause,
        ]
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// Edge and level state of one action for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonState {
    /// Went down this tick
    pub pressed: bool,
    /// Is down this tick
    pub held: bool,
    /// Went up this tick
    pub released: bool,
}

impl ButtonState {
    /// State for a button that went down this tick.
    pub const PRESSED: Self = Self {
        pressed: true,
        held: true,
        released: false,
    };

    /// State for a button that is being held.
    pub const HELD: Self = Self {
        pressed: false,
        held: true,
        released: false,
    };

    /// State for a button that went up this tick.
    pub const RELEASED: Self = Self {
        pressed: false,
        held: false,
        released: true,
    };

    /// Derives edges from the previous and current level.
    #[must_use]
    pub const fn from_levels(was_down: bool, is_down: bool) -> Self {
        Self {
            pressed: is_down && !was_down,
            held: is_down,
            released: was_down && !is_down,
        }
    }
}

/// Immutable view of all actions for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSnapshot {
    buttons: [ButtonState; Action::COUNT],
}

impl InputSnapshot {
    /// Snapshot with every action idle.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buttons: [ButtonState {
                pressed: false,
                held: false,
                released: false,
            }; Action::COUNT],
        }
    }

    /// Builds a snapshot from the sets of actions held on the previous and
    /// current tick.
    #[must_use]
    pub fn from_held(previous: &[Action], current: &[Action]) -> Self {
        let mut snapshot = Self::new();
        for action in Action::all() {
            let was = previous.contains(&action);
            let is = current.contains(&action);
            snapshot.buttons[action.index()] = ButtonState::from_levels(was, is);
        }
        snapshot
    }

    /// Marks `action` as pressed this tick.
    #[must_use]
    pub fn press(mut self, action: Action) -> Self {
        self.buttons[action.index()] = ButtonState::PRESSED;
        self
    }

    /// Marks `action` as held (no edge).
    #[must_use]
    pub fn hold(mut self, action: Action) -> Self {
        self.buttons[action.index()] = ButtonState::HELD;
        self
    }

    /// Marks `action` as released this tick.
    #[must_use]
    pub fn release(mut self, action: Action) -> Self {
        self.buttons[action.index()] = ButtonState::RELEASED;
        self
    }

    /// Full state of one action.
    #[must_use]
    pub const fn button(&self, action: Action) -> ButtonState {
        self.buttons[action.index()]
    }

    /// Whether `action` went down this tick.
    #[must_use]
    pub const fn pressed(&self, action: Action) -> bool {
        self.buttons[action.index()].pressed
    }

    /// Whether `action` is down this tick.
    #[must_use]
    pub const fn held(&self, action: Action) -> bool {
        self.buttons[action.index()].held
    }

    /// Whether `action` went up this tick.
    #[must_use]
    pub const fn released(&self, action: Action) -> bool {
        self.buttons[action.index()].released
    }

    /// Horizontal intent: -1 (left), 0, or 1 (right).
    #[must_use]
    pub fn horizontal_axis(&self) -> f32 {
        let left = self.held(Action::MoveLeft);
        let right = self.held(Action::MoveRight);
        match (left, right) {
            (true, false) => -1.0,
            (false, true) => 1.0,
            _ => 0.0,
        }
    }

    /// Actions currently held, in declaration order.
    #[must_use]
    pub fn held_actions(&self) -> Vec<Action> {
        Action::all()
            .into_iter()
            .filter(|a| self.held(*a))
            .collect()
    }
}
