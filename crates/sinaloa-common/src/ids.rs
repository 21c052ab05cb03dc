//! ID types for entities, hitboxes and level volumes.
//!
//! IDs are handed out by an [`IdSequence`] owned by each level instance, so
//! two runs of the same level with the same inputs see the same IDs.

use serde::{Deserialize, Serialize};

/// Unique identifier for an entity in a level instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates an entity ID from a raw value (for deserialization).
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Null/invalid entity ID.
    pub const NULL: Self = Self(0);

    /// Checks if this is a valid (non-null) entity ID.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of one hitbox instance.
///
/// A fresh ID is issued every time an attack (or hazard pass) starts, so
/// the same swing can hit a defender at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HitboxId(u64);

impl HitboxId {
    /// Creates a hitbox ID from a raw value.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Index of a static volume in a level's geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VolumeId(u32);

impl VolumeId {
    /// Creates a volume ID from its index in the level geometry.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the index into the geometry's volume list.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Monotonic ID source. Starts at 1 so that 0 stays the null ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdSequence {
    next: u64,
}

impl Default for IdSequence {
    fn default() -> Self {
        Self::new()
    }
}

impl IdSequence {
    /// Creates a sequence whose first value is 1.
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 1 }
    }

    /// Returns the next raw value.
    pub fn next_raw(&mut self) -> u64 {
        let value = self.next;
        self.next += 1;
        value
    }

    /// Allocates an entity ID.
    pub fn next_entity(&mut self) -> EntityId {
        EntityId(self.next_raw())
    }

    /// Allocates a hitbox instance ID.
    pub fn next_hitbox(&mut self) -> HitboxId {
        HitboxId(self.next_raw())
    }

    /// Returns the value the next allocation will use.
    #[must_use]
    pub const fn peek(&self) -> u64 {
        self.next
    }
}
