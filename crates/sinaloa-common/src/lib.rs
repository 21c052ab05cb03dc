//! # Sinaloa Common
//!
//! Shared types for the Sinaloa brawler simulation:
//! - ID types (EntityId, HitboxId, VolumeId) and the per-level IdSequence
//! - Version information for data files
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod ids;
pub mod version;

pub use glam::Vec2;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::*;
    pub use crate::ids::*;
    pub use crate::version::*;
    pub use glam::Vec2;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_id_sequence_is_deterministic() {
        let mut a = IdSequence::new();
        let mut b = IdSequence::new();

        let ids_a: Vec<u64> = (0..4).map(|_| a.next_raw()).collect();
        let ids_b: Vec<u64> = (0..4).map(|_| b.next_raw()).collect();

        assert_eq!(ids_a, ids_b);
        assert_eq!(ids_a, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_entity_ids_never_null() {
        let mut seq = IdSequence::new();
        let id = seq.next_entity();
        assert!(id.is_valid());
        assert_ne!(id, EntityId::NULL);
    }

    #[test]
    fn test_hitbox_and_entity_ids_share_sequence() {
        let mut seq = IdSequence::new();
        let entity = seq.next_entity();
        let hitbox = seq.next_hitbox();
        assert_eq!(entity.raw() + 1, hitbox.raw());
        assert_eq!(seq.peek(), 3);
    }

    #[test]
    fn test_version_compatibility() {
        let v1 = SchemaVersion::new(1, 0, 0);
        let v2 = SchemaVersion::new(1, 1, 0);
        let v3 = SchemaVersion::new(2, 0, 0);

        // v2 can read v1 data (newer version reading older data)
        assert!(v2.is_compatible_with(&v1));
        assert!(!v1.is_compatible_with(&v2));
        // Different major versions are incompatible
        assert!(!v1.is_compatible_with(&v3));
    }

    #[test]
    fn test_check_version_reports_both_sides() {
        let err = SinaloaError::check_version(SchemaVersion::new(1, 0, 0), SchemaVersion::new(2, 0, 0))
            .expect_err("major bump must be rejected");
        assert_eq!(
            err.to_string(),
            "Schema version mismatch: expected 1.0.0, got 2.0.0"
        );
    }

    proptest! {
        #[test]
        fn prop_ids_strictly_increase_across_kinds(kinds in proptest::collection::vec(any::<bool>(), 1..200)) {
            let mut seq = IdSequence::new();
            let mut last = 0;
            for entity in kinds {
                let raw = if entity { seq.next_entity().raw() } else { seq.next_hitbox().raw() };
                prop_assert!(raw > last);
                last = raw;
            }
            prop_assert_eq!(seq.peek(), last + 1);
        }

        #[test]
        fn prop_major_version_gates_compatibility(
            major in 0u16..4,
            minor in 0u16..4,
            other_major in 0u16..4,
            other_minor in 0u16..4,
            patch in any::<u16>(),
        ) {
            let ours = SchemaVersion::new(major, minor, 0);
            let theirs = SchemaVersion::new(other_major, other_minor, patch);
            let accepted = SinaloaError::check_version(ours, theirs).is_ok();
            // Older minors of the same major load; patch never matters
            prop_assert_eq!(accepted, major == other_major && minor >= other_minor);
        }
    }
}
