//! Deterministic hashing used for stable component ids and archetype hashes.
//!
//! Both hashers are seeded with fixed keys, so equal inputs produce equal
//! outputs for every run of the same build.

use crate::component::ComponentId;
use crate::config::MAX_INLINE_COMPONENTS;
use ahash::RandomState;
use smallvec::SmallVec;
use std::hash::{BuildHasher, Hasher};

const NAME_SEEDS: [u64; 4] = [
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
];

const SET_SEEDS: [u64; 4] = [
    0x4528_21e6_38d0_1377,
    0xbe54_66cf_34e9_0c6c,
    0xc0ac_29b7_c97c_50dd,
    0x3f84_d5b5_b547_0917,
];

fn state(seeds: [u64; 4]) -> RandomState {
    RandomState::with_seeds(seeds[0], seeds[1], seeds[2], seeds[3])
}

/// Hashes a declared component name into a 64-bit stable id.
pub fn hash_str(name: &str) -> u64 {
    let mut hasher = state(NAME_SEEDS).build_hasher();
    hasher.write(name.as_bytes());
    hasher.finish()
}

/// Hashes a canonical (sorted, duplicate-free) component id list.
///
/// Callers canonicalize first; the hash itself is order-sensitive.
pub fn hash_component_ids(ids: &[ComponentId]) -> u64 {
    let mut bytes: SmallVec<[u8; 4 * (MAX_INLINE_COMPONENTS + 1)]> = SmallVec::new();
    bytes.extend_from_slice(&(ids.len() as u32).to_le_bytes());
    for id in ids {
        bytes.extend_from_slice(&id.get().to_le_bytes());
    }

    let mut hasher = state(SET_SEEDS).build_hasher();
    hasher.write(&bytes);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_hash_is_deterministic() {
        assert_eq!(hash_str("game::Position"), hash_str("game::Position"));
        assert_ne!(hash_str("game::Position"), hash_str("game::Velocity"));
    }

    #[test]
    fn empty_set_differs_from_singletons() {
        let empty = hash_component_ids(&[]);
        let one = hash_component_ids(&[ComponentId::new(1)]);
        assert_ne!(empty, one);
    }

    #[test]
    fn distinct_sets_hash_apart() {
        let sets: [&[ComponentId]; 5] = [
            &[],
            &[ComponentId::new(1)],
            &[ComponentId::new(2)],
            &[ComponentId::new(1), ComponentId::new(2)],
            &[ComponentId::new(3), ComponentId::new(7), ComponentId::new(9)],
        ];
        let hashes: Vec<u64> = sets.iter().map(|s| hash_component_ids(s)).collect();

        for (i, a) in hashes.iter().enumerate() {
            assert_ne!(*a, 0);
            for b in &hashes[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(hash_component_ids(sets[3]), hashes[3]);
    }
}
