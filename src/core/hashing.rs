//! # Chunk Key Hashing
//!
//! Hashing primitives for position-keyed tables.
//!
//! Chunk keys are small integer triples that cluster tightly around the
//! observer, so the default SipHash is both slower than needed and no better
//! distributed. Instead each axis is run through an avalanche mix and the
//! three per-axis hashes are XORed. The key's `Hash` impl writes that single
//! pre-mixed `u64`, and [`ChunkKeyHasher`] passes it straight through.
//!
//! ## Usage
//! ```rust
//! use std::collections::HashMap;
//! use voxel_world::core::hashing::BuildChunkKeyHasher;
//!
//! let mut table: HashMap<(i32, i32, i32), u32, BuildChunkKeyHasher> = HashMap::default();
//! table.insert((0, 1, 2), 7);
//! assert_eq!(table.get(&(0, 1, 2)), Some(&7));
//! ```

use std::hash::{BuildHasherDefault, Hasher};

/// Per-axis salts. Without them `(1, 2, 3)` and `(2, 1, 3)` would collide,
/// since XOR is symmetric.
const AXIS_SALTS: [u64; 3] = [
    0x9E37_79B9_7F4A_7C15,
    0xC2B2_AE3D_27D4_EB4F,
    0x1656_67B1_9E37_79F9,
];

/// Avalanche-mixes a single integer coordinate (splitmix64 finalizer).
///
/// Every input bit affects every output bit, so neighbouring coordinates land
/// in unrelated buckets.
#[inline]
pub fn mix_axis(value: i32, salt: u64) -> u64 {
    let mut z = (value as u32 as u64) ^ salt;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Combines three axis values into one hash: mixed per axis, then XORed.
#[inline]
pub fn hash_axes(x: i32, y: i32, z: i32) -> u64 {
    mix_axis(x, AXIS_SALTS[0]) ^ mix_axis(y, AXIS_SALTS[1]) ^ mix_axis(z, AXIS_SALTS[2])
}

/// A hasher that forwards an already-mixed `u64`.
///
/// Integer writes other than `write_u64` are folded through [`mix_axis`], and
/// arbitrary bytes fall back to FNV-1a, so the hasher stays usable for any key
/// even though it is tuned for chunk keys.
#[derive(Default, Clone, Copy, Debug)]
pub struct ChunkKeyHasher {
    state: u64,
    axis: usize,
}

impl Hasher for ChunkKeyHasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.state
    }

    fn write(&mut self, bytes: &[u8]) {
        let mut hash = 0xCBF2_9CE4_8422_2325u64 ^ self.state;
        for byte in bytes {
            hash ^= *byte as u64;
            hash = hash.wrapping_mul(0x0000_0100_0000_01B3);
        }
        self.state = hash;
    }

    #[inline]
    fn write_u64(&mut self, value: u64) {
        self.state ^= value;
    }

    #[inline]
    fn write_i32(&mut self, value: i32) {
        self.state ^= mix_axis(value, AXIS_SALTS[self.axis % AXIS_SALTS.len()]);
        self.axis += 1;
    }
}

/// `BuildHasher` for tables keyed by chunk position.
pub type BuildChunkKeyHasher = BuildHasherDefault<ChunkKeyHasher>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::hash::{BuildHasher, Hash};

    #[test]
    fn swapped_axes_do_not_collide() {
        assert_ne!(hash_axes(1, 2, 3), hash_axes(2, 1, 3));
        assert_ne!(hash_axes(1, 2, 3), hash_axes(1, 3, 2));
        assert_ne!(hash_axes(0, 0, 1), hash_axes(0, 1, 0));
    }

    #[test]
    fn neighbourhood_hashes_are_distinct() {
        let mut seen = HashSet::new();
        for x in -8..8 {
            for y in -8..8 {
                for z in -8..8 {
                    assert!(seen.insert(hash_axes(x, y, z)));
                }
            }
        }
    }

    #[test]
    fn tuple_keys_hash_through_the_axis_mix() {
        let build = BuildChunkKeyHasher::default();
        let mut hasher = build.build_hasher();
        (4i32, -2i32, 9i32).hash(&mut hasher);
        assert_eq!(hasher.finish(), hash_axes(4, -2, 9));
    }
}
