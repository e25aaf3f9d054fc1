//! # Chunk Map
//!
//! Position-keyed registry of live chunks.
//!
//! The map owns the only [`ChunkHandle`] to each resident chunk; the chunk
//! data itself lives in the [`ChunkPool`](super::chunk_pool::ChunkPool). Both
//! sit behind the single world lock (see `World`), which serialises every
//! put, get, remove and iteration pass.
//!
//! Iteration borrows the map immutably, so the borrow checker already forbids
//! removing entries mid-walk. Callers that need to drop chunks while scanning
//! collect the keys into a side list first and remove them once the pass is
//! over.

use std::collections::{hash_map, HashMap};

use super::chunk_pool::ChunkHandle;
use super::ChunkKey;
use crate::core::hashing::BuildChunkKeyHasher;

/// Table from chunk position to the handle of the chunk stored there.
#[derive(Default)]
pub struct ChunkMap {
    chunks: HashMap<ChunkKey, ChunkHandle, BuildChunkKeyHasher>,
}

impl ChunkMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        ChunkMap::default()
    }

    /// Registers `handle` at `key`.
    ///
    /// # Returns
    /// The handle previously stored at `key`, which the caller now owns and
    /// must release.
    pub fn put(&mut self, key: ChunkKey, handle: ChunkHandle) -> Option<ChunkHandle> {
        self.chunks.insert(key, handle)
    }

    /// The handle at `key`, or `None` when nothing is registered there.
    pub fn get(&self, key: ChunkKey) -> Option<ChunkHandle> {
        self.chunks.get(&key).copied()
    }

    /// Whether a chunk is registered at `key`.
    pub fn contains(&self, key: ChunkKey) -> bool {
        self.chunks.contains_key(&key)
    }

    /// Unregisters `key`, handing its handle back to the caller.
    pub fn remove(&mut self, key: ChunkKey) -> Option<ChunkHandle> {
        self.chunks.remove(&key)
    }

    /// Empties the map, returning every handle it held.
    pub fn clear(&mut self) -> Vec<ChunkHandle> {
        self.chunks.drain().map(|(_, handle)| handle).collect()
    }

    /// Forward-only walk over every entry, in no particular order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.chunks.iter(),
        }
    }

    /// Number of registered chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Iterator over `(key, handle)` pairs of a [`ChunkMap`].
pub struct Iter<'a> {
    inner: hash_map::Iter<'a, ChunkKey, ChunkHandle>,
}

impl Iterator for Iter<'_> {
    type Item = (ChunkKey, ChunkHandle);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, handle)| (*key, *handle))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a> IntoIterator for &'a ChunkMap {
    type Item = (ChunkKey, ChunkHandle);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::chunk::chunk_pool::ChunkPool;

    #[test]
    fn get_on_a_missing_key_is_absent() {
        let map = ChunkMap::new();
        assert_eq!(map.get(ChunkKey::new(0, 0, 0)), None);
        assert!(map.is_empty());
    }

    #[test]
    fn put_get_remove() {
        let mut pool = ChunkPool::new(8, None);
        let mut map = ChunkMap::new();
        let key = ChunkKey::new(-1, 4, 2);
        let handle = pool.acquire(key).unwrap();

        assert_eq!(map.put(key, handle), None);
        assert_eq!(map.get(key), Some(handle));
        assert!(map.contains(key));
        assert_eq!(map.get(ChunkKey::new(4, -1, 2)), None);

        assert_eq!(map.remove(key), Some(handle));
        assert_eq!(map.get(key), None);
    }

    #[test]
    fn put_returns_the_displaced_handle() {
        let mut pool = ChunkPool::new(8, None);
        let mut map = ChunkMap::new();
        let key = ChunkKey::new(0, 0, 0);
        let first = pool.acquire(key).unwrap();
        let second = pool.acquire(key).unwrap();

        map.put(key, first);
        assert_eq!(map.put(key, second), Some(first));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn deferred_removal_after_iteration() {
        let mut pool = ChunkPool::new(8, None);
        let mut map = ChunkMap::new();
        for x in -2..=2 {
            let key = ChunkKey::new(x, 0, 0);
            map.put(key, pool.acquire(key).unwrap());
        }

        let doomed: Vec<ChunkKey> = map
            .iter()
            .filter(|(key, _)| key.x.abs() > 1)
            .map(|(key, _)| key)
            .collect();
        for key in doomed {
            let handle = map.remove(key).unwrap();
            pool.release(handle);
        }

        assert_eq!(map.len(), 3);
        assert_eq!(pool.live_count(), 3);
    }

    #[test]
    fn clear_hands_back_every_handle() {
        let mut pool = ChunkPool::new(8, None);
        let mut map = ChunkMap::new();
        for z in 0..5 {
            let key = ChunkKey::new(0, 0, z);
            map.put(key, pool.acquire(key).unwrap());
        }
        let handles = map.clear();
        assert_eq!(handles.len(), 5);
        assert!(map.is_empty());
    }
}
