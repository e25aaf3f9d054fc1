//! # World Module
//!
//! This module provides the `World` context object that every engine
//! component receives instead of reaching for global state.
//!
//! ## Architecture
//!
//! The world owns:
//! - the [`ChunkStore`] (chunk map + chunk pool) behind a single mutex,
//! - the finalize queue workers push completed meshes into,
//! - the terrain generator used by generation tasks.
//!
//! The store lock is the only synchronisation for chunk data. Every map
//! operation, every chunk field write, and every map iteration pass holds it.
//! Workers never hold chunk references across the lock: they carry a
//! [`ChunkHandle`] and re-resolve it each time they lock, so a chunk released
//! in the meantime simply fails to resolve.
//!
//! ## Edits
//!
//! `place_voxel` and `break_voxel` write through to the chunk's voxel buffer
//! immediately and mark the chunk plus its six neighbours for re-meshing.
//! Edits on unloaded positions are ignored, and `query_voxel` reports AIR
//! there.

use std::sync::{Arc, Mutex, MutexGuard};

use cgmath::Point3;
use log::debug;

use super::chunk::chunk_map::ChunkMap;
use super::chunk::chunk_pool::{ChunkHandle, ChunkPool};
use super::chunk::{Chunk, ChunkKey, ChunkState};
use super::terrain::TerrainGenerator;
use super::voxel::VoxelType;
use crate::core::{lock_unpoisoned, EngineError};
use crate::engine_state::rendering::MeshHandle;
use crate::engine_state::task_management::FinalizeQueue;

/// The chunk map and the pool its chunks live in.
///
/// Only reachable through [`World::lock`].
pub struct ChunkStore {
    /// Resident chunks by position
    pub map: ChunkMap,
    /// Storage the resident chunks are acquired from
    pub pool: ChunkPool,
}

impl ChunkStore {
    /// Creates an empty store with its own pool.
    pub fn new(pool_block_size: usize, max_pool_blocks: Option<usize>) -> Self {
        ChunkStore {
            map: ChunkMap::new(),
            pool: ChunkPool::new(pool_block_size, max_pool_blocks),
        }
    }

    /// The handle of the chunk at `key`.
    pub fn handle(&self, key: ChunkKey) -> Option<ChunkHandle> {
        self.map.get(key)
    }

    /// The chunk at `key`, `None` when not resident.
    pub fn chunk(&self, key: ChunkKey) -> Option<&Chunk> {
        self.map.get(key).and_then(|handle| self.pool.get(handle))
    }

    /// Mutable variant of [`ChunkStore::chunk`].
    pub fn chunk_mut(&mut self, key: ChunkKey) -> Option<&mut Chunk> {
        let handle = self.map.get(key)?;
        self.pool.get_mut(handle)
    }

    /// Resolves a handle, `None` if its chunk was released.
    pub fn chunk_by_handle(&self, handle: ChunkHandle) -> Option<&Chunk> {
        self.pool.get(handle)
    }

    /// Mutable variant of [`ChunkStore::chunk_by_handle`].
    pub fn chunk_by_handle_mut(&mut self, handle: ChunkHandle) -> Option<&mut Chunk> {
        self.pool.get_mut(handle)
    }

    /// Acquires a chunk for `key` and registers it, unless one is resident.
    ///
    /// # Returns
    /// The chunk's handle and whether it was newly created.
    pub fn insert_chunk(&mut self, key: ChunkKey) -> Result<(ChunkHandle, bool), EngineError> {
        if let Some(handle) = self.map.get(key) {
            return Ok((handle, false));
        }
        let handle = self.pool.acquire(key)?;
        self.map.put(key, handle);
        Ok((handle, true))
    }

    /// Unregisters and releases the chunk at `key`.
    ///
    /// # Returns
    /// The chunk's mesh, which the caller must release on the main thread.
    pub fn remove_chunk(&mut self, key: ChunkKey) -> Option<MeshHandle> {
        let handle = self.map.remove(key)?;
        self.pool.release(handle)
    }

    /// Unregisters and releases the chunk at `key`, but only if `handle` is
    /// still the chunk registered there.
    ///
    /// # Returns
    /// The chunk's mesh, which the caller must release on the main thread.
    pub fn remove_handle(&mut self, key: ChunkKey, handle: ChunkHandle) -> Option<MeshHandle> {
        if self.map.get(key) != Some(handle) {
            return None;
        }
        self.remove_chunk(key)
    }

    /// Releases every resident chunk.
    ///
    /// # Returns
    /// The meshes those chunks held.
    pub fn clear(&mut self) -> Vec<MeshHandle> {
        let handles = self.map.clear();
        handles
            .into_iter()
            .filter_map(|handle| self.pool.release(handle))
            .collect()
    }

    /// Flags the chunk at `key` for re-meshing.
    ///
    /// # Returns
    /// `false` if no chunk is resident there.
    pub fn mark_dirty(&mut self, key: ChunkKey) -> bool {
        match self.chunk_mut(key) {
            Some(chunk) => {
                chunk.needs_meshing = true;
                true
            }
            None => false,
        }
    }

    /// Flags every resident face neighbour of `key` for re-meshing.
    pub fn mark_neighbors_dirty(&mut self, key: ChunkKey) {
        for neighbor in key.neighbors() {
            self.mark_dirty(neighbor);
        }
    }

    /// The voxel at a world position, AIR if its chunk isn't resident.
    pub fn query_voxel(&self, world: Point3<i32>) -> VoxelType {
        let (key, local) = ChunkKey::from_world(world);
        self.chunk(key)
            .map_or(VoxelType::AIR, |chunk| chunk.get_voxel(local))
    }

    /// Number of resident chunks.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether no chunk is resident.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Shared world context: chunk storage, finalize queue and terrain.
pub struct World {
    store: Mutex<ChunkStore>,
    finalize_queue: FinalizeQueue,
    terrain: Arc<dyn TerrainGenerator>,
}

impl World {
    /// Creates an empty world.
    ///
    /// # Arguments
    /// * `pool_block_size` - Chunk slots per pool block
    /// * `max_pool_blocks` - Optional cap on pool blocks
    /// * `terrain` - Generator used to fill newly streamed chunks
    pub fn new(
        pool_block_size: usize,
        max_pool_blocks: Option<usize>,
        terrain: Arc<dyn TerrainGenerator>,
    ) -> Self {
        World {
            store: Mutex::new(ChunkStore::new(pool_block_size, max_pool_blocks)),
            finalize_queue: FinalizeQueue::new(),
            terrain,
        }
    }

    /// Takes the store lock.
    pub fn lock(&self) -> MutexGuard<'_, ChunkStore> {
        lock_unpoisoned(&self.store)
    }

    /// Jobs waiting for the main thread.
    pub fn finalize_queue(&self) -> &FinalizeQueue {
        &self.finalize_queue
    }

    /// The generator that fills newly streamed chunks.
    pub fn terrain(&self) -> &dyn TerrainGenerator {
        self.terrain.as_ref()
    }

    /// The voxel at a world position. AIR for unloaded chunks, never an error.
    pub fn query_voxel(&self, world: Point3<i32>) -> VoxelType {
        self.lock().query_voxel(world)
    }

    /// Sets the voxel at a world position.
    ///
    /// Placing AIR is the same as [`World::break_voxel`].
    ///
    /// # Returns
    /// `false` if the chunk isn't resident or is still generating.
    pub fn place_voxel(&self, world: Point3<i32>, voxel_type: VoxelType) -> bool {
        if !voxel_type.is_solid() {
            return self.break_voxel(world);
        }
        self.edit(world, |chunk, local| chunk.set_voxel(local, voxel_type))
    }

    /// Clears the voxel at a world position to AIR.
    ///
    /// If that leaves the chunk entirely air, its voxel buffer is freed; the
    /// chunk stays registered.
    ///
    /// # Returns
    /// `false` if the chunk isn't resident or is still generating.
    pub fn break_voxel(&self, world: Point3<i32>) -> bool {
        self.edit(world, |chunk, local| {
            chunk.set_voxel(local, VoxelType::AIR);
            if chunk.free_voxels_if_empty() {
                debug!("Chunk {:?} is empty, voxel buffer freed", chunk.position);
            }
        })
    }

    fn edit<F>(&self, world: Point3<i32>, apply: F) -> bool
    where
        F: FnOnce(&mut Chunk, super::chunk::LocalPos),
    {
        let (key, local) = ChunkKey::from_world(world);
        let mut store = self.lock();
        let Some(chunk) = store.chunk_mut(key) else {
            debug!("Edit at {:?} ignored: chunk {:?} not loaded", world, key);
            return false;
        };
        if chunk.state == ChunkState::Generating {
            debug!("Edit at {:?} ignored: chunk {:?} still generating", world, key);
            return false;
        }

        apply(chunk, local);
        chunk.needs_meshing = true;
        store.mark_neighbors_dirty(key);
        true
    }
}
