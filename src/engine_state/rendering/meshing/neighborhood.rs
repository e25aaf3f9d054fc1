//! Read access to voxel data around the chunk being meshed.

use std::sync::Arc;

use crate::engine_state::voxels::chunk::{ChunkKey, VoxelBuffer};
use crate::engine_state::voxels::voxel::Face;
use crate::engine_state::voxels::world::ChunkStore;

/// What the mesh builder finds at a chunk position.
#[derive(Copy, Clone, Debug)]
pub enum NeighborVoxels<'a> {
    /// No chunk is resident there.
    Absent,
    /// A resident chunk. `None` means it is entirely air.
    Present(Option<&'a VoxelBuffer>),
}

/// Source of voxel data for face-exposure queries across chunk boundaries.
pub trait VoxelLookup {
    /// The voxels of the chunk at `key`, as far as this source knows them.
    fn voxels_at(&self, key: ChunkKey) -> NeighborVoxels<'_>;
}

impl VoxelLookup for ChunkStore {
    fn voxels_at(&self, key: ChunkKey) -> NeighborVoxels<'_> {
        match self.chunk(key) {
            Some(chunk) => NeighborVoxels::Present(chunk.voxels().map(|buffer| &**buffer)),
            None => NeighborVoxels::Absent,
        }
    }
}

/// Snapshot of a chunk and its six face neighbours.
///
/// Captured under the world lock by cloning the buffer `Arc`s, then read by a
/// worker with the lock released. Later edits copy the buffers they touch, so
/// the snapshot never changes under the mesher.
#[derive(Debug)]
pub struct ChunkNeighborhood {
    center_key: ChunkKey,
    center: Option<Arc<VoxelBuffer>>,
    /// Indexed by [`Face`]. Outer `None` means not resident.
    neighbors: [Option<Option<Arc<VoxelBuffer>>>; 6],
}

impl ChunkNeighborhood {
    /// Captures `key` and its neighbours from `store`.
    pub fn capture(store: &ChunkStore, key: ChunkKey) -> Self {
        let center = store.chunk(key).and_then(|chunk| chunk.voxels().cloned());
        let neighbors = key
            .neighbors()
            .map(|neighbor| store.chunk(neighbor).map(|chunk| chunk.voxels().cloned()));
        ChunkNeighborhood {
            center_key: key,
            center,
            neighbors,
        }
    }

    /// Position of the centre chunk.
    pub fn key(&self) -> ChunkKey {
        self.center_key
    }

    /// The centre chunk's voxels, `None` when it is all air or absent.
    pub fn center(&self) -> Option<&VoxelBuffer> {
        self.center.as_deref()
    }
}

impl VoxelLookup for ChunkNeighborhood {
    fn voxels_at(&self, key: ChunkKey) -> NeighborVoxels<'_> {
        if key == self.center_key {
            return NeighborVoxels::Present(self.center.as_deref());
        }
        Face::all()
            .into_iter()
            .position(|face| self.center_key.neighbor(face) == key)
            .and_then(|index| self.neighbors[index].as_ref())
            .map_or(NeighborVoxels::Absent, |voxels| {
                NeighborVoxels::Present(voxels.as_deref())
            })
    }
}
