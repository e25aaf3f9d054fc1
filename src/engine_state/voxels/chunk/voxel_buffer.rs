//! # Voxel Buffer
//!
//! Dense storage for one chunk's worth of voxels.
//!
//! Cells are linearized as `x + S * (y + S * z)` where `S` is [`CHUNK_SIZE`],
//! so walking `x` fastest touches contiguous memory. A chunk that contains
//! nothing but air never owns one of these: the buffer is only created on the
//! first solid write and dropped again once a scan finds it all air.

use super::{CHUNK_SIZE, CHUNK_VOLUME};
use crate::engine_state::voxels::voxel::VoxelType;

/// A `CHUNK_SIZE`³ array of voxel types.
#[derive(Clone, PartialEq, Eq)]
pub struct VoxelBuffer {
    voxels: Box<[VoxelType]>,
}

impl VoxelBuffer {
    /// A buffer with every cell set to AIR.
    pub fn new_air() -> Self {
        Self::filled(VoxelType::AIR)
    }

    /// A buffer with every cell set to `voxel_type`.
    pub fn filled(voxel_type: VoxelType) -> Self {
        VoxelBuffer {
            voxels: vec![voxel_type; CHUNK_VOLUME].into_boxed_slice(),
        }
    }

    /// Builds a buffer by evaluating `f(x, y, z)` for every local coordinate.
    pub fn from_fn<F>(mut f: F) -> Self
    where
        F: FnMut(usize, usize, usize) -> VoxelType,
    {
        let mut voxels = Vec::with_capacity(CHUNK_VOLUME);
        for z in 0..CHUNK_SIZE {
            for y in 0..CHUNK_SIZE {
                for x in 0..CHUNK_SIZE {
                    voxels.push(f(x, y, z));
                }
            }
        }
        VoxelBuffer {
            voxels: voxels.into_boxed_slice(),
        }
    }

    /// Linear index of a local coordinate.
    ///
    /// # Panics
    /// Debug builds panic if any coordinate is outside `0..CHUNK_SIZE`.
    #[inline]
    pub fn index(x: usize, y: usize, z: usize) -> usize {
        debug_assert!(x < CHUNK_SIZE && y < CHUNK_SIZE && z < CHUNK_SIZE);
        x + CHUNK_SIZE * (y + CHUNK_SIZE * z)
    }

    /// The voxel at a local coordinate.
    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> VoxelType {
        self.voxels[Self::index(x, y, z)]
    }

    /// Overwrites the voxel at a local coordinate.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, z: usize, voxel_type: VoxelType) {
        self.voxels[Self::index(x, y, z)] = voxel_type;
    }

    /// True when no cell holds a solid voxel.
    pub fn is_all_air(&self) -> bool {
        self.voxels.iter().all(|voxel| !voxel.is_solid())
    }

    /// Number of solid cells.
    pub fn solid_count(&self) -> usize {
        self.voxels.iter().filter(|voxel| voxel.is_solid()).count()
    }

    /// Raw cells in linear order.
    pub fn as_slice(&self) -> &[VoxelType] {
        &self.voxels
    }
}

impl std::fmt::Debug for VoxelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoxelBuffer")
            .field("solid", &self.solid_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linearization_walks_x_fastest() {
        assert_eq!(VoxelBuffer::index(0, 0, 0), 0);
        assert_eq!(VoxelBuffer::index(1, 0, 0), 1);
        assert_eq!(VoxelBuffer::index(0, 1, 0), CHUNK_SIZE);
        assert_eq!(VoxelBuffer::index(0, 0, 1), CHUNK_SIZE * CHUNK_SIZE);
        assert_eq!(
            VoxelBuffer::index(CHUNK_SIZE - 1, CHUNK_SIZE - 1, CHUNK_SIZE - 1),
            CHUNK_VOLUME - 1
        );
    }

    #[test]
    fn from_fn_matches_get() {
        let buffer = VoxelBuffer::from_fn(|x, y, z| {
            if (x + y + z) % 2 == 0 {
                VoxelType::STONE
            } else {
                VoxelType::AIR
            }
        });
        assert_eq!(buffer.get(0, 0, 0), VoxelType::STONE);
        assert_eq!(buffer.get(1, 0, 0), VoxelType::AIR);
        assert_eq!(buffer.get(3, 5, 2), VoxelType::STONE);
        assert_eq!(buffer.solid_count(), CHUNK_VOLUME / 2);
    }

    #[test]
    fn air_scan_tracks_last_solid_cell() {
        let mut buffer = VoxelBuffer::new_air();
        assert!(buffer.is_all_air());
        buffer.set(4, 4, 4, VoxelType::DIRT);
        assert!(!buffer.is_all_air());
        buffer.set(4, 4, 4, VoxelType::AIR);
        assert!(buffer.is_all_air());
    }
}
