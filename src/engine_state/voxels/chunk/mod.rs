//! # Chunk Module
//!
//! This module provides the `Chunk` struct and the coordinate types used to
//! address chunks and the voxels inside them.
//!
//! ## Memory Optimization
//!
//! A chunk's voxel storage is lazily allocated. A chunk holding nothing but air
//! has no buffer at all (`voxels() == None`); the dense `CHUNK_SIZE`³ buffer is
//! created on the first solid write (generation or edit) and dropped again when
//! breaking a voxel leaves the chunk entirely empty. Large open-air regions of
//! the streamed volume therefore cost only the fixed-size chunk record.
//!
//! Voxel buffers are shared behind an `Arc`. A mesh task clones the `Arc`
//! under the world lock and meshes without holding it; an edit that lands
//! meanwhile copies the buffer (`Arc::make_mut`) instead of mutating data a
//! worker is reading.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use cgmath::{Point3, Vector3};

use crate::core::hashing::hash_axes;
use crate::engine_state::rendering::MeshHandle;
use crate::engine_state::voxels::voxel::{Face, VoxelType};

pub mod chunk_map;
pub mod chunk_pool;
pub mod voxel_buffer;

pub use voxel_buffer::VoxelBuffer;

/// The edge length of a chunk in voxels.
pub const CHUNK_SIZE: usize = 16;
/// The number of voxels in a single 2D plane of a chunk (CHUNK_SIZE²).
pub const CHUNK_PLANE_SIZE: usize = CHUNK_SIZE * CHUNK_SIZE;
/// The total number of voxels in a chunk (CHUNK_SIZE³).
pub const CHUNK_VOLUME: usize = CHUNK_PLANE_SIZE * CHUNK_SIZE;

const CHUNK_SIZE_I32: i32 = CHUNK_SIZE as i32;

/// Integer chunk-space position identifying a chunk.
///
/// Keys compare by exact per-axis equality. Hashing mixes each axis
/// independently and XORs the results (see [`crate::core::hashing`]).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkKey {
    /// Chunk column along X
    pub x: i32,
    /// Chunk layer along Y
    pub y: i32,
    /// Chunk row along Z
    pub z: i32,
}

impl Hash for ChunkKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(hash_axes(self.x, self.y, self.z));
    }
}

impl From<Point3<i32>> for ChunkKey {
    fn from(point: Point3<i32>) -> Self {
        ChunkKey::new(point.x, point.y, point.z)
    }
}

impl ChunkKey {
    /// Creates a key from chunk coordinates.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        ChunkKey { x, y, z }
    }

    /// The key shifted by `offset` chunks, clamped to the `i32` range.
    pub fn offset(self, offset: Vector3<i32>) -> Self {
        ChunkKey::new(
            self.x.saturating_add(offset.x),
            self.y.saturating_add(offset.y),
            self.z.saturating_add(offset.z),
        )
    }

    /// The chunk across `face`.
    pub fn neighbor(self, face: Face) -> Self {
        self.offset(face.normal())
    }

    /// The six axis-aligned neighbours, in [`Face::all`] order.
    pub fn neighbors(self) -> [ChunkKey; 6] {
        Face::all().map(|face| self.neighbor(face))
    }

    /// Squared euclidean distance in chunk units.
    pub fn distance_squared(self, other: ChunkKey) -> i64 {
        let dx = self.x as i64 - other.x as i64;
        let dy = self.y as i64 - other.y as i64;
        let dz = self.z as i64 - other.z as i64;
        dx * dx + dy * dy + dz * dz
    }

    /// World-space voxel coordinate of this chunk's minimum corner.
    pub fn world_origin(self) -> Point3<i32> {
        Point3::new(
            self.x * CHUNK_SIZE_I32,
            self.y * CHUNK_SIZE_I32,
            self.z * CHUNK_SIZE_I32,
        )
    }

    /// Splits a world voxel position into the chunk that contains it and the
    /// local coordinate inside that chunk.
    ///
    /// Uses floor division, so `-1` lands in chunk `-1` at local `15`.
    pub fn from_world(world: Point3<i32>) -> (ChunkKey, LocalPos) {
        let key = ChunkKey::new(
            world.x.div_euclid(CHUNK_SIZE_I32),
            world.y.div_euclid(CHUNK_SIZE_I32),
            world.z.div_euclid(CHUNK_SIZE_I32),
        );
        let local = LocalPos::new(
            world.x.rem_euclid(CHUNK_SIZE_I32) as usize,
            world.y.rem_euclid(CHUNK_SIZE_I32) as usize,
            world.z.rem_euclid(CHUNK_SIZE_I32) as usize,
        );
        (key, local)
    }
}

/// Returns the chunk containing a floating-point observer position.
pub fn chunk_coordinate_of(position: Point3<f32>) -> ChunkKey {
    let size = CHUNK_SIZE as f32;
    ChunkKey::new(
        (position.x / size).floor() as i32,
        (position.y / size).floor() as i32,
        (position.z / size).floor() as i32,
    )
}

/// A coordinate inside a chunk, each axis in `0..CHUNK_SIZE`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct LocalPos {
    /// Offset along X
    pub x: usize,
    /// Offset along Y
    pub y: usize,
    /// Offset along Z
    pub z: usize,
}

impl LocalPos {
    /// Creates a local coordinate. Axes are not range-checked here.
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        LocalPos { x, y, z }
    }
}

/// Background work currently outstanding for a chunk.
///
/// Read and written only while holding the world lock. The streaming
/// controller checks it is `Idle` before submitting anything, which keeps at
/// most one task in flight per chunk.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ChunkState {
    /// Nothing queued. Eligible for a mesh task when dirty.
    #[default]
    Idle,
    /// A generation task has been submitted and has not installed voxels yet.
    Generating,
    /// A mesh task is building, or its finalize job awaits the main thread.
    Meshing,
}

/// A fixed-size cube of voxels, the unit of loading, meshing and streaming.
#[derive(Debug, Default)]
pub struct Chunk {
    /// The position of this chunk in chunk coordinates (not voxel coordinates).
    pub position: ChunkKey,

    /// Dense voxel data, absent while the chunk is entirely air.
    voxels: Option<Arc<VoxelBuffer>>,

    /// Set whenever the chunk, or a neighbour across a shared face, changes.
    pub needs_meshing: bool,

    /// Renderable returned by the mesh service. Only the main thread sets it.
    pub mesh: Option<MeshHandle>,

    /// Background work outstanding for this chunk.
    pub state: ChunkState,
}

impl Chunk {
    /// Creates an idle, all-air chunk at `position`.
    pub fn new(position: ChunkKey) -> Self {
        Chunk {
            position,
            ..Default::default()
        }
    }

    /// The shared voxel buffer, or `None` for an all-air chunk.
    pub fn voxels(&self) -> Option<&Arc<VoxelBuffer>> {
        self.voxels.as_ref()
    }

    /// Whether a voxel buffer is allocated.
    pub fn has_voxels(&self) -> bool {
        self.voxels.is_some()
    }

    /// Installs generated voxel data. An empty buffer is normalised to `None`.
    pub fn set_voxels(&mut self, voxels: Option<Arc<VoxelBuffer>>) {
        self.voxels = voxels.filter(|buffer| !buffer.is_all_air());
    }

    /// The voxel at `local`, AIR when no buffer is allocated.
    pub fn get_voxel(&self, local: LocalPos) -> VoxelType {
        match &self.voxels {
            Some(buffer) => buffer.get(local.x, local.y, local.z),
            None => VoxelType::AIR,
        }
    }

    /// Writes a voxel, allocating the buffer on the first solid write.
    ///
    /// Writing AIR into a chunk with no buffer does nothing. The buffer is
    /// copied first if a mesh task still holds the previous version.
    pub fn set_voxel(&mut self, local: LocalPos, voxel_type: VoxelType) {
        if self.voxels.is_none() && !voxel_type.is_solid() {
            return;
        }
        let buffer = self
            .voxels
            .get_or_insert_with(|| Arc::new(VoxelBuffer::new_air()));
        Arc::make_mut(buffer).set(local.x, local.y, local.z, voxel_type);
    }

    /// Drops the voxel buffer if every cell is air.
    ///
    /// # Returns
    /// `true` if a buffer was freed.
    pub fn free_voxels_if_empty(&mut self) -> bool {
        match &self.voxels {
            Some(buffer) if buffer.is_all_air() => {
                self.voxels = None;
                true
            }
            _ => false,
        }
    }
}
