//! # Terrain Generation
//!
//! Terrain is a black box to the engine: something that, given a chunk
//! position, returns the chunk's voxels. Generation runs on worker threads
//! without the world lock, so generators must be `Send + Sync` and must not
//! touch the world.
//!
//! Three stock generators are provided:
//! - [`HeightmapTerrain`]: rolling sine/cosine hills, stone under one layer of
//!   dirt under a grass surface
//! - [`PerlinTerrain`]: 3D Perlin density, caves and overhangs included
//! - [`EmptyTerrain`]: nothing but air
//!
//! Any `Fn(ChunkKey) -> Option<VoxelBuffer>` closure is a generator too.

use cgmath::Point3;
use noise::{NoiseFn, Perlin};

use super::chunk::{ChunkKey, VoxelBuffer};
use super::voxel::VoxelType;

/// Fills chunk voxel buffers.
pub trait TerrainGenerator: Send + Sync {
    /// Generates the voxels of the chunk at `position`.
    ///
    /// # Returns
    /// `None` if the chunk is entirely air.
    fn generate(&self, position: ChunkKey) -> Option<VoxelBuffer>;
}

impl<F> TerrainGenerator for F
where
    F: Fn(ChunkKey) -> Option<VoxelBuffer> + Send + Sync,
{
    fn generate(&self, position: ChunkKey) -> Option<VoxelBuffer> {
        self(position)
    }
}

/// Builds a buffer from a world-space voxel function, `None` if all air.
fn generate_world_space<F>(position: ChunkKey, mut f: F) -> Option<VoxelBuffer>
where
    F: FnMut(Point3<i32>) -> VoxelType,
{
    let origin = position.world_origin();
    let buffer = VoxelBuffer::from_fn(|x, y, z| {
        f(Point3::new(
            origin.x + x as i32,
            origin.y + y as i32,
            origin.z + z as i32,
        ))
    });
    if buffer.is_all_air() {
        None
    } else {
        Some(buffer)
    }
}

/// Generates nothing.
#[derive(Copy, Clone, Debug, Default)]
pub struct EmptyTerrain;

impl TerrainGenerator for EmptyTerrain {
    fn generate(&self, _position: ChunkKey) -> Option<VoxelBuffer> {
        None
    }
}

/// Heightmap terrain from two crossed waves.
///
/// The surface height at world column `(x, z)` is
/// `base + amplitude * (sin(x * f) + cos(z * f)) / 2`, truncated to an
/// integer. The surface voxel is GRASS, the one below it DIRT, everything
/// deeper STONE.
#[derive(Copy, Clone, Debug)]
pub struct HeightmapTerrain {
    /// Mean surface height in voxels
    pub base_height: f32,
    /// Peak deviation from the mean
    pub amplitude: f32,
    /// Wave frequency per voxel
    pub frequency: f32,
}

impl Default for HeightmapTerrain {
    fn default() -> Self {
        HeightmapTerrain {
            base_height: 10.0,
            amplitude: 10.0,
            frequency: 0.1,
        }
    }
}

impl HeightmapTerrain {
    /// Surface height of the column at world `(x, z)`.
    pub fn height_at(&self, x: i32, z: i32) -> i32 {
        let wave = ((x as f32 * self.frequency).sin() + (z as f32 * self.frequency).cos()) * 0.5;
        (wave * self.amplitude + self.base_height) as i32
    }

    /// The voxel at a world position.
    pub fn voxel_at(&self, world: Point3<i32>) -> VoxelType {
        let height = self.height_at(world.x, world.z);
        if world.y < height - 1 {
            VoxelType::STONE
        } else if world.y < height {
            VoxelType::DIRT
        } else if world.y == height {
            VoxelType::GRASS
        } else {
            VoxelType::AIR
        }
    }
}

impl TerrainGenerator for HeightmapTerrain {
    fn generate(&self, position: ChunkKey) -> Option<VoxelBuffer> {
        generate_world_space(position, |world| self.voxel_at(world))
    }
}

/// Threshold above which Perlin noise is considered solid.
pub const PERLIN_POSITIVE_THRESHOLD: f64 = 0.2;
/// Threshold below which Perlin noise is considered solid.
pub const PERLIN_NEGATIVE_THRESHOLD: f64 = -0.2;
/// Scaling factor applied to world coordinates when sampling Perlin noise.
pub const PERLIN_SCALE_FACTOR: f64 = 0.02;

/// 3D Perlin density terrain.
///
/// A cell is solid where the noise sample falls outside the
/// `[PERLIN_NEGATIVE_THRESHOLD, PERLIN_POSITIVE_THRESHOLD]` band. Solid cells
/// with air directly above them are GRASS, the rest STONE.
pub struct PerlinTerrain {
    perlin: Perlin,
    scale: f64,
}

impl PerlinTerrain {
    /// Creates Perlin terrain from `seed` at the default scale.
    pub fn new(seed: u32) -> Self {
        PerlinTerrain {
            perlin: Perlin::new(seed),
            scale: PERLIN_SCALE_FACTOR,
        }
    }

    /// Overrides the sampling scale.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    fn is_solid(&self, world: Point3<i32>) -> bool {
        let sample = self.perlin.get([
            world.x as f64 * self.scale,
            world.y as f64 * self.scale,
            world.z as f64 * self.scale,
        ]);
        !(PERLIN_NEGATIVE_THRESHOLD..=PERLIN_POSITIVE_THRESHOLD).contains(&sample)
    }

    /// The voxel at a world position.
    pub fn voxel_at(&self, world: Point3<i32>) -> VoxelType {
        if !self.is_solid(world) {
            VoxelType::AIR
        } else if self.is_solid(Point3::new(world.x, world.y + 1, world.z)) {
            VoxelType::STONE
        } else {
            VoxelType::GRASS
        }
    }
}

impl Default for PerlinTerrain {
    fn default() -> Self {
        PerlinTerrain::new(0)
    }
}

impl TerrainGenerator for PerlinTerrain {
    fn generate(&self, position: ChunkKey) -> Option<VoxelBuffer> {
        generate_world_space(position, |world| self.voxel_at(world))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::chunk::CHUNK_SIZE;

    #[test]
    fn heightmap_layers_grass_over_dirt_over_stone() {
        let terrain = HeightmapTerrain::default();
        // sin(0) + cos(0) = 1, so the surface at the origin column is 15.
        assert_eq!(terrain.height_at(0, 0), 15);
        assert_eq!(terrain.voxel_at(Point3::new(0, 15, 0)), VoxelType::GRASS);
        assert_eq!(terrain.voxel_at(Point3::new(0, 14, 0)), VoxelType::DIRT);
        assert_eq!(terrain.voxel_at(Point3::new(0, 13, 0)), VoxelType::STONE);
        assert_eq!(terrain.voxel_at(Point3::new(0, 16, 0)), VoxelType::AIR);
    }

    #[test]
    fn heightmap_sky_chunks_are_empty() {
        let terrain = HeightmapTerrain::default();
        assert!(terrain.generate(ChunkKey::new(0, 3, 0)).is_none());
        let ground = terrain.generate(ChunkKey::new(0, 0, 0)).unwrap();
        assert_eq!(ground.get(0, 0, 0), VoxelType::STONE);
        assert!(ground.solid_count() > 0);
    }

    #[test]
    fn heightmap_is_continuous_across_chunk_borders() {
        let terrain = HeightmapTerrain::default();
        let left = terrain.generate(ChunkKey::new(-1, 0, 0)).unwrap();
        let last = CHUNK_SIZE - 1;
        assert_eq!(
            left.get(last, 5, 3),
            terrain.voxel_at(Point3::new(-1, 5, 3))
        );
    }

    #[test]
    fn perlin_is_deterministic_per_seed() {
        let a = PerlinTerrain::new(7);
        let b = PerlinTerrain::new(7);
        for key in [ChunkKey::new(0, 0, 0), ChunkKey::new(3, -2, 5)] {
            assert_eq!(a.generate(key), b.generate(key));
        }
    }

    #[test]
    fn closures_are_generators() {
        let solid = |_: ChunkKey| Some(VoxelBuffer::filled(VoxelType::DIRT));
        let generated = solid.generate(ChunkKey::new(1, 1, 1)).unwrap();
        assert_eq!(generated.solid_count(), CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE);
        assert!(EmptyTerrain.generate(ChunkKey::new(0, 0, 0)).is_none());
    }
}
