#![warn(missing_docs)]
//! # Voxel World
//!
//! The core of a streamed voxel-world engine: chunk storage and lifecycle,
//! face-culling mesh construction, and the background job system that ties
//! them together without stalling the render thread.
//!
//! ## Key Modules
//!
//! * `core` - Hashing primitives, the crate error type, lock helpers
//! * `engine_state` - The per-frame driver and every subsystem it runs
//!
//! ## Architecture
//!
//! Rendering, input, cameras and terrain algorithms are collaborators, not
//! part of the core. The engine talks to them through three seams:
//! * `MeshService` - uploads triangle lists and releases them, main thread only
//! * `StreamingOrigin` - reports where the observer is and how far to stream
//! * `TerrainGenerator` - fills a chunk's voxels given its position
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use voxel_world::engine_state::rendering::InMemoryMeshService;
//! use voxel_world::engine_state::voxels::chunk::ChunkKey;
//! use voxel_world::engine_state::voxels::streaming::FixedOrigin;
//! use voxel_world::engine_state::voxels::terrain::HeightmapTerrain;
//! use voxel_world::engine_state::{EngineConfig, EngineState};
//!
//! let config = EngineConfig {
//!     worker_threads: 2,
//!     streaming_radius: 2,
//!     ..EngineConfig::default()
//! };
//! let mut engine = EngineState::new(
//!     config,
//!     Arc::new(HeightmapTerrain::default()),
//!     InMemoryMeshService::new(),
//! )?;
//!
//! let origin = FixedOrigin::new(ChunkKey::new(0, 0, 0), 2);
//! for _ in 0..10 {
//!     engine.update(&origin);
//! }
//! engine.shutdown();
//! # Ok::<(), voxel_world::core::EngineError>(())
//! ```

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cgmath::Point3;
use log::info;

pub mod core;
pub mod engine_state;

use crate::core::EngineError;
use engine_state::rendering::InMemoryMeshService;
use engine_state::voxels::chunk::{ChunkKey, CHUNK_SIZE};
use engine_state::voxels::streaming::FixedOrigin;
use engine_state::voxels::terrain::HeightmapTerrain;
use engine_state::voxels::voxel::VoxelType;
use engine_state::{EngineConfig, EngineState};

/// Frames the headless demo runs for.
pub const DEMO_FRAMES: usize = 300;
/// The demo origin steps one chunk along +X this often.
const DEMO_FRAMES_PER_STEP: usize = 30;

/// Installs `env_logger` on stdout, filtered by `RUST_LOG`.
///
/// Calling it again is harmless.
pub fn init_logging() {
    let mut log_builder = env_logger::Builder::new();
    let _ = log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .try_init();
}

/// Runs the headless demo.
///
/// Streams heightmap terrain around an origin that walks along +X, pokes
/// random voxels near the surface, and logs what every frame did. Meshes go
/// to an [`InMemoryMeshService`].
///
/// # Arguments
/// * `config_path` - Optional JSON config; defaults are used otherwise
pub fn run(config_path: Option<&Path>) -> Result<(), EngineError> {
    let config = match config_path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    info!("Configuration: {:?}", config);

    let radius = config.streaming_radius;
    let terrain = HeightmapTerrain::default();
    let mut engine = EngineState::new(config, Arc::new(terrain), InMemoryMeshService::new())?;

    for frame in 0..DEMO_FRAMES {
        let step = (frame / DEMO_FRAMES_PER_STEP) as i32;
        let origin = FixedOrigin::new(ChunkKey::new(step, 0, 0), radius);
        let stats = engine.update(&origin);

        if frame % 10 == 0 {
            poke_random_voxel(&engine, &terrain, origin.chunk);
        }

        info!("Frame {:>4}: {:?}", frame, stats);
        thread::sleep(Duration::from_millis(1));
    }

    let service = engine.mesh_service();
    info!(
        "Demo finished: {} live meshes, {} vertices, {} uploads, {} releases",
        service.live_meshes(),
        service.total_vertices(),
        service.uploads(),
        service.releases()
    );
    engine.shutdown();
    Ok(())
}

/// Places or breaks a voxel at the terrain surface somewhere in `chunk`'s column.
fn poke_random_voxel(
    engine: &EngineState<InMemoryMeshService>,
    terrain: &HeightmapTerrain,
    chunk: ChunkKey,
) {
    let origin = chunk.world_origin();
    let x = origin.x + fastrand::i32(0..CHUNK_SIZE as i32);
    let z = origin.z + fastrand::i32(0..CHUNK_SIZE as i32);
    let surface = Point3::new(x, terrain.height_at(x, z), z);

    if fastrand::bool() {
        let above = Point3::new(surface.x, surface.y + 1, surface.z);
        let voxel_type = VoxelType::random_solid();
        if engine.place_voxel(above, voxel_type) {
            info!("Placed {:?} at {:?}", voxel_type, above);
        }
    } else if engine.break_voxel(surface) {
        info!("Broke voxel at {:?}", surface);
    }
}
