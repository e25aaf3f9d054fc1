//! Task for generating mesh data for chunks in a background thread.
//!
//! This module contains the `ChunkMeshGenerationTask`, the second stage of
//! the chunk pipeline. It builds the triangle list on a worker and hands it to
//! the main thread as a [`MeshFinalizeJob`].

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use log::{debug, error};

use super::mesh_finalize_job::MeshFinalizeJob;
use crate::engine_state::rendering::meshing::{build_chunk_mesh, ChunkNeighborhood};
use crate::engine_state::task_management::{Task, TaskSubmitter};
use crate::engine_state::voxels::chunk::chunk_pool::ChunkHandle;
use crate::engine_state::voxels::chunk::ChunkState;
use crate::engine_state::voxels::world::World;

/// A task that meshes one chunk.
///
/// The chunk and its six neighbours are snapshotted under the world lock,
/// then meshed with the lock released. A finalize job is always pushed, even
/// when the chunk has nothing to draw, so the main thread can retire the
/// chunk's previous mesh and mark it idle.
///
/// If the mesh builder panics, the chunk goes back to `Idle` still flagged
/// for re-meshing, and a later streaming pass tries again.
pub struct ChunkMeshGenerationTask {
    world: Arc<World>,
    handle: ChunkHandle,
}

impl ChunkMeshGenerationTask {
    /// Creates a new chunk mesh generation task.
    ///
    /// # Arguments
    /// * `world` - The world the chunk lives in
    /// * `handle` - The chunk, already in the `Meshing` state
    pub fn new(world: Arc<World>, handle: ChunkHandle) -> Self {
        ChunkMeshGenerationTask { world, handle }
    }
}

impl Task for ChunkMeshGenerationTask {
    fn process(self: Box<Self>, _submitter: &TaskSubmitter) {
        let neighborhood = {
            let mut store = self.world.lock();
            let Some(chunk) = store.chunk_by_handle_mut(self.handle) else {
                debug!("Chunk {:?} released before meshing", self.handle);
                return;
            };
            chunk.needs_meshing = false;
            let position = chunk.position;
            ChunkNeighborhood::capture(&store, position)
        };

        let built = panic::catch_unwind(AssertUnwindSafe(|| {
            build_chunk_mesh(&neighborhood, neighborhood.key(), neighborhood.center())
        }));
        let mesh = match built {
            Ok(mesh) => mesh,
            Err(_) => {
                error!("Mesh building panicked for chunk {:?}", neighborhood.key());
                if let Some(chunk) = self.world.lock().chunk_by_handle_mut(self.handle) {
                    chunk.state = ChunkState::Idle;
                    chunk.needs_meshing = true;
                }
                return;
            }
        };
        self.world
            .finalize_queue()
            .push(Box::new(MeshFinalizeJob::new(self.handle, mesh)));
    }
}
