//! The main-thread half of the mesh pipeline.

use log::{debug, error};

use crate::engine_state::rendering::meshing::MeshData;
use crate::engine_state::rendering::MeshService;
use crate::engine_state::task_management::MainThreadJob;
use crate::engine_state::voxels::chunk::chunk_pool::ChunkHandle;
use crate::engine_state::voxels::chunk::ChunkState;
use crate::engine_state::voxels::world::World;

/// A built mesh waiting for upload.
///
/// Running the job:
/// 1. drops it if the chunk has been released since the mesh was built,
/// 2. releases the chunk's previous mesh,
/// 3. uploads the new one (if any) and stores the handle on the chunk,
/// 4. returns the chunk to `Idle` so it can be meshed again.
pub struct MeshFinalizeJob {
    handle: ChunkHandle,
    mesh: Option<MeshData>,
}

impl MeshFinalizeJob {
    /// # Arguments
    /// * `handle` - The chunk the mesh belongs to
    /// * `mesh` - The built mesh, `None` when the chunk has nothing to draw
    pub fn new(handle: ChunkHandle, mesh: Option<MeshData>) -> Self {
        MeshFinalizeJob { handle, mesh }
    }
}

impl MainThreadJob for MeshFinalizeJob {
    fn finalize(self: Box<Self>, world: &World, mesh_service: &mut dyn MeshService) {
        let previous = {
            let mut store = world.lock();
            let Some(chunk) = store.chunk_by_handle_mut(self.handle) else {
                debug!("Dropping mesh for released chunk {:?}", self.handle);
                return;
            };
            chunk.mesh.take()
        };
        if let Some(previous) = previous {
            mesh_service.release(previous);
        }

        let uploaded = self.mesh.as_ref().and_then(|mesh| {
            let handle = mesh_service.upload(&mesh.positions(), &mesh.colors());
            if handle.is_none() {
                error!(
                    "Upload of {} vertices for chunk {:?} failed",
                    mesh.vertex_count(),
                    mesh.position
                );
            }
            handle
        });

        let mut store = world.lock();
        match store.chunk_by_handle_mut(self.handle) {
            Some(chunk) => {
                chunk.mesh = uploaded;
                chunk.state = ChunkState::Idle;
            }
            None => {
                drop(store);
                if let Some(orphan) = uploaded {
                    mesh_service.release(orphan);
                }
            }
        }
    }
}
