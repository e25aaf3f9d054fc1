//! Main-thread cleanup for a chunk whose generation failed.

use log::{debug, warn};

use crate::engine_state::rendering::MeshService;
use crate::engine_state::task_management::MainThreadJob;
use crate::engine_state::voxels::chunk::chunk_pool::ChunkHandle;
use crate::engine_state::voxels::chunk::ChunkKey;
use crate::engine_state::voxels::world::World;

/// Unregisters and releases a chunk that never received its voxels.
///
/// Streaming sees the position as empty on its next pass and requests a
/// fresh chunk there, so a failed generation is retried instead of leaving
/// the chunk stuck in `Generating`.
pub struct DiscardChunkJob {
    handle: ChunkHandle,
    position: ChunkKey,
}

impl DiscardChunkJob {
    /// # Arguments
    /// * `handle` - The chunk to discard
    /// * `position` - Where it is registered
    pub fn new(handle: ChunkHandle, position: ChunkKey) -> Self {
        DiscardChunkJob { handle, position }
    }
}

impl MainThreadJob for DiscardChunkJob {
    fn finalize(self: Box<Self>, world: &World, mesh_service: &mut dyn MeshService) {
        let mut store = world.lock();
        if store.chunk_by_handle(self.handle).is_none() {
            debug!("Chunk {:?} already released", self.position);
            return;
        }
        let mesh = store.remove_handle(self.position, self.handle);
        drop(store);

        warn!("Discarded chunk {:?} after failed generation", self.position);
        if let Some(mesh) = mesh {
            mesh_service.release(mesh);
        }
    }
}
