//! # Chunk Generation Task
//!
//! This module defines the `ChunkGenerationTask`, the first stage of the chunk
//! pipeline. It is published by the streaming controller when a chunk enters
//! the streamed radius.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use log::{debug, error, trace};

use super::discard_chunk_job::DiscardChunkJob;

use crate::engine_state::rendering::tasks::chunk_mesh_generation_task::ChunkMeshGenerationTask;
use crate::engine_state::task_management::{Task, TaskSubmitter};
use crate::engine_state::voxels::chunk::chunk_pool::ChunkHandle;
use crate::engine_state::voxels::chunk::{ChunkKey, ChunkState};
use crate::engine_state::voxels::world::World;

/// Fills a freshly acquired chunk with terrain.
///
/// This task:
/// 1. Runs the terrain generator without holding the world lock
/// 2. Installs the voxels if the chunk is still the one it was created for
/// 3. Marks resident neighbours dirty so their border faces are re-culled
/// 4. Publishes the mesh task for the chunk
///
/// If the terrain generator panics, the chunk is handed to a
/// [`DiscardChunkJob`] so streaming requests it again.
pub struct ChunkGenerationTask {
    world: Arc<World>,
    handle: ChunkHandle,
    position: ChunkKey,
}

impl ChunkGenerationTask {
    /// Creates a new chunk generation task.
    ///
    /// # Arguments
    /// * `world` - The world the chunk lives in
    /// * `handle` - The chunk, already registered and in the `Generating` state
    /// * `position` - The chunk's position
    pub fn new(world: Arc<World>, handle: ChunkHandle, position: ChunkKey) -> Self {
        ChunkGenerationTask {
            world,
            handle,
            position,
        }
    }
}

impl Task for ChunkGenerationTask {
    fn process(self: Box<Self>, submitter: &TaskSubmitter) {
        let generated = panic::catch_unwind(AssertUnwindSafe(|| {
            self.world.terrain().generate(self.position)
        }));
        let voxels = match generated {
            Ok(voxels) => voxels.map(Arc::new),
            Err(_) => {
                error!("Terrain generation panicked for chunk {:?}", self.position);
                self.world
                    .finalize_queue()
                    .push(Box::new(DiscardChunkJob::new(self.handle, self.position)));
                return;
            }
        };

        let needs_mesh = {
            let mut store = self.world.lock();
            let Some(chunk) = store.chunk_by_handle_mut(self.handle) else {
                debug!("Chunk {:?} released during generation", self.position);
                return;
            };

            chunk.set_voxels(voxels);
            if chunk.has_voxels() {
                chunk.needs_meshing = true;
                chunk.state = ChunkState::Meshing;
                store.mark_neighbors_dirty(self.position);
                true
            } else {
                chunk.needs_meshing = false;
                chunk.state = ChunkState::Idle;
                false
            }
        };

        if !needs_mesh {
            trace!("Chunk {:?} generated empty", self.position);
            return;
        }

        let mesh_task = ChunkMeshGenerationTask::new(Arc::clone(&self.world), self.handle);
        if !submitter.publish_task(Box::new(mesh_task)) {
            // Leave it dirty and idle so a later pass can pick it up.
            if let Some(chunk) = self.world.lock().chunk_by_handle_mut(self.handle) {
                chunk.state = ChunkState::Idle;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::rendering::InMemoryMeshService;
    use crate::engine_state::voxels::chunk::VoxelBuffer;
    use crate::engine_state::voxels::voxel::VoxelType;

    fn solid(_: ChunkKey) -> Option<VoxelBuffer> {
        Some(VoxelBuffer::filled(VoxelType::DIRT))
    }

    fn unavailable(_: ChunkKey) -> Option<VoxelBuffer> {
        panic!("terrain source unavailable")
    }

    /// Registers a chunk the way streaming does and builds its task.
    fn start(world: &Arc<World>, key: ChunkKey) -> Box<ChunkGenerationTask> {
        let mut store = world.lock();
        let (handle, _) = store.insert_chunk(key).unwrap();
        store.chunk_by_handle_mut(handle).unwrap().state = ChunkState::Generating;
        Box::new(ChunkGenerationTask::new(Arc::clone(world), handle, key))
    }

    #[test]
    fn generated_chunk_moves_on_to_meshing() {
        let world = Arc::new(World::new(4, None, Arc::new(solid)));
        let submitter = TaskSubmitter::detached();
        let key = ChunkKey::new(0, 0, 0);

        start(&world, key).process(&submitter);

        let store = world.lock();
        let chunk = store.chunk(key).unwrap();
        assert!(chunk.has_voxels());
        assert_eq!(chunk.state, ChunkState::Meshing);
        assert_eq!(submitter.queued_len(), 1);
    }

    #[test]
    fn result_for_a_released_chunk_is_discarded() {
        let world = Arc::new(World::new(4, None, Arc::new(solid)));
        let submitter = TaskSubmitter::detached();
        let key = ChunkKey::new(0, 0, 0);
        let task = start(&world, key);

        // Released, and the slot handed to another chunk at the same position.
        world.lock().remove_chunk(key);
        let (replacement, _) = world.lock().insert_chunk(key).unwrap();
        task.process(&submitter);

        let store = world.lock();
        let chunk = store.chunk_by_handle(replacement).unwrap();
        assert!(!chunk.has_voxels());
        assert_eq!(chunk.state, ChunkState::Idle);
        assert_eq!(submitter.queued_len(), 0);
        assert!(world.finalize_queue().is_empty());
    }

    #[test]
    fn generator_panic_hands_the_chunk_back_for_release() {
        let world = Arc::new(World::new(4, None, Arc::new(unavailable)));
        let submitter = TaskSubmitter::detached();
        let key = ChunkKey::new(0, 0, 0);

        start(&world, key).process(&submitter);

        assert_eq!(submitter.queued_len(), 0);
        assert_eq!(world.finalize_queue().len(), 1);
        let mut service = InMemoryMeshService::new();
        while let Some(job) = world.finalize_queue().pop() {
            job.finalize(&world, &mut service);
        }
        assert!(world.lock().is_empty());
        assert_eq!(world.lock().pool.live_count(), 0);
    }
}
