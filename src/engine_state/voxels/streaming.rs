//! # Chunk Streaming
//!
//! Keeps the set of resident chunks equal to the sphere of chunk positions
//! around a moving origin, and submits mesh work for dirty chunks.
//!
//! ## Per-frame pass
//!
//! With the world lock held once for the whole pass:
//! 1. every offset with squared length ≤ radius² (nearest first) that has no
//!    chunk gets one: acquired, registered, set `Generating`, and a
//!    generation task queued,
//! 2. every resident chunk is visited: chunks beyond the radius are collected
//!    for removal, idle dirty chunks with voxels are set `Meshing` and a mesh
//!    task queued, and dirty chunks without voxels have their old mesh
//!    retired,
//! 3. collected chunks are removed after the walk, and their resident
//!    neighbours marked dirty so faces culled against them reappear.
//!
//! The lock is then dropped, retired meshes are released through the mesh
//! service, and the queued tasks are published. If the worker pool refuses a
//! task, that task and every one after it is rolled back: refused generations
//! drop their chunk so a later pass requests it again, and refused meshes
//! return their chunk to `Idle`, still dirty.
//!
//! A chunk's state is checked and set under the lock before any task for it
//! is queued, so at most one background task per chunk is ever in flight.

use std::sync::Arc;

use cgmath::Vector3;
use log::{debug, error, warn};

use super::chunk::chunk_pool::ChunkHandle;
use super::chunk::ChunkKey;
use super::chunk::ChunkState;
use super::tasks::chunk_generation_task::ChunkGenerationTask;
use super::world::World;
use crate::engine_state::rendering::tasks::chunk_mesh_generation_task::ChunkMeshGenerationTask;
use crate::engine_state::rendering::{MeshHandle, MeshService};
use crate::engine_state::task_management::{Task, TaskSubmitter};

/// Where streaming is centred, polled once per frame.
pub trait StreamingOrigin {
    /// The chunk the observer is in.
    fn current_chunk_coordinate(&self) -> ChunkKey;

    /// Streaming radius in chunks. Negative values are treated as zero.
    fn streaming_radius(&self) -> i32;
}

/// A streaming origin that stays where it's put.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FixedOrigin {
    /// The chunk streaming is centred on
    pub chunk: ChunkKey,
    /// Streaming radius in chunks
    pub radius: i32,
}

impl FixedOrigin {
    /// Creates an origin centred on `chunk`.
    pub fn new(chunk: ChunkKey, radius: i32) -> Self {
        FixedOrigin { chunk, radius }
    }
}

impl StreamingOrigin for FixedOrigin {
    fn current_chunk_coordinate(&self) -> ChunkKey {
        self.chunk
    }

    fn streaming_radius(&self) -> i32 {
        self.radius
    }
}

/// What one streaming pass did.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamingReport {
    /// Chunks acquired and accepted for generation
    pub requested: usize,
    /// Chunks that left the radius and were released
    pub removed: usize,
    /// Mesh tasks accepted by the worker pool
    pub mesh_tasks: usize,
    /// Meshes released through the mesh service
    pub retired_meshes: usize,
}

/// What a queued task was for, so a refused one can be undone.
#[derive(Copy, Clone, Debug)]
enum Submission {
    Generation(ChunkKey, ChunkHandle),
    Mesh(ChunkHandle),
}

/// Decides which chunks exist and when they are re-meshed.
#[derive(Debug, Default)]
pub struct StreamingController {
    radius: Option<i32>,
    /// Offsets within `radius`, nearest first.
    offsets: Vec<Vector3<i32>>,
}

impl StreamingController {
    /// Creates a controller with no cached radius.
    pub fn new() -> Self {
        StreamingController::default()
    }

    /// Offsets inside the current radius, nearest first.
    pub fn offsets(&self) -> &[Vector3<i32>] {
        &self.offsets
    }

    fn refresh_offsets(&mut self, radius: i32) {
        if self.radius == Some(radius) {
            return;
        }
        let radius_squared = radius as i64 * radius as i64;
        let mut offsets = Vec::new();
        for x in -radius..=radius {
            for y in -radius..=radius {
                for z in -radius..=radius {
                    let offset = Vector3::new(x, y, z);
                    if length_squared(offset) <= radius_squared {
                        offsets.push(offset);
                    }
                }
            }
        }
        offsets.sort_by_key(|offset| length_squared(*offset));
        debug!("Streaming radius {} covers {} chunks", radius, offsets.len());
        self.offsets = offsets;
        self.radius = Some(radius);
    }

    /// Runs one streaming pass.
    ///
    /// # Arguments
    /// * `world` - The world to stream
    /// * `submitter` - Worker pool for generation and mesh tasks
    /// * `origin` - Centre and radius for this frame
    /// * `mesh_service` - Receives meshes of chunks that were dropped or emptied
    pub fn update(
        &mut self,
        world: &Arc<World>,
        submitter: &TaskSubmitter,
        origin: &dyn StreamingOrigin,
        mesh_service: &mut dyn MeshService,
    ) -> StreamingReport {
        let center = origin.current_chunk_coordinate();
        let radius = origin.streaming_radius().max(0);
        self.refresh_offsets(radius);
        let radius_squared = radius as i64 * radius as i64;

        let mut report = StreamingReport::default();
        let mut tasks: Vec<(Submission, Box<dyn Task>)> = Vec::new();
        let mut retired: Vec<MeshHandle> = Vec::new();

        {
            let mut guard = world.lock();
            let store = &mut *guard;

            for offset in &self.offsets {
                let key = center.offset(*offset);
                if store.map.contains(key) {
                    continue;
                }
                let handle = match store.insert_chunk(key) {
                    Ok((handle, _)) => handle,
                    Err(err) => {
                        error!("Cannot stream in chunk {:?}: {}", key, err);
                        break;
                    }
                };
                if let Some(chunk) = store.chunk_by_handle_mut(handle) {
                    chunk.state = ChunkState::Generating;
                }
                tasks.push((
                    Submission::Generation(key, handle),
                    Box::new(ChunkGenerationTask::new(Arc::clone(world), handle, key)) as Box<dyn Task>,
                ));
                report.requested += 1;
            }

            let mut removals = Vec::new();
            for (key, handle) in store.map.iter() {
                if key.distance_squared(center) > radius_squared {
                    removals.push(key);
                    continue;
                }
                let Some(chunk) = store.pool.get_mut(handle) else {
                    continue;
                };
                if !chunk.needs_meshing || chunk.state != ChunkState::Idle {
                    continue;
                }
                if chunk.has_voxels() {
                    chunk.state = ChunkState::Meshing;
                    tasks.push((
                        Submission::Mesh(handle),
                        Box::new(ChunkMeshGenerationTask::new(Arc::clone(world), handle)) as Box<dyn Task>,
                    ));
                    report.mesh_tasks += 1;
                } else {
                    chunk.needs_meshing = false;
                    retired.extend(chunk.mesh.take());
                }
            }

            for key in removals {
                retired.extend(store.remove_chunk(key));
                store.mark_neighbors_dirty(key);
                report.removed += 1;
            }
        }

        let mut refused = Vec::new();
        let mut queued = tasks.into_iter();
        for (submission, task) in queued.by_ref() {
            if !submitter.publish_task(task) {
                refused.push(submission);
                break;
            }
        }
        refused.extend(queued.map(|(submission, _)| submission));
        if !refused.is_empty() {
            warn!("Worker pool refused {} streaming tasks", refused.len());
            retired.extend(roll_back(world, &refused, &mut report));
        }

        report.retired_meshes = retired.len();
        for mesh in retired {
            mesh_service.release(mesh);
        }

        report
    }
}

/// Undoes the state changes made for tasks the worker pool never accepted.
///
/// # Returns
/// Meshes of chunks that were dropped, for release on the main thread.
fn roll_back(
    world: &World,
    refused: &[Submission],
    report: &mut StreamingReport,
) -> Vec<MeshHandle> {
    let mut store = world.lock();
    let mut retired = Vec::new();
    for submission in refused {
        match *submission {
            Submission::Generation(key, handle) => {
                retired.extend(store.remove_handle(key, handle));
                report.requested -= 1;
            }
            Submission::Mesh(handle) => {
                if let Some(chunk) = store.chunk_by_handle_mut(handle) {
                    chunk.state = ChunkState::Idle;
                    chunk.needs_meshing = true;
                }
                report.mesh_tasks -= 1;
            }
        }
    }
    retired
}

fn length_squared(offset: Vector3<i32>) -> i64 {
    let (x, y, z) = (offset.x as i64, offset.y as i64, offset.z as i64);
    x * x + y * y + z * z
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::rendering::InMemoryMeshService;
    use crate::engine_state::task_management::TaskManager;
    use crate::engine_state::voxels::chunk::VoxelBuffer;
    use crate::engine_state::voxels::terrain::EmptyTerrain;
    use crate::engine_state::voxels::voxel::VoxelType;

    /// A submitter whose pool is already shut down, so every task is refused.
    fn closed_submitter() -> TaskSubmitter {
        let mut manager = TaskManager::new(1).unwrap();
        let submitter = manager.submitter().clone();
        manager.shutdown();
        submitter
    }

    /// Registers an idle, dirty, solid chunk at `key`.
    fn load_solid(world: &World, key: ChunkKey) {
        let mut store = world.lock();
        store.insert_chunk(key).unwrap();
        let chunk = store.chunk_mut(key).unwrap();
        chunk.set_voxels(Some(Arc::new(VoxelBuffer::filled(VoxelType::STONE))));
        chunk.needs_meshing = true;
    }

    fn resident_keys(world: &World) -> Vec<ChunkKey> {
        world.lock().map.iter().map(|(key, _)| key).collect()
    }

    #[test]
    fn radius_two_loads_exactly_the_sphere() {
        let world = Arc::new(World::new(16, None, Arc::new(EmptyTerrain)));
        let submitter = TaskSubmitter::detached();
        let mut service = InMemoryMeshService::new();
        let mut controller = StreamingController::new();
        let origin = FixedOrigin::new(ChunkKey::new(0, 0, 0), 2);

        let report = controller.update(&world, &submitter, &origin, &mut service);

        assert_eq!(report.requested, 33);
        let keys = resident_keys(&world);
        assert_eq!(keys.len(), 33);
        assert!(keys
            .iter()
            .all(|key| key.distance_squared(ChunkKey::new(0, 0, 0)) <= 4));
        assert!(keys.contains(&ChunkKey::new(0, -2, 0)));
        assert!(!keys.contains(&ChunkKey::new(1, 1, 2)));
    }

    #[test]
    fn shrinking_the_radius_removes_the_outer_shell() {
        let world = Arc::new(World::new(16, None, Arc::new(EmptyTerrain)));
        let submitter = TaskSubmitter::detached();
        let mut service = InMemoryMeshService::new();
        let mut controller = StreamingController::new();
        let center = ChunkKey::new(5, -1, 2);

        controller.update(&world, &submitter, &FixedOrigin::new(center, 2), &mut service);
        let report = controller.update(&world, &submitter, &FixedOrigin::new(center, 1), &mut service);

        assert_eq!(report.removed, 33 - 7);
        assert_eq!(report.requested, 0);
        let keys = resident_keys(&world);
        assert_eq!(keys.len(), 7);
        assert!(keys.iter().all(|key| key.distance_squared(center) <= 1));
        assert_eq!(world.lock().pool.live_count(), 7);
    }

    #[test]
    fn new_chunks_start_generating() {
        let world = Arc::new(World::new(16, None, Arc::new(EmptyTerrain)));
        let submitter = TaskSubmitter::detached();
        let mut service = InMemoryMeshService::new();
        StreamingController::new().update(
            &world,
            &submitter,
            &FixedOrigin::new(ChunkKey::new(0, 0, 0), 0),
            &mut service,
        );
        let store = world.lock();
        assert_eq!(
            store.chunk(ChunkKey::new(0, 0, 0)).unwrap().state,
            ChunkState::Generating
        );
    }

    #[test]
    fn dirty_empty_chunks_retire_their_mesh() {
        let world = Arc::new(World::new(16, None, Arc::new(EmptyTerrain)));
        let submitter = TaskSubmitter::detached();
        let mut service = InMemoryMeshService::new();
        let key = ChunkKey::new(0, 0, 0);
        let mesh = service.upload(&[[0.0; 3]; 6], &[[0; 4]; 6]).unwrap();
        {
            let mut store = world.lock();
            store.insert_chunk(key).unwrap();
            let chunk = store.chunk_mut(key).unwrap();
            chunk.mesh = Some(mesh);
            chunk.needs_meshing = true;
        }

        let report = StreamingController::new().update(
            &world,
            &submitter,
            &FixedOrigin::new(key, 0),
            &mut service,
        );

        assert_eq!(report.retired_meshes, 1);
        assert_eq!(report.mesh_tasks, 0);
        assert_eq!(service.live_meshes(), 0);
        let store = world.lock();
        let chunk = store.chunk(key).unwrap();
        assert!(chunk.mesh.is_none());
        assert!(!chunk.needs_meshing);
    }

    #[test]
    fn busy_chunks_are_not_resubmitted() {
        let world = Arc::new(World::new(16, None, Arc::new(EmptyTerrain)));
        let submitter = TaskSubmitter::detached();
        let mut service = InMemoryMeshService::new();
        let key = ChunkKey::new(0, 0, 0);
        load_solid(&world, key);
        let origin = FixedOrigin::new(key, 0);
        let mut controller = StreamingController::new();

        assert_eq!(controller.update(&world, &submitter, &origin, &mut service).mesh_tasks, 1);
        assert_eq!(world.lock().chunk(key).unwrap().state, ChunkState::Meshing);
        // Still dirty, but a task is already in flight.
        assert_eq!(controller.update(&world, &submitter, &origin, &mut service).mesh_tasks, 0);
    }

    #[test]
    fn refused_tasks_are_rolled_back() {
        let world = Arc::new(World::new(16, None, Arc::new(EmptyTerrain)));
        let submitter = closed_submitter();
        let mut service = InMemoryMeshService::new();
        let meshed = ChunkKey::new(0, 0, 0);
        load_solid(&world, meshed);
        let mut controller = StreamingController::new();
        let origin = FixedOrigin::new(meshed, 1);

        let report = controller.update(&world, &submitter, &origin, &mut service);

        assert_eq!(report.requested, 0);
        assert_eq!(report.mesh_tasks, 0);
        let store = world.lock();
        // Refused generations leave nothing behind.
        assert_eq!(store.len(), 1);
        assert_eq!(store.pool.live_count(), 1);
        // The refused mesh leaves its chunk idle and dirty.
        let chunk = store.chunk(meshed).unwrap();
        assert_eq!(chunk.state, ChunkState::Idle);
        assert!(chunk.needs_meshing);
    }

    #[test]
    fn rolled_back_chunks_are_requested_again() {
        let world = Arc::new(World::new(16, None, Arc::new(EmptyTerrain)));
        let mut service = InMemoryMeshService::new();
        let mut controller = StreamingController::new();
        let origin = FixedOrigin::new(ChunkKey::new(0, 0, 0), 1);

        controller.update(&world, &closed_submitter(), &origin, &mut service);
        assert!(world.lock().is_empty());

        let report = controller.update(&world, &TaskSubmitter::detached(), &origin, &mut service);
        assert_eq!(report.requested, 7);
        assert_eq!(world.lock().len(), 7);
    }

    #[test]
    fn removing_a_chunk_dirties_its_neighbours() {
        let world = Arc::new(World::new(16, None, Arc::new(EmptyTerrain)));
        let submitter = TaskSubmitter::detached();
        let mut service = InMemoryMeshService::new();
        let center = ChunkKey::new(0, 0, 0);
        let edge = ChunkKey::new(1, 0, 0);
        for key in [center, edge, ChunkKey::new(2, 0, 0)] {
            load_solid(&world, key);
            let mut store = world.lock();
            let chunk = store.chunk_mut(key).unwrap();
            chunk.needs_meshing = false;
            chunk.mesh = Some(service.upload(&[[0.0; 3]; 6], &[[0; 4]; 6]).unwrap());
        }

        let report = StreamingController::new().update(
            &world,
            &submitter,
            &FixedOrigin::new(center, 1),
            &mut service,
        );

        assert_eq!(report.removed, 1);
        assert_eq!(report.retired_meshes, 1);
        assert_eq!(service.live_meshes(), 2);
        let store = world.lock();
        assert!(store.chunk(edge).unwrap().needs_meshing);
        assert!(!store.chunk(center).unwrap().needs_meshing);
    }

    #[test]
    fn offsets_are_sorted_nearest_first() {
        let mut controller = StreamingController::new();
        controller.refresh_offsets(3);
        let lengths: Vec<i64> = controller.offsets().iter().map(|o| length_squared(*o)).collect();
        assert_eq!(lengths[0], 0);
        assert!(lengths.windows(2).all(|pair| pair[0] <= pair[1]));
    }
}
