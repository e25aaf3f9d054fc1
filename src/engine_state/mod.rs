//! # Engine State Module
//!
//! The frame-level driver of the voxel engine core.
//!
//! ## Key Components
//!
//! * `EngineState` - Owns every subsystem and runs them once per frame
//! * `config` - Startup tunables
//! * `rendering` - Mesh service seam, vertex format, mesh builder and tasks
//! * `task_management` - Worker pool and the main-thread finalize queue
//! * `voxels` - Voxel types, chunks, the world context, streaming and terrain
//!
//! ## Frame
//!
//! `EngineState::update` must be called from the thread that owns the mesh
//! service. Each call:
//! 1. runs a streaming pass around the given origin, queueing generation and
//!    mesh tasks,
//! 2. drains every finalize job that workers have completed so far, uploading
//!    meshes through the mesh service.
//!
//! It never waits for a worker. Whatever hasn't finished is picked up on a
//! later frame.

use std::sync::Arc;

use cgmath::Point3;
use log::{debug, info};

use crate::core::EngineError;
use rendering::MeshService;
use task_management::TaskManager;
use voxels::streaming::{StreamingController, StreamingOrigin};
use voxels::terrain::TerrainGenerator;
use voxels::voxel::VoxelType;
use voxels::world::World;

pub mod config;
pub mod rendering;
pub mod task_management;
pub mod voxels;

pub use config::EngineConfig;

/// What one frame did.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Chunks acquired and sent for generation
    pub chunks_requested: usize,
    /// Chunks released for leaving the radius
    pub chunks_removed: usize,
    /// Mesh tasks submitted
    pub mesh_tasks: usize,
    /// Meshes released without replacement
    pub meshes_retired: usize,
    /// Finalize jobs run on this frame
    pub jobs_finalized: usize,
    /// Chunks resident after the frame
    pub resident_chunks: usize,
    /// Tasks queued or running on the workers after the frame
    pub pending_tasks: usize,
}

/// The main state container for the voxel engine core.
///
/// Generic over the mesh service so callers keep direct, typed access to it
/// through [`EngineState::mesh_service`].
pub struct EngineState<M: MeshService> {
    world: Arc<World>,
    task_manager: TaskManager,
    streaming: StreamingController,
    mesh_service: M,
    config: EngineConfig,
    shut_down: bool,
}

impl<M: MeshService> EngineState<M> {
    /// Creates the world and starts the worker pool.
    ///
    /// # Arguments
    /// * `config` - Validated before anything is started
    /// * `terrain` - Generator for newly streamed chunks
    /// * `mesh_service` - Upload service, used only from the calling thread
    ///
    /// # Errors
    /// `InvalidConfig` or `WorkerSpawn`.
    pub fn new(
        config: EngineConfig,
        terrain: Arc<dyn TerrainGenerator>,
        mesh_service: M,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let world = Arc::new(World::new(
            config.pool_block_size,
            config.max_pool_blocks,
            terrain,
        ));
        let task_manager = TaskManager::new(config.worker_threads)?;
        info!(
            "Engine started: {} workers, streaming radius {}",
            task_manager.worker_count(),
            config.streaming_radius
        );

        Ok(EngineState {
            world,
            task_manager,
            streaming: StreamingController::new(),
            mesh_service,
            config,
            shut_down: false,
        })
    }

    /// Runs one frame: a streaming pass, then a finalize drain.
    pub fn update(&mut self, origin: &dyn StreamingOrigin) -> FrameStats {
        if self.shut_down {
            return FrameStats::default();
        }

        let report = self.streaming.update(
            &self.world,
            self.task_manager.submitter(),
            origin,
            &mut self.mesh_service,
        );
        let jobs_finalized = self.process_main_thread_jobs();

        FrameStats {
            chunks_requested: report.requested,
            chunks_removed: report.removed,
            mesh_tasks: report.mesh_tasks,
            meshes_retired: report.retired_meshes,
            jobs_finalized,
            resident_chunks: self.world.lock().len(),
            pending_tasks: self.task_manager.submitter().pending(),
        }
    }

    /// Runs every finalize job currently queued.
    ///
    /// Jobs pushed while draining are run too; the drain stops the first time
    /// the queue is seen empty.
    ///
    /// # Returns
    /// The number of jobs run.
    pub fn process_main_thread_jobs(&mut self) -> usize {
        let mut count = 0;
        while let Some(job) = self.world.finalize_queue().pop() {
            job.finalize(&self.world, &mut self.mesh_service);
            count += 1;
        }
        count
    }

    /// The shared world context.
    pub fn world(&self) -> &Arc<World> {
        &self.world
    }

    /// The mesh service meshes are uploaded through.
    pub fn mesh_service(&self) -> &M {
        &self.mesh_service
    }

    /// The configuration the engine was started with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Tasks queued or running on the workers.
    pub fn pending_tasks(&self) -> usize {
        self.task_manager.submitter().pending()
    }

    /// See [`World::place_voxel`].
    pub fn place_voxel(&self, world_position: Point3<i32>, voxel_type: VoxelType) -> bool {
        self.world.place_voxel(world_position, voxel_type)
    }

    /// See [`World::break_voxel`].
    pub fn break_voxel(&self, world_position: Point3<i32>) -> bool {
        self.world.break_voxel(world_position)
    }

    /// See [`World::query_voxel`].
    pub fn query_voxel(&self, world_position: Point3<i32>) -> VoxelType {
        self.world.query_voxel(world_position)
    }

    /// Stops the engine.
    ///
    /// Joins the workers (queued tasks are discarded), discards finalize jobs
    /// that were never drained, releases the mesh of every resident chunk and
    /// frees the chunk pool. Later calls do nothing.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        let discarded_tasks = self.task_manager.shutdown();
        let discarded_jobs = self.world.finalize_queue().clear();

        let meshes = {
            let mut store = self.world.lock();
            let meshes = store.clear();
            store.pool.shutdown();
            meshes
        };
        let released = meshes.len();
        for mesh in meshes {
            self.mesh_service.release(mesh);
        }

        debug!(
            "Discarded {} tasks and {} finalize jobs",
            discarded_tasks, discarded_jobs
        );
        info!("Engine shut down, released {} meshes", released);
    }
}

impl<M: MeshService> Drop for EngineState<M> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
