//! # Task System Core Traits
//!
//! This module defines the two kinds of deferred work the engine schedules.
//!
//! ## Core Components
//! - `Task`: a unit of CPU work run on a background worker
//! - `MainThreadJob`: a unit of work that must run on the main thread, drained
//!   once per frame from the finalize queue
//!
//! ## Pipeline
//! 1. A generation `Task` fills a chunk's voxels on a worker
//! 2. It publishes a mesh `Task` to the same pool
//! 3. The mesh task builds triangles and pushes a `MainThreadJob`
//! 4. The main thread runs the job, which uploads through the mesh service
//!
//! Each stage is only created by the stage before it, which is what orders
//! generation before meshing before upload.

use super::TaskSubmitter;
use crate::engine_state::rendering::MeshService;
use crate::engine_state::voxels::world::World;

/// A unit of work executed on a background worker.
///
/// Tasks own everything they need and are consumed by running them. They
/// must not block on the main thread.
pub trait Task: Send {
    /// Runs the task.
    ///
    /// # Arguments
    /// * `submitter` - The pool this task is running on, for publishing the
    ///   next pipeline stage
    fn process(self: Box<Self>, submitter: &TaskSubmitter);
}

impl<F> Task for F
where
    F: FnOnce(&TaskSubmitter) + Send,
{
    fn process(self: Box<Self>, submitter: &TaskSubmitter) {
        (*self)(submitter)
    }
}

/// A unit of work that touches thread-affine resources.
///
/// Jobs are pushed by workers and run exactly once by the main thread, the
/// only thread allowed to call into the [`MeshService`].
pub trait MainThreadJob: Send {
    /// Runs the job on the main thread.
    ///
    /// # Arguments
    /// * `world` - The world the job's chunk lives in
    /// * `mesh_service` - The GPU upload service
    fn finalize(self: Box<Self>, world: &World, mesh_service: &mut dyn MeshService);
}
