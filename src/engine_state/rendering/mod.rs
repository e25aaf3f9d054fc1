//! Rendering side of the voxel engine core.
//!
//! The engine never draws anything itself. It turns voxel data into flat
//! triangle lists (`meshing`), moves those lists from the workers to the main
//! thread (`tasks`), and hands them to a [`MeshService`] for upload. Whatever
//! owns the graphics context implements that trait.
//!
//! The graphics context is assumed not to be thread-safe: every
//! `MeshService` call is made from the thread that drives
//! `EngineState::update`.

use std::collections::HashMap;

use log::warn;

pub mod meshing;
pub mod tasks;
mod vertex;

pub use vertex::Vertex;

/// Opaque handle to an uploaded, renderable mesh.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u64);

/// GPU mesh upload service.
///
/// Called only from the main thread.
pub trait MeshService {
    /// Uploads a flat, non-indexed triangle list.
    ///
    /// # Arguments
    /// * `positions` - One chunk-local position per vertex
    /// * `colors` - One RGBA colour per vertex, same length as `positions`
    ///
    /// # Returns
    /// A handle to the renderable, or `None` if the upload failed.
    fn upload(&mut self, positions: &[[f32; 3]], colors: &[[u8; 4]]) -> Option<MeshHandle>;

    /// Frees a renderable previously returned by [`MeshService::upload`].
    fn release(&mut self, handle: MeshHandle);
}

/// A `MeshService` that keeps meshes in host memory.
///
/// Used by the headless demo, and handy anywhere the pipeline must run
/// without a graphics context.
#[derive(Default, Debug)]
pub struct InMemoryMeshService {
    meshes: HashMap<MeshHandle, usize>,
    next_handle: u64,
    uploads: usize,
    releases: usize,
}

impl InMemoryMeshService {
    /// Creates a service with no meshes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Meshes uploaded and not yet released.
    pub fn live_meshes(&self) -> usize {
        self.meshes.len()
    }

    /// Vertex count of a live mesh.
    pub fn vertex_count(&self, handle: MeshHandle) -> Option<usize> {
        self.meshes.get(&handle).copied()
    }

    /// Total vertices across live meshes.
    pub fn total_vertices(&self) -> usize {
        self.meshes.values().sum()
    }

    /// Successful uploads so far.
    pub fn uploads(&self) -> usize {
        self.uploads
    }

    /// Releases of known meshes so far.
    pub fn releases(&self) -> usize {
        self.releases
    }
}

impl MeshService for InMemoryMeshService {
    fn upload(&mut self, positions: &[[f32; 3]], colors: &[[u8; 4]]) -> Option<MeshHandle> {
        if positions.is_empty() || positions.len() != colors.len() {
            warn!(
                "Rejecting mesh upload with {} positions and {} colors",
                positions.len(),
                colors.len()
            );
            return None;
        }
        self.next_handle += 1;
        let handle = MeshHandle(self.next_handle);
        self.meshes.insert(handle, positions.len());
        self.uploads += 1;
        Some(handle)
    }

    fn release(&mut self, handle: MeshHandle) {
        if self.meshes.remove(&handle).is_some() {
            self.releases += 1;
        } else {
            warn!("Release of unknown mesh {:?}", handle);
        }
    }
}
