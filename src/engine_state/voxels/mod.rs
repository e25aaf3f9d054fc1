//! # Voxel Engine Core
//!
//! This module holds the voxel data model and everything that decides which
//! chunks exist.
//!
//! ## Architecture
//!
//! * **Voxel**: voxel types, their colours, and the six cube faces
//! * **Chunk**: fixed-size cubes of voxels, the pool they are allocated from,
//!   and the position-keyed map that owns them
//! * **World**: the shared context holding map, pool, finalize queue and
//!   terrain behind one lock, plus the voxel edit entry points
//! * **Streaming**: loads and unloads chunks around a moving origin and
//!   queues re-meshing of dirty chunks
//! * **Terrain**: pluggable voxel generators
//! * **Tasks**: the background generation stage
//!
//! ## Data Flow
//!
//! 1. Streaming acquires a chunk and queues a generation task
//! 2. The generation task fills the chunk and queues a mesh task
//! 3. The mesh task pushes a finalize job
//! 4. The main thread uploads the mesh and attaches it to the chunk
//! 5. Edits mark chunks dirty and streaming queues step 3 again

pub mod chunk;
pub mod streaming;
pub mod tasks;
pub mod terrain;
pub mod voxel;
pub mod world;
