//! # Voxel Module
//!
//! The smallest unit of the world: a typed cell, and the six faces a solid
//! cell can expose to its neighbours.

pub mod face;
pub mod voxel_type;

pub use face::Face;
pub use voxel_type::VoxelType;
