//! # Rendering Tasks
//!
//! The meshing stage of the chunk pipeline and the main-thread job it hands
//! its result to.

pub mod chunk_mesh_generation_task;
pub mod mesh_finalize_job;
