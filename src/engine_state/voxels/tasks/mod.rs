//! # Voxel Task System
//!
//! Background tasks that produce voxel data.

pub mod chunk_generation_task;
pub mod discard_chunk_job;
