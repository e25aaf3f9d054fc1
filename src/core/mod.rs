//! # Core Module
//!
//! Fundamental building blocks shared by every engine subsystem.
//!
//! ## Key Components
//! - `hashing`: avalanche-mixed hashing for position-keyed tables
//! - `error`: the crate-wide `EngineError`
//! - `lock_unpoisoned`: mutex access that survives a panicked worker

pub mod error;
pub mod hashing;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use error::EngineError;

/// Locks `mutex`, recovering the guard if a previous holder panicked.
///
/// Worker tasks run untrusted generator and meshing code. A panic there must
/// not leave the render thread unable to touch the world, so poisoning is
/// treated as recoverable everywhere in the engine.
pub fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
