//! # Engine Errors
//!
//! The error type shared by every fallible constructor in the crate.
//!
//! Per-frame operations (streaming, meshing, edits) never return these to the
//! caller. They log the failure and hand back an absent value instead, so a
//! bad frame degrades to "chunk stays unrendered" rather than a crash.

use std::io;

use thiserror::Error;

/// Errors surfaced by engine setup and by the chunk pool.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The allocator refused memory for a new block of chunk slots.
    #[error("failed to allocate a chunk pool block of {block_size} slots")]
    PoolAllocation {
        /// Number of slots the block would have held
        block_size: usize,
    },

    /// The pool already holds the configured maximum number of blocks.
    #[error("chunk pool exhausted ({max_blocks} blocks in use)")]
    PoolExhausted {
        /// The configured block cap
        max_blocks: usize,
    },

    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] io::Error),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configuration document could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// Reading a file failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}
