//! # Engine Configuration
//!
//! Tunables read once at startup, from JSON or from defaults.
//!
//! ```json
//! {
//!     "worker_threads": 6,
//!     "streaming_radius": 10,
//!     "pool_block_size": 64,
//!     "max_pool_blocks": null
//! }
//! ```
//!
//! Missing fields take their default.

use std::fs;
use std::path::Path;
use std::thread;

use log::info;
use serde::{Deserialize, Serialize};

use crate::core::EngineError;
use crate::engine_state::voxels::chunk::chunk_pool::CHUNK_POOL_BLOCK_SIZE;

/// Default streaming radius in chunks.
pub const DEFAULT_STREAMING_RADIUS: i32 = 10;

/// Startup tunables for [`crate::engine_state::EngineState`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Background worker threads
    pub worker_threads: usize,
    /// Radius, in chunks, of the streamed sphere
    pub streaming_radius: i32,
    /// Chunk slots per pool block
    pub pool_block_size: usize,
    /// Cap on pool blocks, unbounded when absent
    pub max_pool_blocks: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            worker_threads: default_worker_threads(),
            streaming_radius: DEFAULT_STREAMING_RADIUS,
            pool_block_size: CHUNK_POOL_BLOCK_SIZE,
            max_pool_blocks: None,
        }
    }
}

/// One worker per core, leaving a core for the main thread.
fn default_worker_threads() -> usize {
    thread::available_parallelism()
        .map(|count| count.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

impl EngineConfig {
    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path.as_ref())?;
        info!("Loaded configuration from {}", path.as_ref().display());
        Self::from_json_str(&contents)
    }

    /// Checks every value is in range.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.worker_threads == 0 {
            return Err(EngineError::InvalidConfig(
                "worker_threads must be at least 1".to_string(),
            ));
        }
        if self.streaming_radius < 0 {
            return Err(EngineError::InvalidConfig(format!(
                "streaming_radius must not be negative, got {}",
                self.streaming_radius
            )));
        }
        if self.pool_block_size == 0 {
            return Err(EngineError::InvalidConfig(
                "pool_block_size must be at least 1".to_string(),
            ));
        }
        if self.max_pool_blocks == Some(0) {
            return Err(EngineError::InvalidConfig(
                "max_pool_blocks must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.worker_threads >= 1);
        assert_eq!(config.streaming_radius, 10);
        assert_eq!(config.pool_block_size, 64);
        assert_eq!(config.max_pool_blocks, None);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = EngineConfig::from_json_str(r#"{ "streaming_radius": 4 }"#).unwrap();
        assert_eq!(config.streaming_radius, 4);
        assert_eq!(config.pool_block_size, CHUNK_POOL_BLOCK_SIZE);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        for json in [
            r#"{ "worker_threads": 0 }"#,
            r#"{ "streaming_radius": -1 }"#,
            r#"{ "pool_block_size": 0 }"#,
            r#"{ "max_pool_blocks": 0 }"#,
        ] {
            assert!(matches!(
                EngineConfig::from_json_str(json),
                Err(EngineError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            EngineConfig::from_json_str("{ not json"),
            Err(EngineError::ConfigParse(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            EngineConfig::load("/nonexistent/voxel-world.json"),
            Err(EngineError::Io(_))
        ));
    }
}
