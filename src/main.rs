//! # Voxel World Demo Entry Point
//!
//! Runs the engine headless for a fixed number of frames and logs what each
//! frame did. Pass a JSON config path as the first argument to override the
//! defaults.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --release -- config.json
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use log::error;

fn main() -> ExitCode {
    voxel_world::init_logging();

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    match voxel_world::run(config_path.as_deref()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            eprintln!("voxel-world: {}", err);
            ExitCode::FAILURE
        }
    }
}
