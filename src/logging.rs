//! File-backed `tracing` setup for the binary

use crate::error::{BlearnError, BlearnResult};
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Log to `path` (truncated), without colors.
///
/// The level is `info`, or `debug` when `debug` is set; `RUST_LOG` takes
/// precedence over both.
pub fn init_file_logging(path: &Path, debug: bool) -> BlearnResult<()> {
    let file = File::create(path)?;
    let default_level = if debug { "blearn=debug" } else { "blearn=info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|e| BlearnError::Internal(format!("logger already set: {e}")))?;
    Ok(())
}
