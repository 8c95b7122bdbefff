// src/logging.rs

//! Logging setup for `taskmesh` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log filter:
//! 1. `TASKMESH_LOG` environment variable (e.g. "info", "taskmesh=debug")
//! 2. default to `info`

use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialise the global logging subscriber.
///
/// Safe to call once at startup; calling it a second time panics, which is
/// why library code never calls this on its own.
pub fn init_logging() -> Result<()> {
    let filter =
        EnvFilter::try_from_env("TASKMESH_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    Ok(())
}
