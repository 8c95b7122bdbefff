// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::ConfigFile;
use crate::errors::{Result, TaskmeshError};

/// Check the configuration for values the engine cannot run with.
///
/// - The event channel needs at least capacity 1.
/// - The pool must yield at least one worker.
/// - Worker names must be unique and non-empty.
pub fn validate_config(config: &ConfigFile) -> Result<()> {
    if config.scheduler.event_capacity == 0 {
        return Err(TaskmeshError::ConfigError(
            "scheduler.event_capacity must be at least 1".to_string(),
        ));
    }

    let worker_ids = config.pool.worker_ids();
    if worker_ids.is_empty() {
        return Err(TaskmeshError::ConfigError(
            "pool must define at least one worker".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for id in &worker_ids {
        if id.is_empty() {
            return Err(TaskmeshError::ConfigError(
                "pool.worker_names contains an empty name".to_string(),
            ));
        }
        if !seen.insert(id.as_str()) {
            return Err(TaskmeshError::ConfigError(format!(
                "pool.worker_names contains duplicate name {id:?}"
            )));
        }
    }

    Ok(())
}
