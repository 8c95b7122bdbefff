// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::config::model::ConfigFile;
use crate::config::validate::validate_config;
use crate::errors::Result;

/// Load a configuration file from the given path.
///
/// This only performs TOML deserialization; use [`load_and_validate`] to
/// also check the values.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading config file at {path:?}"))?;

    let config: ConfigFile = toml::from_str(&contents)?;
    debug!(path = %path.display(), "loaded configuration");
    Ok(config)
}

/// Load a configuration file and validate it. The recommended entry point.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let config = load_from_path(&path)?;
    validate_config(&config)?;
    Ok(config)
}

/// Default config location: `Taskmesh.toml` in the working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Taskmesh.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_partial_config_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[scheduler]\nmax_retries = 5\n").unwrap();

        let config = load_and_validate(file.path()).unwrap();
        assert_eq!(config.scheduler.max_retries, 5);
        assert_eq!(config.scheduler.event_capacity, 64);
        assert_eq!(config.pool.worker_ids().len(), 4);
    }

    #[test]
    fn named_workers_override_count() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "[pool]\nworkers = 8\nworker_names = [\"a\", \"b\"]\n"
        )
        .unwrap();

        let config = load_and_validate(file.path()).unwrap();
        assert_eq!(config.pool.worker_ids(), vec!["a", "b"]);
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[scheduler\nmax_retries = 5\n").unwrap();
        assert!(load_from_path(file.path()).is_err());
    }
}
