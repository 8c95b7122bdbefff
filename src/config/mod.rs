// src/config/mod.rs

//! Configuration loading and validation for taskmesh.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate the values the engine cannot run with (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{ConfigFile, PoolSection, SchedulerSection};
pub use validate::validate_config;
