// src/errors.rs

//! Crate-wide error types and aliases.

use thiserror::Error;

use crate::types::{NodeId, WorkerId};

#[derive(Error, Debug)]
pub enum TaskmeshError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Cycle detected in task graph involving node {0}")]
    CyclicGraph(NodeId),

    #[error("Node {node} references dependency {missing} that is not in the graph")]
    MalformedGraph { node: NodeId, missing: NodeId },

    #[error("Node {node} failed: {reason}")]
    ExecutionFailure { node: NodeId, reason: String },

    #[error("Worker {0} is unavailable")]
    WorkerUnavailable(WorkerId),

    #[error("Run was cancelled")]
    Cancelled,

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TaskmeshError>;
