// src/config/model.rs

use serde::Deserialize;

use crate::scheduler::SchedulerOptions;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [scheduler]
/// max_retries = 2
/// event_capacity = 64
///
/// [pool]
/// workers = 4
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    /// Scheduling behaviour from `[scheduler]`.
    #[serde(default)]
    pub scheduler: SchedulerSection,

    /// Local pool sizing from `[pool]`.
    #[serde(default)]
    pub pool: PoolSection,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            scheduler: SchedulerSection::default(),
            pool: PoolSection::default(),
        }
    }
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    /// Re-dispatches allowed per node after worker loss. The total dispatch
    /// budget per node is `1 + max_retries`.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Capacity of each run's event channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_max_retries() -> u32 {
    2
}

fn default_event_capacity() -> usize {
    64
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl SchedulerSection {
    pub fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            max_retries: self.max_retries,
            event_capacity: self.event_capacity,
        }
    }
}

/// `[pool]` section.
///
/// Sizing for the in-process worker pool. Named workers win over `workers`
/// when both are given; `workers = n` produces `local-0` .. `local-{n-1}`.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolSection {
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Explicit worker names, overriding `workers`.
    #[serde(default)]
    pub worker_names: Vec<String>,
}

fn default_workers() -> usize {
    4
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            worker_names: Vec::new(),
        }
    }
}

impl PoolSection {
    /// Effective worker id list for building a local pool.
    pub fn worker_ids(&self) -> Vec<String> {
        if !self.worker_names.is_empty() {
            self.worker_names.clone()
        } else {
            (0..self.workers).map(|i| format!("local-{i}")).collect()
        }
    }
}
