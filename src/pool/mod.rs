// src/pool/mod.rs

//! Worker pool abstraction.
//!
//! The scheduler talks to a [`WorkerPool`] instead of a concrete transport.
//! This is the seam for the external cluster: a distributed deployment
//! implements the trait over its own transport and membership service, while
//! [`LocalWorkerPool`] runs calls on the local Tokio runtime. Tests can
//! provide scripted pools that never execute anything.
//!
//! - [`backend`] defines the trait and the [`Worker`] snapshot type.
//! - [`local`] contains the in-process implementation.

pub mod backend;
pub mod local;

pub use backend::{PoolFuture, Worker, WorkerPool};
pub use local::LocalWorkerPool;
