//! gpugrid-core: Core types for the gpugrid simulator
//!
//! This crate provides the fundamental types used throughout gpugrid:
//! - Task requests, task records and completion outcomes
//! - GPU catalog, node state and status snapshots
//! - Configuration types
//! - Error handling

pub mod config;
pub mod error;
pub mod gpu;
pub mod task;

pub use config::*;
pub use error::*;
pub use gpu::*;
pub use task::*;
