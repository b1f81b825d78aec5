//! gpugrid-scheduler: Telemetry-aware scheduler for gpugrid
//!
//! This crate provides scheduling logic for placing tasks on simulated nodes:
//! - Placement policies (FIFO and telemetry scoring)
//! - The pending queue, running map and finished history
//! - The `Cluster` control plane consumed by the API and the daemon

pub mod cluster;
pub mod placement;
pub mod scheduler;

pub use cluster::Cluster;
pub use placement::{policy_for, FifoPolicy, PlacementPolicy, ScoredPolicy};
pub use scheduler::Scheduler;
