//! gpugrid-sim: Discrete-event simulation of a GPU grid
//!
//! This crate provides the simulated hardware:
//! - A discrete-event clock with cancellable events
//! - The per-node telemetry and thermal state machine
//! - The grid that owns the clock and dispatches events to nodes
//! - Completion handles for running tasks

pub mod clock;
pub mod completion;
pub mod grid;
pub mod node;

pub use clock::{Clock, EventId, SimEvent};
pub use completion::CompletionHandle;
pub use grid::GpuGrid;
pub use node::GpuNode;
