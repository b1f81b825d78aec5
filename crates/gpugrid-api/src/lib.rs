//! gpugrid-api: REST API server for gpugrid
//!
//! This crate provides the REST API for interacting with the cluster:
//! - Task submission, listing and cancellation
//! - Cluster and node status
//! - Manual scheduling passes and node fault injection

pub mod rest;

pub use rest::create_router;
