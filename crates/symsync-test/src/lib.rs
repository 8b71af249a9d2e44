//! Symsync Test Harness - Multi-node sync scenarios
//!
//! This crate provides:
//! - An in-memory scene implementing the scene collaborator
//! - Star clusters of live nodes over in-memory links
//! - End-to-end scenarios for reconciliation, routing and special updates

pub mod memory_scene;
pub mod cluster;
pub mod integration;

pub use memory_scene::*;
pub use cluster::*;
pub use integration::*;
