//! Symsync Runtime - The sync node
//!
//! This crate wires the engine together:
//! - Configuration and log setup
//! - The node: local change intake, heartbeat flush, connector lifecycle
//! - Outbound batching with single-flight flush
//! - Inbound dispatch of handshake, pull, state and event messages
//! - Scene collaborator trait and propagated events
//! - Statistics and operational commands

pub mod config;
pub mod logging;
pub mod stats;
pub mod scene;
pub mod events;
pub mod batcher;
pub mod node;
mod dispatcher;
pub mod commands;

pub use config::*;
pub use logging::*;
pub use stats::*;
pub use scene::*;
pub use events::*;
pub use batcher::*;
pub use node::*;
pub use commands::*;
