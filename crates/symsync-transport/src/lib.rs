//! Symsync Transport Layer - byte streams under the connectors
//!
//! This crate provides:
//! - Per-connection reader and writer tasks over any async byte stream
//! - TCP listener and dialer
//! - In-memory links for running several nodes in one process

pub mod connection;
pub mod memory;
pub mod tcp;

pub use connection::*;
pub use memory::*;
pub use tcp::*;
