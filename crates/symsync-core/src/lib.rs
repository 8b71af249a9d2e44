//! Symsync Core - Fundamental types and primitives
//!
//! This crate defines the core types used throughout the sync overlay:
//! - Identifiers (ActorId, ObjectId, ConnectorNum, EventSeq)
//! - Sync timestamps
//! - The replicable property enumeration
//! - Property and payload values
//! - The error taxonomy

pub mod id;
pub mod time;
pub mod property;
pub mod value;
pub mod error;

pub use id::*;
pub use time::*;
pub use property::*;
pub use value::*;
pub use error::*;
