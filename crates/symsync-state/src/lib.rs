//! Symsync State Engine - Per-property synchronization state
//!
//! This crate implements the per-property sync state:
//! - Property descriptor registry and bucket codecs
//! - Per-property last-writer-wins records
//! - Per-object reconciliation of local and remote writes
//! - The table of objects known to the sync engine

pub mod object;
pub mod registry;
pub mod codec;
pub mod sync_info;
pub mod reconcile;
pub mod manager;

pub use object::*;
pub use registry::*;
pub use codec::*;
pub use sync_info::*;
pub use reconcile::*;
pub use manager::*;
