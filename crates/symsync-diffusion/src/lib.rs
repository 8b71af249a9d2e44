//! Symsync Diffusion - how updates fan out over the overlay
//!
//! Nodes form a star: one relay in the middle, leaves around it. A leaf sends
//! its own changes to every connector it has. A relay sends its own changes
//! the same way and re-sends what it receives to everyone except the actor
//! that wrote it.
//!
//! Key concepts:
//! - Connector: one link to one remote actor, with a non-blocking outgoing queue
//! - Connector set: copy-on-write, so readers never block writers
//! - Router: role-aware destination choice with echo suppression

pub mod connector;
pub mod router;
pub mod topology;

pub use connector::*;
pub use router::*;
pub use topology::*;
