//! Symsync Wire - Sync message envelope
//!
//! A message is a type tag plus a key/value payload:
//! - Message type (1 byte)
//! - Payload length (4 bytes, LE)
//! - Payload (JSON encoded key/value map)

pub mod msg_type;
pub mod payload;
pub mod message;

pub use msg_type::*;
pub use payload::*;
pub use message::*;
