//! Identity types for the sync overlay
//!
//! Actors are named by opaque strings chosen by configuration; objects by
//! 128-bit UUIDs shared with the scene graph.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::SyncError;

/// Actor identity - one per running node, immutable for its lifetime
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        ActorId(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for ActorId {
    fn from(id: &str) -> Self {
        ActorId::new(id)
    }
}

impl From<String> for ActorId {
    fn from(id: String) -> Self {
        ActorId(id)
    }
}

impl fmt::Debug for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Actor({})", self.0)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Object identity - a replicated scene object (part)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub Uuid);

impl ObjectId {
    pub const NIL: ObjectId = ObjectId(Uuid::nil());

    /// Generate a fresh random id
    #[inline]
    pub fn random() -> Self {
        ObjectId(Uuid::new_v4())
    }

    #[inline]
    pub fn from_u128(v: u128) -> Self {
        ObjectId(Uuid::from_u128(v))
    }

    #[inline]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    #[inline]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl From<Uuid> for ObjectId {
    fn from(id: Uuid) -> Self {
        ObjectId(id)
    }
}

impl FromStr for ObjectId {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(ObjectId)
            .map_err(|e| SyncError::InvalidPayload(format!("bad object id {:?}: {}", s, e)))
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Connector number - monotonically increasing per node
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ConnectorNum(pub u32);

impl ConnectorNum {
    #[inline]
    pub fn next(self) -> Self {
        ConnectorNum(self.0.wrapping_add(1))
    }
}

impl fmt::Debug for ConnectorNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Connector#{}", self.0)
    }
}

impl fmt::Display for ConnectorNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Event sequence number - monotonically increasing per sending actor
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct EventSeq(pub u64);

impl EventSeq {
    #[inline]
    pub fn next(self) -> Self {
        EventSeq(self.0.wrapping_add(1))
    }

    /// True if `self` directly follows `prev` in a gap-free stream
    #[inline]
    pub fn follows(self, prev: EventSeq) -> bool {
        self.0 == prev.0.wrapping_add(1)
    }
}
