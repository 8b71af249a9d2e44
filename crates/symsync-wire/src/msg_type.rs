//! Message type tags
//!
//! The first byte of every envelope names what the payload is and how the
//! dispatcher treats it.

use std::fmt;

use symsync_core::{SyncError, SyncResult};

/// How the dispatcher handles a message type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MsgCategory {
    /// Connection setup, consumed by the connector
    Handshake,
    /// Answered directly to the requester, never broadcast
    PullRequest,
    /// Scene state, reconciled and forwarded by relays
    State,
    /// Scene events, forwarded unconditionally by relays
    Event,
    /// Operational diagnostics
    Diagnostic,
}

/// Sync message type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MsgType {
    // Handshake
    RegionName = 0x01,
    ActorId = 0x02,

    // Pull requests
    GetTerrain = 0x10,
    GetObjects = 0x11,

    // State
    Terrain = 0x20,
    NewObject = 0x21,
    UpdatedObject = 0x22,
    UpdatedBucketProperties = 0x23,
    RemovedObject = 0x24,
    LinkObject = 0x25,
    DelinkObject = 0x26,

    // Events
    NewScript = 0x40,
    UpdateScript = 0x41,
    ScriptReset = 0x42,
    ChatFromClient = 0x43,
    ChatFromWorld = 0x44,
    ChatBroadcast = 0x45,
    ObjectGrab = 0x46,
    ObjectGrabbing = 0x47,
    ObjectDeGrab = 0x48,
    Attach = 0x49,
    PhysicsCollision = 0x4A,

    // Diagnostics
    SyncStateReport = 0x60,
}

impl MsgType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(MsgType::RegionName),
            0x02 => Some(MsgType::ActorId),
            0x10 => Some(MsgType::GetTerrain),
            0x11 => Some(MsgType::GetObjects),
            0x20 => Some(MsgType::Terrain),
            0x21 => Some(MsgType::NewObject),
            0x22 => Some(MsgType::UpdatedObject),
            0x23 => Some(MsgType::UpdatedBucketProperties),
            0x24 => Some(MsgType::RemovedObject),
            0x25 => Some(MsgType::LinkObject),
            0x26 => Some(MsgType::DelinkObject),
            0x40 => Some(MsgType::NewScript),
            0x41 => Some(MsgType::UpdateScript),
            0x42 => Some(MsgType::ScriptReset),
            0x43 => Some(MsgType::ChatFromClient),
            0x44 => Some(MsgType::ChatFromWorld),
            0x45 => Some(MsgType::ChatBroadcast),
            0x46 => Some(MsgType::ObjectGrab),
            0x47 => Some(MsgType::ObjectGrabbing),
            0x48 => Some(MsgType::ObjectDeGrab),
            0x49 => Some(MsgType::Attach),
            0x4A => Some(MsgType::PhysicsCollision),
            0x60 => Some(MsgType::SyncStateReport),
            _ => None,
        }
    }

    /// Parse a type byte, failing with `UnknownMessageType`
    pub fn parse(b: u8) -> SyncResult<Self> {
        Self::from_byte(b).ok_or(SyncError::UnknownMessageType(b))
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    pub fn category(self) -> MsgCategory {
        match self {
            MsgType::RegionName | MsgType::ActorId => MsgCategory::Handshake,
            MsgType::GetTerrain | MsgType::GetObjects => MsgCategory::PullRequest,
            MsgType::Terrain
            | MsgType::NewObject
            | MsgType::UpdatedObject
            | MsgType::UpdatedBucketProperties
            | MsgType::RemovedObject
            | MsgType::LinkObject
            | MsgType::DelinkObject => MsgCategory::State,
            MsgType::NewScript
            | MsgType::UpdateScript
            | MsgType::ScriptReset
            | MsgType::ChatFromClient
            | MsgType::ChatFromWorld
            | MsgType::ChatBroadcast
            | MsgType::ObjectGrab
            | MsgType::ObjectGrabbing
            | MsgType::ObjectDeGrab
            | MsgType::Attach
            | MsgType::PhysicsCollision => MsgCategory::Event,
            MsgType::SyncStateReport => MsgCategory::Diagnostic,
        }
    }

    /// Structural updates that bypass the batcher
    pub fn is_special_update(self) -> bool {
        matches!(
            self,
            MsgType::NewObject | MsgType::RemovedObject | MsgType::LinkObject | MsgType::DelinkObject
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            MsgType::RegionName => "RegionName",
            MsgType::ActorId => "ActorID",
            MsgType::GetTerrain => "GetTerrain",
            MsgType::GetObjects => "GetObjects",
            MsgType::Terrain => "Terrain",
            MsgType::NewObject => "NewObject",
            MsgType::UpdatedObject => "UpdatedObject",
            MsgType::UpdatedBucketProperties => "UpdatedBucketProperties",
            MsgType::RemovedObject => "RemovedObject",
            MsgType::LinkObject => "LinkObject",
            MsgType::DelinkObject => "DelinkObject",
            MsgType::NewScript => "NewScript",
            MsgType::UpdateScript => "UpdateScript",
            MsgType::ScriptReset => "ScriptReset",
            MsgType::ChatFromClient => "ChatFromClient",
            MsgType::ChatFromWorld => "ChatFromWorld",
            MsgType::ChatBroadcast => "ChatBroadcast",
            MsgType::ObjectGrab => "ObjectGrab",
            MsgType::ObjectGrabbing => "ObjectGrabbing",
            MsgType::ObjectDeGrab => "ObjectDeGrab",
            MsgType::Attach => "Attach",
            MsgType::PhysicsCollision => "PhysicsCollision",
            MsgType::SyncStateReport => "SyncStateReport",
        }
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msg_type_byte_roundtrip() {
        for b in 0u8..=0xFF {
            if let Some(t) = MsgType::from_byte(b) {
                assert_eq!(t.to_byte(), b);
            }
        }
    }

    #[test]
    fn test_unknown_msg_type() {
        assert!(matches!(
            MsgType::parse(0xEE),
            Err(SyncError::UnknownMessageType(0xEE))
        ));
    }

    #[test]
    fn test_categories() {
        assert_eq!(MsgType::GetObjects.category(), MsgCategory::PullRequest);
        assert_eq!(MsgType::UpdatedBucketProperties.category(), MsgCategory::State);
        assert_eq!(MsgType::ObjectDeGrab.category(), MsgCategory::Event);
        assert_eq!(MsgType::ActorId.category(), MsgCategory::Handshake);
        assert!(MsgType::LinkObject.is_special_update());
        assert!(!MsgType::UpdatedObject.is_special_update());
    }
}
