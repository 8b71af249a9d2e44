//! Error types for the sync engine

use thiserror::Error;

use crate::{ObjectId, Property};

/// Core sync errors
#[derive(Error, Debug)]
pub enum SyncError {
    // Wire errors
    #[error("Buffer too short: expected {expected}, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("Unknown message type: {0}")]
    UnknownMessageType(u8),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Missing payload field: {0}")]
    MissingField(String),

    #[error("Payload field {field} has type {actual}, expected {expected}")]
    FieldType {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    // Registry errors
    #[error("Unknown property: {0}")]
    UnknownProperty(String),

    #[error("Unknown bucket: {0}")]
    UnknownBucket(String),

    #[error("Property {0} is not assigned to any bucket")]
    UnmappedProperty(Property),

    #[error("Property {property} is assigned to both {first} and {second}")]
    DuplicateProperty {
        property: Property,
        first: String,
        second: String,
    },

    // State errors
    #[error("No sync info for object {0}")]
    UnknownObject(ObjectId),

    #[error("Object {0} has no physics actor")]
    MissingPhysicsActor(ObjectId),

    // Transport errors
    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed")]
    ConnectionClosed,

    // Configuration errors
    #[error("Missing actor id")]
    MissingActorId,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Sync node is inert")]
    Inactive,
}

impl SyncError {
    /// Variant name, free of any peer-supplied text
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::BufferTooShort { .. } => "BufferTooShort",
            SyncError::UnknownMessageType(_) => "UnknownMessageType",
            SyncError::InvalidPayload(_) => "InvalidPayload",
            SyncError::MissingField(_) => "MissingField",
            SyncError::FieldType { .. } => "FieldType",
            SyncError::UnknownProperty(_) => "UnknownProperty",
            SyncError::UnknownBucket(_) => "UnknownBucket",
            SyncError::UnmappedProperty(_) => "UnmappedProperty",
            SyncError::DuplicateProperty { .. } => "DuplicateProperty",
            SyncError::UnknownObject(_) => "UnknownObject",
            SyncError::MissingPhysicsActor(_) => "MissingPhysicsActor",
            SyncError::TransportError(_) => "TransportError",
            SyncError::ConnectionFailed(_) => "ConnectionFailed",
            SyncError::ConnectionClosed => "ConnectionClosed",
            SyncError::MissingActorId => "MissingActorId",
            SyncError::InvalidConfig(_) => "InvalidConfig",
            SyncError::UnknownCommand(_) => "UnknownCommand",
            SyncError::Inactive => "Inactive",
        }
    }

    /// Transient errors are absorbed at the dispatcher; the rest stop activation
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            SyncError::MissingActorId
                | SyncError::InvalidConfig(_)
                | SyncError::UnmappedProperty(_)
                | SyncError::DuplicateProperty { .. }
        )
    }
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
