//! Propagated scene events
//!
//! Events are not state: they are delivered once on every node and never
//! reconciled. Each carries its originating actor and a per-actor sequence
//! number.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use symsync_core::{ActorId, EventSeq, ObjectId, SyncError, SyncResult};
use symsync_wire::{keys, MsgType, Payload};

/// Kinds of propagated event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    NewScript,
    UpdateScript,
    ScriptReset,
    ChatFromClient,
    ChatFromWorld,
    ChatBroadcast,
    ObjectGrab,
    ObjectGrabbing,
    ObjectDeGrab,
    Attach,
    PhysicsCollision,
}

const SURFACE_FIELDS: &[&str] = &["binormal", "faceIndex", "normal", "position", "stCoord", "uvCoord"];

impl EventKind {
    pub const ALL: &'static [EventKind] = &[
        EventKind::NewScript,
        EventKind::UpdateScript,
        EventKind::ScriptReset,
        EventKind::ChatFromClient,
        EventKind::ChatFromWorld,
        EventKind::ChatBroadcast,
        EventKind::ObjectGrab,
        EventKind::ObjectGrabbing,
        EventKind::ObjectDeGrab,
        EventKind::Attach,
        EventKind::PhysicsCollision,
    ];

    pub fn msg_type(self) -> MsgType {
        match self {
            EventKind::NewScript => MsgType::NewScript,
            EventKind::UpdateScript => MsgType::UpdateScript,
            EventKind::ScriptReset => MsgType::ScriptReset,
            EventKind::ChatFromClient => MsgType::ChatFromClient,
            EventKind::ChatFromWorld => MsgType::ChatFromWorld,
            EventKind::ChatBroadcast => MsgType::ChatBroadcast,
            EventKind::ObjectGrab => MsgType::ObjectGrab,
            EventKind::ObjectGrabbing => MsgType::ObjectGrabbing,
            EventKind::ObjectDeGrab => MsgType::ObjectDeGrab,
            EventKind::Attach => MsgType::Attach,
            EventKind::PhysicsCollision => MsgType::PhysicsCollision,
        }
    }

    pub fn from_msg_type(msg_type: MsgType) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.msg_type() == msg_type)
    }

    /// Payload keys the event cannot be delivered without
    pub fn required_fields(self) -> Vec<&'static str> {
        match self {
            EventKind::NewScript | EventKind::ScriptReset => vec!["agentID", "primID", "itemID"],
            EventKind::UpdateScript => vec!["agentID", "primID", "itemID", "running", "assetID"],
            EventKind::ChatFromClient | EventKind::ChatFromWorld | EventKind::ChatBroadcast => {
                vec!["channel", "msg", "pos", "name", "type"]
            }
            EventKind::ObjectGrab | EventKind::ObjectGrabbing => {
                let mut fields = vec!["agentID", "primID", "originalPrimID", "offsetPos"];
                fields.extend_from_slice(SURFACE_FIELDS);
                fields
            }
            EventKind::ObjectDeGrab => {
                let mut fields = vec!["agentID", "primID", "originalPrimID"];
                fields.extend_from_slice(SURFACE_FIELDS);
                fields
            }
            EventKind::Attach => vec!["primID", "itemID", "avatarID"],
            EventKind::PhysicsCollision => vec!["primUUID", "collisionLocalIDs"],
        }
    }

    /// Key of the object the event targets, if any
    pub fn prim_key(self) -> Option<&'static str> {
        match self {
            EventKind::ChatFromClient | EventKind::ChatFromWorld | EventKind::ChatBroadcast => None,
            EventKind::PhysicsCollision => Some("primUUID"),
            _ => Some("primID"),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.msg_type().name())
    }
}

/// An event as received from a peer
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteEvent {
    pub kind: EventKind,
    pub origin: ActorId,
    pub seq: EventSeq,
    pub payload: Payload,
}

impl RemoteEvent {
    /// Decode and validate an event payload
    pub fn decode(kind: EventKind, payload: Payload) -> SyncResult<Self> {
        let origin = payload.actor_id()?;
        let seq = EventSeq(payload.get_u64(keys::SEQ_NUM)?);
        if let Some(missing) = kind.required_fields().into_iter().find(|f| !payload.contains(f)) {
            return Err(SyncError::MissingField(format!("{}.{}", kind, missing)));
        }
        if let Some(key) = kind.prim_key() {
            payload.get_object_id(key)?;
        }
        Ok(RemoteEvent {
            kind,
            origin,
            seq,
            payload,
        })
    }

    /// Object the event targets
    pub fn prim_id(&self) -> Option<ObjectId> {
        self.kind
            .prim_key()
            .and_then(|key| self.payload.get_object_id(key).ok())
    }
}

/// Local event sequence, starting at 0
#[derive(Debug, Default)]
pub struct EventSequencer {
    next: AtomicU64,
}

impl EventSequencer {
    pub fn next(&self) -> EventSeq {
        EventSeq(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// How an event's sequence number relates to the last one seen from its origin
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeqObservation {
    First,
    InOrder,
    Gap { expected: EventSeq, got: EventSeq },
    /// At or behind the last one seen
    Reordered { last: EventSeq, got: EventSeq },
}

impl SeqObservation {
    pub fn is_anomaly(self) -> bool {
        matches!(self, SeqObservation::Gap { .. } | SeqObservation::Reordered { .. })
    }
}

/// Last sequence number seen per originating actor
#[derive(Debug, Default)]
pub struct EventTracker {
    last: Mutex<HashMap<ActorId, EventSeq>>,
}

impl EventTracker {
    pub fn observe(&self, origin: &ActorId, seq: EventSeq) -> SeqObservation {
        let mut last = self.last.lock();
        match last.get(origin).copied() {
            None => {
                last.insert(origin.clone(), seq);
                SeqObservation::First
            }
            Some(prev) if seq.follows(prev) => {
                last.insert(origin.clone(), seq);
                SeqObservation::InOrder
            }
            Some(prev) if seq > prev => {
                last.insert(origin.clone(), seq);
                SeqObservation::Gap {
                    expected: prev.next(),
                    got: seq,
                }
            }
            Some(prev) => SeqObservation::Reordered { last: prev, got: seq },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symsync_core::Vector3;

    #[test]
    fn test_kind_msg_type_mapping() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_msg_type(kind.msg_type()), Some(*kind));
        }
        assert_eq!(EventKind::from_msg_type(MsgType::UpdatedObject), None);
    }

    #[test]
    fn test_decode_chat() {
        let payload = Payload::new()
            .with(keys::ACTOR_ID, "a")
            .with(keys::SEQ_NUM, 4u64)
            .with("channel", 0i64)
            .with("msg", "hello")
            .with("pos", Vector3::new(1.0, 2.0, 3.0))
            .with("name", "Avatar")
            .with("type", 1i64);
        let event = RemoteEvent::decode(EventKind::ChatFromClient, payload).unwrap();
        assert_eq!(event.origin, ActorId::new("a"));
        assert_eq!(event.seq, EventSeq(4));
        assert_eq!(event.prim_id(), None);
    }

    #[test]
    fn test_decode_rejects_missing_field() {
        let payload = Payload::new()
            .with(keys::ACTOR_ID, "a")
            .with(keys::SEQ_NUM, 0u64)
            .with("primID", ObjectId::from_u128(1))
            .with("itemID", ObjectId::from_u128(2));
        assert!(matches!(
            RemoteEvent::decode(EventKind::Attach, payload),
            Err(SyncError::MissingField(f)) if f == "Attach.avatarID"
        ));
    }

    #[test]
    fn test_sequencer_starts_at_zero() {
        let seq = EventSequencer::default();
        assert_eq!(seq.next(), EventSeq(0));
        assert_eq!(seq.next(), EventSeq(1));
    }

    #[test]
    fn test_tracker_detects_gaps_and_reordering() {
        let tracker = EventTracker::default();
        let a = ActorId::new("a");
        assert_eq!(tracker.observe(&a, EventSeq(0)), SeqObservation::First);
        assert_eq!(tracker.observe(&a, EventSeq(1)), SeqObservation::InOrder);
        assert_eq!(
            tracker.observe(&a, EventSeq(4)),
            SeqObservation::Gap { expected: EventSeq(2), got: EventSeq(4) }
        );
        let late = tracker.observe(&a, EventSeq(3));
        assert!(late.is_anomaly());
        assert_eq!(tracker.observe(&a, EventSeq(5)), SeqObservation::InOrder);
        assert_eq!(tracker.observe(&ActorId::new("b"), EventSeq(9)), SeqObservation::First);
    }
}
