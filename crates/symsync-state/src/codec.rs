//! Bucket codecs
//!
//! A bucket codec turns the stored sync state of one object's bucket into a
//! message payload and back. Every property travels with the timestamp and
//! origin actor of its last accepted write, so the receiver can reconcile
//! each property independently.

use std::collections::BTreeMap;

use symsync_core::{ActorId, ObjectId, Property, SyncError, SyncResult, SyncTime, Value, Vector3};
use symsync_wire::{keys, MsgType, Payload};

use crate::{Bucket, ObjectSnapshot, PrimSyncInfo};

const ENTRY_VALUE: &str = "v";
const ENTRY_TIME: &str = "ts";
const ENTRY_ACTOR: &str = "actor";
const PHYS_ACTOR: &str = "PhysActor";

/// One property write as carried on the wire
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyUpdate {
    pub property: Property,
    pub value: Value,
    pub timestamp: SyncTime,
    pub origin: ActorId,
}

impl PropertyUpdate {
    pub fn new(property: Property, value: impl Into<Value>, timestamp: SyncTime, origin: ActorId) -> Self {
        PropertyUpdate {
            property,
            value: value.into(),
            timestamp,
            origin,
        }
    }
}

/// Decoded bucket update for one object
#[derive(Clone, Debug, PartialEq)]
pub struct BucketUpdate {
    pub bucket: String,
    pub object: ObjectId,
    /// Actor that originated the message
    pub sender: ActorId,
    pub group_position: Option<Vector3>,
    /// Carries every property of the bucket, enough to create the object
    pub whole_object: bool,
    pub updates: Vec<PropertyUpdate>,
}

/// Encode/decode strategy of one bucket
pub trait BucketCodec: Send + Sync {
    /// Message type the bucket is sent as
    fn message_type(&self) -> MsgType;

    /// Encode the bucket's properties of one object
    fn encode(&self, bucket: &Bucket, prim: &PrimSyncInfo, sender: &ActorId) -> Payload;

    /// Decode a payload produced by `encode`
    fn decode(&self, payload: &Payload) -> SyncResult<BucketUpdate>;
}

/// General bucket: the object is described whole, once per change
#[derive(Clone, Copy, Debug, Default)]
pub struct WholeObjectCodec;

/// Kinetic and custom buckets: only the bucket's own properties
#[derive(Clone, Copy, Debug, Default)]
pub struct PartialBucketCodec;

impl BucketCodec for WholeObjectCodec {
    fn message_type(&self) -> MsgType {
        MsgType::UpdatedObject
    }

    fn encode(&self, bucket: &Bucket, prim: &PrimSyncInfo, sender: &ActorId) -> Payload {
        encode_bucket(bucket, prim, sender)
    }

    fn decode(&self, payload: &Payload) -> SyncResult<BucketUpdate> {
        let mut update = decode_bucket(payload)?;
        update.whole_object = true;
        Ok(update)
    }
}

impl BucketCodec for PartialBucketCodec {
    fn message_type(&self) -> MsgType {
        MsgType::UpdatedBucketProperties
    }

    fn encode(&self, bucket: &Bucket, prim: &PrimSyncInfo, sender: &ActorId) -> Payload {
        encode_bucket(bucket, prim, sender)
    }

    fn decode(&self, payload: &Payload) -> SyncResult<BucketUpdate> {
        decode_bucket(payload)
    }
}

fn encode_bucket(bucket: &Bucket, prim: &PrimSyncInfo, sender: &ActorId) -> Payload {
    let entries = bucket
        .properties
        .iter()
        .filter_map(|p| prim.get(*p).map(|info| (p.as_str().to_string(), encode_entry(info.value(), info.timestamp(), info.origin()))))
        .collect::<BTreeMap<_, _>>();

    let mut payload = Payload::new()
        .with(keys::ACTOR_ID, sender.as_str())
        .with(keys::BUCKET, bucket.name.as_str())
        .with(keys::UUID, prim.object_id())
        .with(keys::PROPERTIES, entries);
    if let Some(pos) = prim.group_position() {
        payload.insert(keys::GROUP_POSITION, pos);
    }
    payload
}

fn decode_bucket(payload: &Payload) -> SyncResult<BucketUpdate> {
    let properties = payload.get_payload(keys::PROPERTIES)?;
    Ok(BucketUpdate {
        bucket: payload.get_str(keys::BUCKET)?.to_string(),
        object: payload.get_object_id(keys::UUID)?,
        sender: payload.actor_id()?,
        group_position: payload.get_vector3(keys::GROUP_POSITION).ok(),
        whole_object: false,
        updates: decode_entries(&properties)?,
    })
}

fn encode_entry(value: &Value, timestamp: SyncTime, origin: &ActorId) -> Value {
    let mut entry = BTreeMap::new();
    entry.insert(ENTRY_VALUE.to_string(), value.clone());
    entry.insert(ENTRY_TIME.to_string(), Value::Int(timestamp.as_micros()));
    entry.insert(ENTRY_ACTOR.to_string(), Value::Text(origin.to_string()));
    Value::Map(entry)
}

fn decode_entries(properties: &Payload) -> SyncResult<Vec<PropertyUpdate>> {
    let mut updates = Vec::with_capacity(properties.len());
    for (name, entry) in properties.iter() {
        let Ok(property) = name.parse::<Property>() else {
            tracing::trace!(property = %name, "skipping unknown property");
            continue;
        };
        let entry = entry.as_map().cloned().map(Payload::from).ok_or_else(|| SyncError::FieldType {
            field: name.clone(),
            expected: "map",
            actual: entry.type_name(),
        })?;
        let value = entry
            .get(ENTRY_VALUE)
            .cloned()
            .ok_or_else(|| SyncError::MissingField(format!("{}.{}", name, ENTRY_VALUE)))?;
        updates.push(PropertyUpdate {
            property,
            value,
            timestamp: entry.get_time(ENTRY_TIME)?,
            origin: ActorId::new(entry.get_str(ENTRY_ACTOR)?),
        });
    }
    Ok(updates)
}

/// A full object as carried by new-object, link and delink messages
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedObject {
    pub snapshot: ObjectSnapshot,
    pub updates: Vec<PropertyUpdate>,
}

/// Encode every stored property of an object
pub fn encode_object(prim: &PrimSyncInfo, physics_actor: bool) -> Payload {
    let entries = prim
        .iter()
        .map(|info| (info.property().as_str().to_string(), encode_entry(info.value(), info.timestamp(), info.origin())))
        .collect::<BTreeMap<_, _>>();
    Payload::new()
        .with(keys::UUID, prim.object_id())
        .with(PHYS_ACTOR, physics_actor)
        .with(keys::PROPERTIES, entries)
}

/// Decode an object produced by `encode_object`
pub fn decode_object(payload: &Payload) -> SyncResult<DecodedObject> {
    let id = payload.get_object_id(keys::UUID)?;
    let updates = decode_entries(&payload.get_payload(keys::PROPERTIES)?)?;
    let mut snapshot = ObjectSnapshot::new(id);
    snapshot.physics_actor = payload.get_bool(PHYS_ACTOR).unwrap_or(false);
    for u in &updates {
        snapshot.properties.insert(u.property, u.value.clone());
    }
    Ok(DecodedObject { snapshot, updates })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PropertyRegistry;

    fn sample_prim(registry: &PropertyRegistry) -> PrimSyncInfo {
        let host = ObjectSnapshot::new(ObjectId::from_u128(5))
            .with(Property::Name, "box")
            .with(Property::GroupPosition, Vector3::new(4.0, 5.0, 6.0))
            .with(Property::Velocity, Vector3::new(0.0, 0.0, -9.8))
            .with_physics_actor();
        PrimSyncInfo::from_host(&host, registry, SyncTime::from_micros(100), &ActorId::new("a"))
    }

    #[test]
    fn test_partial_bucket_carries_only_its_properties() {
        let registry = PropertyRegistry::with_defaults();
        let prim = sample_prim(&registry);
        let physics = registry.bucket_by_name("Physics").unwrap();

        let payload = physics.codec().encode(physics, &prim, &ActorId::new("a"));
        let update = physics.codec().decode(&payload).unwrap();

        assert_eq!(update.bucket, "Physics");
        assert_eq!(update.object, ObjectId::from_u128(5));
        assert_eq!(update.sender, ActorId::new("a"));
        assert!(!update.whole_object);
        assert_eq!(update.group_position, Some(Vector3::new(4.0, 5.0, 6.0)));
        let props: Vec<Property> = update.updates.iter().map(|u| u.property).collect();
        assert!(props.contains(&Property::Velocity));
        assert!(props.contains(&Property::GroupPosition));
        assert!(!props.contains(&Property::Name));
        assert!(update.updates.iter().all(|u| u.timestamp == SyncTime::from_micros(100)));
    }

    #[test]
    fn test_whole_object_codec_marks_whole_object() {
        let registry = PropertyRegistry::with_defaults();
        let prim = sample_prim(&registry);
        let general = registry.bucket_by_name("General").unwrap();

        let payload = general.codec().encode(general, &prim, &ActorId::new("a"));
        let update = general.codec().decode(&payload).unwrap();
        assert!(update.whole_object);
        assert_eq!(update.updates.len(), 1);
        assert_eq!(update.updates[0].value, Value::from("box"));
    }

    #[test]
    fn test_object_encoding_keeps_physics_actor_flag() {
        let registry = PropertyRegistry::with_defaults();
        let prim = sample_prim(&registry);
        let decoded = decode_object(&encode_object(&prim, true)).unwrap();
        assert!(decoded.snapshot.physics_actor);
        assert_eq!(decoded.snapshot.name(), Some("box"));
        assert_eq!(decoded.updates.len(), 3);
    }

    #[test]
    fn test_decode_rejects_entry_without_timestamp() {
        let mut entry = BTreeMap::new();
        entry.insert(ENTRY_VALUE.to_string(), Value::from("x"));
        entry.insert(ENTRY_ACTOR.to_string(), Value::from("a"));
        let mut props = BTreeMap::new();
        props.insert("Name".to_string(), Value::Map(entry));

        let payload = Payload::new()
            .with(keys::ACTOR_ID, "a")
            .with(keys::BUCKET, "General")
            .with(keys::UUID, ObjectId::from_u128(1))
            .with(keys::PROPERTIES, props);
        assert!(matches!(
            WholeObjectCodec.decode(&payload),
            Err(SyncError::MissingField(_))
        ));
    }

    #[test]
    fn test_decode_skips_unknown_property_names() {
        let mut props = BTreeMap::new();
        props.insert(
            "FutureThing".to_string(),
            encode_entry(&Value::Int(1), SyncTime::from_micros(1), &ActorId::new("a")),
        );
        let payload = Payload::new()
            .with(keys::ACTOR_ID, "a")
            .with(keys::BUCKET, "Physics")
            .with(keys::UUID, ObjectId::from_u128(1))
            .with(keys::PROPERTIES, props);
        assert!(PartialBucketCodec.decode(&payload).unwrap().updates.is_empty());
    }
}
