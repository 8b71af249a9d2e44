//! Message payload - a string-keyed value map

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use symsync_core::{ActorId, ObjectId, SyncError, SyncResult, SyncTime, Value, Vector3};

/// Key/value payload carried by a sync message
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(BTreeMap<String, Value>);

impl Payload {
    pub fn new() -> Self {
        Payload(BTreeMap::new())
    }

    /// Builder-style insert
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.0
    }

    /// Encode as JSON bytes
    pub fn to_json(&self) -> SyncResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| SyncError::InvalidPayload(e.to_string()))
    }

    /// Decode from JSON bytes
    pub fn from_json(buf: &[u8]) -> SyncResult<Self> {
        serde_json::from_slice(buf).map_err(|e| SyncError::InvalidPayload(e.to_string()))
    }

    fn require(&self, key: &str) -> SyncResult<&Value> {
        self.0
            .get(key)
            .ok_or_else(|| SyncError::MissingField(key.to_string()))
    }

    fn typed<T>(&self, key: &str, expected: &'static str, f: impl FnOnce(&Value) -> Option<T>) -> SyncResult<T> {
        let value = self.require(key)?;
        f(value).ok_or_else(|| SyncError::FieldType {
            field: key.to_string(),
            expected,
            actual: value.type_name(),
        })
    }

    pub fn get_bool(&self, key: &str) -> SyncResult<bool> {
        self.typed(key, "bool", Value::as_bool)
    }

    pub fn get_i64(&self, key: &str) -> SyncResult<i64> {
        self.typed(key, "int", Value::as_i64)
    }

    pub fn get_u64(&self, key: &str) -> SyncResult<u64> {
        self.typed(key, "uint", Value::as_u64)
    }

    pub fn get_f64(&self, key: &str) -> SyncResult<f64> {
        self.typed(key, "real", Value::as_f64)
    }

    pub fn get_str(&self, key: &str) -> SyncResult<&str> {
        let value = self.require(key)?;
        value.as_str().ok_or_else(|| SyncError::FieldType {
            field: key.to_string(),
            expected: "text",
            actual: value.type_name(),
        })
    }

    pub fn get_object_id(&self, key: &str) -> SyncResult<ObjectId> {
        self.typed(key, "uuid", Value::as_object_id)
    }

    pub fn get_vector3(&self, key: &str) -> SyncResult<Vector3> {
        self.typed(key, "vector3", Value::as_vector3)
    }

    pub fn get_array(&self, key: &str) -> SyncResult<&[Value]> {
        let value = self.require(key)?;
        value.as_array().ok_or_else(|| SyncError::FieldType {
            field: key.to_string(),
            expected: "array",
            actual: value.type_name(),
        })
    }

    /// Nested map as a payload
    pub fn get_payload(&self, key: &str) -> SyncResult<Payload> {
        self.typed(key, "map", |v| v.as_map().cloned().map(Payload))
    }

    /// The originating actor, carried under `actorID`
    pub fn actor_id(&self) -> SyncResult<ActorId> {
        self.get_str(keys::ACTOR_ID).map(ActorId::new)
    }

    pub fn get_time(&self, key: &str) -> SyncResult<SyncTime> {
        self.get_i64(key).map(SyncTime::from_micros)
    }

    /// Read a list of object ids stored as an array
    pub fn get_object_ids(&self, key: &str) -> SyncResult<Vec<ObjectId>> {
        self.get_array(key)?
            .iter()
            .map(|v| {
                v.as_object_id().ok_or_else(|| SyncError::FieldType {
                    field: key.to_string(),
                    expected: "uuid",
                    actual: v.type_name(),
                })
            })
            .collect()
    }
}

impl From<Payload> for Value {
    fn from(p: Payload) -> Self {
        Value::Map(p.0)
    }
}

impl From<BTreeMap<String, Value>> for Payload {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Payload(map)
    }
}

/// Well-known payload keys
pub mod keys {
    pub const ACTOR_ID: &str = "actorID";
    pub const REGION_NAME: &str = "regionName";
    pub const SEQ_NUM: &str = "seqNum";
    pub const UUID: &str = "UUID";
    pub const BUCKET: &str = "Bucket";
    pub const GROUP_POSITION: &str = "GroupPosition";
    pub const PROPERTIES: &str = "Properties";
    pub const OBJECT: &str = "Object";
    pub const SOFT_DELETE: &str = "softDelete";
    pub const ROOT_ID: &str = "rootID";
    pub const CHILDREN: &str = "children";
    pub const LINKED_GROUP: &str = "linkedGroup";
    pub const PARTS: &str = "parts";
    pub const BEFORE_GROUPS: &str = "beforeGroups";
    pub const AFTER_GROUPS: &str = "afterGroups";
    pub const TERRAIN: &str = "terrain";
    pub const TIMESTAMP: &str = "timeStamp";
    pub const OBJECT_COUNT: &str = "objectCount";
}
