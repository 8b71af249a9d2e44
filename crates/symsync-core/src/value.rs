//! Property and payload values
//!
//! `Value` is both the stored value of a replicated property and the value
//! type of a message payload map: scalars, 3D vectors, rotations, and nested
//! arrays and maps.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ObjectId;

/// 3D vector
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 { x: 0.0, y: 0.0, z: 0.0 };

    #[inline]
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Vector3 { x, y, z }
    }
}

/// Rotation quaternion
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    #[inline]
    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Quaternion { x, y, z, w }
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Quaternion::IDENTITY
    }
}

/// A property or payload value
///
/// Values are held by value: a stored copy never changes when the live
/// object it was read from changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Real(f64),
    Text(String),
    Uuid(Uuid),
    Vector3(Vector3),
    Quaternion(Quaternion),
    /// RGBA
    Color([u8; 4]),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Short type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Uuid(_) => "uuid",
            Value::Vector3(_) => "vector3",
            Value::Quaternion(_) => "quaternion",
            Value::Color(_) => "color",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
        }
    }

    /// False if any float inside is NaN or infinite
    ///
    /// Non-finite floats have no JSON form and never compare equal to
    /// themselves, so they are kept out of sync state.
    pub fn is_finite(&self) -> bool {
        match self {
            Value::Real(v) => v.is_finite(),
            Value::Vector3(v) => v.x.is_finite() && v.y.is_finite() && v.z.is_finite(),
            Value::Quaternion(q) => q.x.is_finite() && q.y.is_finite() && q.z.is_finite() && q.w.is_finite(),
            Value::Array(items) => items.iter().all(Value::is_finite),
            Value::Map(map) => map.values().all(Value::is_finite),
            _ => true,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Signed integer view; unsigned values convert when they fit
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Unsigned integer view; non-negative signed values convert
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(v) => Some(*v),
            Value::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            Value::UInt(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Value::Uuid(u) => Some(*u),
            Value::Text(s) => Uuid::parse_str(s).ok(),
            _ => None,
        }
    }

    pub fn as_object_id(&self) -> Option<ObjectId> {
        self.as_uuid().map(ObjectId)
    }

    pub fn as_vector3(&self) -> Option<Vector3> {
        match self {
            Value::Vector3(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_quaternion(&self) -> Option<Quaternion> {
        match self {
            Value::Quaternion(q) => Some(*q),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::UInt(v as u64)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Real(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl From<ObjectId> for Value {
    fn from(v: ObjectId) -> Self {
        Value::Uuid(v.0)
    }
}

impl From<Vector3> for Value {
    fn from(v: Vector3) -> Self {
        Value::Vector3(v)
    }
}

impl From<Quaternion> for Value {
    fn from(v: Quaternion) -> Self {
        Value::Quaternion(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Map(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_views_convert_when_in_range() {
        assert_eq!(Value::UInt(5).as_i64(), Some(5));
        assert_eq!(Value::UInt(u64::MAX).as_i64(), None);
        assert_eq!(Value::Int(-1).as_u64(), None);
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
    }

    #[test]
    fn test_uuid_view_accepts_text() {
        let id = Uuid::from_u128(42);
        assert_eq!(Value::Text(id.to_string()).as_uuid(), Some(id));
        assert_eq!(Value::Uuid(id).as_object_id(), Some(ObjectId(id)));
        assert_eq!(Value::Bool(true).as_uuid(), None);
    }

    #[test]
    fn test_value_is_copied_not_shared() {
        let mut live = vec![1u8, 2, 3];
        let stored = Value::from(live.clone());
        live.push(4);
        assert_eq!(stored.as_bytes(), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn test_non_finite_floats_detected_through_nesting() {
        assert!(Value::from(Vector3::new(1.0, 2.0, 3.0)).is_finite());
        assert!(!Value::from(Vector3::new(f32::NAN, 0.0, 0.0)).is_finite());
        assert!(!Value::Real(f64::INFINITY).is_finite());
        assert!(!Value::Quaternion(Quaternion::new(0.0, 0.0, 0.0, f32::NAN)).is_finite());
        assert!(!Value::Array(vec![Value::Int(1), Value::Real(f64::NAN)]).is_finite());
        assert!(Value::from("nan").is_finite());
    }

    fn finite_value() -> impl proptest::strategy::Strategy<Value = Value> {
        use proptest::prelude::*;
        let leaf = prop_oneof![
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            // Quarter steps stay exact through decimal text
            (-4_000_000i32..4_000_000).prop_map(|n| Value::Real(f64::from(n) / 4.0)),
            "[ -~]{0,16}".prop_map(Value::Text),
            (-4000i16..4000, -4000i16..4000, -4000i16..4000).prop_map(|(x, y, z)| {
                Value::from(Vector3::new(f32::from(x) / 4.0, f32::from(y) / 4.0, f32::from(z) / 4.0))
            }),
            proptest::collection::vec(any::<u8>(), 0..16).prop_map(Value::Bytes),
        ];
        leaf.prop_recursive(2, 16, 4, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                proptest::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(Value::Map),
            ]
        })
    }

    proptest::proptest! {
        #[test]
        fn prop_finite_values_survive_json(value in finite_value()) {
            proptest::prop_assert!(value.is_finite());
            let json = serde_json::to_string(&value).unwrap();
            let back: Value = serde_json::from_str(&json).unwrap();
            proptest::prop_assert_eq!(back, value);
        }
    }

    #[test]
    fn test_nested_value_json() {
        let mut map = BTreeMap::new();
        map.insert("pos".to_string(), Value::from(Vector3::new(1.0, 2.0, 3.0)));
        map.insert("ids".to_string(), Value::Array(vec![Value::Int(1), Value::Int(2)]));
        let value = Value::Map(map);
        let json = serde_json::to_string(&value).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }
}
