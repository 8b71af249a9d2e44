//! Live object access
//!
//! The scene graph owns objects; the sync engine reads and corrects them
//! through `PropertyHost`, one property at a time.

use std::collections::BTreeMap;

use symsync_core::{ObjectId, Property, Value, Vector3};

/// Property-level access to one live scene object
pub trait PropertyHost {
    /// Object identity
    fn object_id(&self) -> ObjectId;

    /// Current live value, `None` if the object does not carry the property
    fn get_property(&self, property: Property) -> Option<Value>;

    /// Overwrite the live value
    fn set_property(&mut self, property: Property, value: Value);

    /// Whether the physics engine currently has an actor for this object
    fn has_physics_actor(&self) -> bool;
}

/// Detached copy of an object's properties
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectSnapshot {
    pub id: ObjectId,
    pub properties: BTreeMap<Property, Value>,
    pub physics_actor: bool,
}

impl ObjectSnapshot {
    pub fn new(id: ObjectId) -> Self {
        ObjectSnapshot {
            id,
            properties: BTreeMap::new(),
            physics_actor: false,
        }
    }

    pub fn with(mut self, property: Property, value: impl Into<Value>) -> Self {
        self.properties.insert(property, value.into());
        self
    }

    pub fn with_physics_actor(mut self) -> Self {
        self.physics_actor = true;
        self
    }

    pub fn group_position(&self) -> Option<Vector3> {
        self.properties
            .get(&Property::GroupPosition)
            .and_then(Value::as_vector3)
    }

    pub fn name(&self) -> Option<&str> {
        self.properties.get(&Property::Name).and_then(Value::as_str)
    }
}

impl PropertyHost for ObjectSnapshot {
    fn object_id(&self) -> ObjectId {
        self.id
    }

    fn get_property(&self, property: Property) -> Option<Value> {
        self.properties.get(&property).cloned()
    }

    fn set_property(&mut self, property: Property, value: Value) {
        self.properties.insert(property, value);
    }

    fn has_physics_actor(&self) -> bool {
        self.physics_actor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_serves_as_host() {
        let mut object = ObjectSnapshot::new(ObjectId::from_u128(1))
            .with(Property::Name, "crate")
            .with(Property::GroupPosition, Vector3::new(1.0, 2.0, 3.0))
            .with_physics_actor();

        assert_eq!(object.name(), Some("crate"));
        assert_eq!(object.group_position(), Some(Vector3::new(1.0, 2.0, 3.0)));

        let host: &mut dyn PropertyHost = &mut object;
        host.set_property(Property::Name, Value::from("barrel"));
        assert_eq!(host.object_id(), ObjectId::from_u128(1));
        assert!(host.has_physics_actor());
        assert_eq!(object.name(), Some("barrel"));
    }
}
