//! Property descriptor registry
//!
//! Classifies every replicable property into exactly one bucket and records
//! how it is compared. Built once at startup and read-only afterwards.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use symsync_core::{Property, SyncError, SyncResult};

use crate::{BucketCodec, PartialBucketCodec, WholeObjectCodec};

/// Name of the default bucket
pub const GENERAL_BUCKET: &str = "General";

/// Name of the kinetic bucket
pub const PHYSICS_BUCKET: &str = "Physics";

/// Properties placed in the physics bucket by default
pub const DEFAULT_PHYSICS_PROPERTIES: &[Property] = &[
    Property::GroupPosition,
    Property::OffsetPosition,
    Property::Scale,
    Property::AngularVelocity,
    Property::RotationOffset,
    Property::Size,
    Property::Position,
    Property::Force,
    Property::Velocity,
    Property::RotationalVelocity,
    Property::PaAcceleration,
    Property::Torque,
    Property::Orientation,
    Property::IsPhysical,
    Property::Flying,
    Property::Kinematic,
    Property::Buoyancy,
    Property::CollidingGround,
    Property::IsColliding,
];

/// Properties read from and written to the physics actor
pub const PHYSICS_ACTOR_PROPERTIES: &[Property] = &[
    Property::Buoyancy,
    Property::Flying,
    Property::Force,
    Property::IsColliding,
    Property::CollidingGround,
    Property::IsPhysical,
    Property::Kinematic,
    Property::Orientation,
    Property::PaAcceleration,
    Property::Position,
    Property::RotationalVelocity,
    Property::Size,
    Property::Torque,
];

/// Properties compared by content hash instead of by value
pub const HASHED_PROPERTIES: &[Property] = &[Property::Shape, Property::TaskInventory];

/// Bucket index, in registry order
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct BucketId(pub u8);

impl fmt::Display for BucketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How two values of a property are compared
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareMode {
    /// Structural equality
    Value,
    /// Equality of a hash over the serialized value
    Hash,
}

/// Static description of one property
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PropertyDescriptor {
    pub property: Property,
    pub bucket: BucketId,
    pub compare: CompareMode,
    pub needs_physics_actor: bool,
}

/// A named partition of the property space
pub struct Bucket {
    pub id: BucketId,
    pub name: String,
    pub properties: Vec<Property>,
    codec: Arc<dyn BucketCodec>,
}

impl Bucket {
    pub fn codec(&self) -> &dyn BucketCodec {
        self.codec.as_ref()
    }
}

impl fmt::Debug for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bucket")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("properties", &self.properties.len())
            .field("message_type", &self.codec.message_type())
            .finish()
    }
}

/// Bucket assignment table: bucket name and its properties, in send order
pub type BucketTable = Vec<(String, Vec<Property>)>;

/// Property descriptor registry
#[derive(Debug)]
pub struct PropertyRegistry {
    buckets: Vec<Bucket>,
    descriptors: HashMap<Property, PropertyDescriptor>,
}

impl PropertyRegistry {
    /// Two-bucket default: General, then Physics
    pub fn with_defaults() -> Self {
        let mut registry = PropertyRegistry {
            buckets: Vec::new(),
            descriptors: HashMap::new(),
        };
        for (name, properties) in Self::default_table() {
            registry.push_bucket(name, properties);
        }
        registry
    }

    /// The default assignment table
    pub fn default_table() -> BucketTable {
        let general = Property::ALL
            .iter()
            .copied()
            .filter(|p| !DEFAULT_PHYSICS_PROPERTIES.contains(p))
            .collect();
        vec![
            (GENERAL_BUCKET.to_string(), general),
            (PHYSICS_BUCKET.to_string(), DEFAULT_PHYSICS_PROPERTIES.to_vec()),
        ]
    }

    /// Build from an assignment table, rejecting unmapped or doubly-mapped properties
    pub fn from_table(table: &[(String, Vec<Property>)]) -> SyncResult<Self> {
        if table.is_empty() || table.len() > u8::MAX as usize {
            return Err(SyncError::InvalidConfig(format!(
                "bucket table must have 1..=255 buckets, got {}",
                table.len()
            )));
        }

        let mut owner: HashMap<Property, &str> = HashMap::new();
        for (name, properties) in table {
            if table.iter().filter(|(n, _)| n == name).count() > 1 {
                return Err(SyncError::InvalidConfig(format!("bucket {} declared twice", name)));
            }
            for p in properties {
                if p.is_pseudo() {
                    return Err(SyncError::InvalidConfig(format!(
                        "pseudo-property {} cannot be bucketed",
                        p
                    )));
                }
                if let Some(first) = owner.insert(*p, name) {
                    if first != name {
                        return Err(SyncError::DuplicateProperty {
                            property: *p,
                            first: first.to_string(),
                            second: name.clone(),
                        });
                    }
                }
            }
        }
        if let Some(missing) = Property::ALL.iter().find(|p| !owner.contains_key(p)) {
            return Err(SyncError::UnmappedProperty(*missing));
        }

        let mut registry = PropertyRegistry {
            buckets: Vec::with_capacity(table.len()),
            descriptors: HashMap::with_capacity(Property::ALL.len()),
        };
        for (name, properties) in table {
            let mut unique = Vec::with_capacity(properties.len());
            for p in properties {
                if !unique.contains(p) {
                    unique.push(*p);
                }
            }
            registry.push_bucket(name.clone(), unique);
        }
        Ok(registry)
    }

    fn push_bucket(&mut self, name: String, properties: Vec<Property>) {
        let id = BucketId(self.buckets.len() as u8);
        let codec: Arc<dyn BucketCodec> = if name == GENERAL_BUCKET {
            Arc::new(WholeObjectCodec)
        } else {
            Arc::new(PartialBucketCodec)
        };
        for p in &properties {
            self.descriptors.insert(
                *p,
                PropertyDescriptor {
                    property: *p,
                    bucket: id,
                    compare: if HASHED_PROPERTIES.contains(p) {
                        CompareMode::Hash
                    } else {
                        CompareMode::Value
                    },
                    needs_physics_actor: PHYSICS_ACTOR_PROPERTIES.contains(p),
                },
            );
        }
        self.buckets.push(Bucket {
            id,
            name,
            properties,
            codec,
        });
    }

    /// Bucket a property belongs to; `None` for pseudo-properties
    pub fn bucket_of(&self, property: Property) -> Option<BucketId> {
        self.descriptors.get(&property).map(|d| d.bucket)
    }

    pub fn descriptor(&self, property: Property) -> Option<&PropertyDescriptor> {
        self.descriptors.get(&property)
    }

    pub fn bucket(&self, id: BucketId) -> Option<&Bucket> {
        self.buckets.get(id.0 as usize)
    }

    pub fn bucket_by_name(&self, name: &str) -> Option<&Bucket> {
        self.buckets.iter().find(|b| b.name == name)
    }

    /// Encoder/decoder for a bucket
    pub fn codec_for(&self, name: &str) -> SyncResult<&dyn BucketCodec> {
        self.bucket_by_name(name)
            .map(Bucket::codec)
            .ok_or_else(|| SyncError::UnknownBucket(name.to_string()))
    }

    /// Buckets in registry (send) order
    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn bucket_ids(&self) -> impl Iterator<Item = BucketId> + '_ {
        self.buckets.iter().map(|b| b.id)
    }
}

impl Default for PropertyRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use symsync_wire::MsgType;

    #[test]
    fn test_every_property_in_exactly_one_bucket() {
        let registry = PropertyRegistry::with_defaults();
        for p in Property::ALL {
            let owners = registry
                .buckets()
                .iter()
                .filter(|b| b.properties.contains(p))
                .count();
            assert_eq!(owners, 1, "{} owned by {} buckets", p, owners);
            assert!(registry.bucket_of(*p).is_some());
        }
    }

    #[test]
    fn test_default_bucket_order_and_codecs() {
        let registry = PropertyRegistry::with_defaults();
        let names: Vec<&str> = registry.buckets().iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec![GENERAL_BUCKET, PHYSICS_BUCKET]);
        assert_eq!(
            registry.codec_for(GENERAL_BUCKET).unwrap().message_type(),
            MsgType::UpdatedObject
        );
        assert_eq!(
            registry.codec_for(PHYSICS_BUCKET).unwrap().message_type(),
            MsgType::UpdatedBucketProperties
        );
        assert!(registry.codec_for("Audio").is_err());
    }

    #[test]
    fn test_descriptor_flags() {
        let registry = PropertyRegistry::with_defaults();
        let shape = registry.descriptor(Property::Shape).unwrap();
        assert_eq!(shape.compare, CompareMode::Hash);
        assert_eq!(shape.bucket, BucketId(0));

        let position = registry.descriptor(Property::Position).unwrap();
        assert_eq!(position.compare, CompareMode::Value);
        assert!(position.needs_physics_actor);
        assert_eq!(position.bucket, BucketId(1));

        let velocity = registry.descriptor(Property::Velocity).unwrap();
        assert!(!velocity.needs_physics_actor);
        assert!(registry.bucket_of(Property::FullUpdate).is_none());
    }

    #[test]
    fn test_from_table_rejects_unmapped() {
        let mut table = PropertyRegistry::default_table();
        table[0].1.retain(|p| *p != Property::Name);
        assert!(matches!(
            PropertyRegistry::from_table(&table),
            Err(SyncError::UnmappedProperty(Property::Name))
        ));
    }

    #[test]
    fn test_from_table_rejects_double_mapping() {
        let mut table = PropertyRegistry::default_table();
        table[1].1.push(Property::Name);
        assert!(matches!(
            PropertyRegistry::from_table(&table),
            Err(SyncError::DuplicateProperty { property: Property::Name, .. })
        ));
    }

    #[test]
    fn test_from_table_custom_bucket() {
        let mut table = PropertyRegistry::default_table();
        table[0].1.retain(|p| *p != Property::Sound && *p != Property::CollisionSound);
        table.push(("Audio".to_string(), vec![Property::Sound, Property::CollisionSound]));

        let registry = PropertyRegistry::from_table(&table).unwrap();
        assert_eq!(registry.buckets().len(), 3);
        assert_eq!(registry.bucket_of(Property::Sound), Some(BucketId(2)));
        assert_eq!(
            registry.codec_for("Audio").unwrap().message_type(),
            MsgType::UpdatedBucketProperties
        );
    }

    proptest! {
        #[test]
        fn prop_moving_a_property_keeps_completeness(idx in 0usize..69) {
            let p = Property::ALL[idx % Property::ALL.len()];
            let mut table = PropertyRegistry::default_table();
            for (_, props) in table.iter_mut() {
                props.retain(|q| *q != p);
            }
            table.push(("Moved".to_string(), vec![p]));

            let registry = PropertyRegistry::from_table(&table).unwrap();
            for q in Property::ALL {
                prop_assert!(registry.bucket_of(*q).is_some());
            }
            prop_assert_eq!(registry.bucket_of(p), Some(BucketId(2)));
        }
    }
}
