//! Per-object reconciliation
//!
//! `PrimSyncInfo` holds the sync record of every property of one object and
//! applies local and remote writes to it through the registry's descriptors.

use std::collections::{BTreeMap, BTreeSet};

use symsync_core::{ActorId, ObjectId, Property, SyncError, SyncResult, SyncTime, Value, Vector3};

use crate::{
    BucketId, CompareMode, PropertyHost, PropertyRegistry, PropertySyncInfo, PropertyUpdate, Resolution,
    UpdateSource,
};

/// Result of applying local writes
#[derive(Debug, Default)]
pub struct LocalUpdateOutcome {
    /// Buckets that now have something to send
    pub dirty_buckets: BTreeSet<BucketId>,
    /// Properties whose live value was overwritten with the stored one
    pub corrected: Vec<Property>,
    pub accepted: u32,
    pub unchanged: u32,
    /// Live values refused for holding NaN or infinite floats
    pub non_finite: u32,
}

/// Result of applying remote writes
#[derive(Debug, Default)]
pub struct SyncUpdateOutcome {
    /// Properties written into the live object
    pub applied: Vec<Property>,
    pub rejected: u32,
    pub unchanged: u32,
}

/// Sync state of one replicated object
#[derive(Clone, Debug)]
pub struct PrimSyncInfo {
    id: ObjectId,
    properties: BTreeMap<Property, PropertySyncInfo>,
    /// Buckets forced out by a full update
    forced: BTreeSet<BucketId>,
}

impl PrimSyncInfo {
    /// Start tracking an object first seen locally
    pub fn from_host(
        host: &dyn PropertyHost,
        registry: &PropertyRegistry,
        timestamp: SyncTime,
        actor: &ActorId,
    ) -> Self {
        let mut properties = BTreeMap::new();
        for p in Property::ALL {
            let Some(descriptor) = registry.descriptor(*p) else {
                continue;
            };
            if descriptor.needs_physics_actor && !host.has_physics_actor() {
                continue;
            }
            if let Some(value) = host.get_property(*p).filter(Value::is_finite) {
                properties.insert(
                    *p,
                    PropertySyncInfo::new(
                        *p,
                        descriptor.compare,
                        value,
                        timestamp,
                        actor.clone(),
                        UpdateSource::Local,
                    ),
                );
            }
        }
        PrimSyncInfo {
            id: host.object_id(),
            properties,
            forced: BTreeSet::new(),
        }
    }

    /// Start tracking an object first seen through sync
    pub fn from_updates(id: ObjectId, updates: &[PropertyUpdate], registry: &PropertyRegistry) -> Self {
        let mut properties = BTreeMap::new();
        for u in updates {
            let Some(descriptor) = registry.descriptor(u.property) else {
                continue;
            };
            properties.insert(
                u.property,
                PropertySyncInfo::new(
                    u.property,
                    descriptor.compare,
                    u.value.clone(),
                    u.timestamp,
                    u.origin.clone(),
                    UpdateSource::FromSync,
                ),
            );
        }
        PrimSyncInfo {
            id,
            properties,
            forced: BTreeSet::new(),
        }
    }

    pub fn object_id(&self) -> ObjectId {
        self.id
    }

    pub fn get(&self, property: Property) -> Option<&PropertySyncInfo> {
        self.properties.get(&property)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertySyncInfo> {
        self.properties.values()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn group_position(&self) -> Option<Vector3> {
        self.get(Property::GroupPosition)
            .and_then(|info| info.value().as_vector3())
    }

    /// Most recent write across all properties
    pub fn last_update(&self) -> Option<(SyncTime, &ActorId)> {
        self.properties
            .values()
            .max_by_key(|info| info.timestamp())
            .map(|info| (info.timestamp(), info.origin()))
    }

    /// Apply local writes to `properties` of `host`
    ///
    /// Accepted writes are recorded and dirty their bucket. Stale writes are
    /// corrected in place: the live value is overwritten with the stored one.
    pub fn update_by_local(
        &mut self,
        host: &mut dyn PropertyHost,
        properties: &[Property],
        timestamp: SyncTime,
        actor: &ActorId,
        registry: &PropertyRegistry,
    ) -> LocalUpdateOutcome {
        let mut outcome = LocalUpdateOutcome::default();

        if properties.contains(&Property::FullUpdate) {
            self.full_update(host, timestamp, actor, registry, &mut outcome);
            return outcome;
        }

        for p in properties {
            let Some(descriptor) = registry.descriptor(*p) else {
                continue;
            };
            if descriptor.needs_physics_actor && !host.has_physics_actor() {
                continue;
            }
            let Some(live) = host.get_property(*p) else {
                continue;
            };
            if !live.is_finite() {
                self.refuse_non_finite(host, *p, &mut outcome);
                continue;
            }

            let Some(info) = self.properties.get_mut(p) else {
                // First value ever seen for this property
                self.properties.insert(
                    *p,
                    new_local_record(*p, descriptor.compare, live, timestamp, actor),
                );
                outcome.dirty_buckets.insert(descriptor.bucket);
                outcome.accepted += 1;
                continue;
            };

            match info.offer(&live, timestamp, actor, UpdateSource::Local) {
                Resolution::Unchanged => outcome.unchanged += 1,
                Resolution::Accepted => {
                    outcome.dirty_buckets.insert(descriptor.bucket);
                    outcome.accepted += 1;
                }
                Resolution::Rejected { stored } => {
                    tracing::debug!(
                        object = %self.id,
                        property = %p,
                        stored_time = %info.timestamp(),
                        local_time = %timestamp,
                        "stale local write corrected"
                    );
                    host.set_property(*p, stored);
                    outcome.corrected.push(*p);
                }
            }
        }
        outcome
    }

    /// Record every live value as written now and force every bucket out
    fn full_update(
        &mut self,
        host: &mut dyn PropertyHost,
        timestamp: SyncTime,
        actor: &ActorId,
        registry: &PropertyRegistry,
        outcome: &mut LocalUpdateOutcome,
    ) {
        for p in Property::ALL {
            let Some(descriptor) = registry.descriptor(*p) else {
                continue;
            };
            if descriptor.needs_physics_actor && !host.has_physics_actor() {
                continue;
            }
            let Some(live) = host.get_property(*p) else {
                continue;
            };
            if !live.is_finite() {
                self.refuse_non_finite(host, *p, outcome);
                continue;
            }
            match self.properties.get_mut(p) {
                Some(info) if info.matches(&live) => outcome.unchanged += 1,
                Some(info) => {
                    info.overwrite(live, timestamp, actor.clone(), UpdateSource::Local);
                    outcome.accepted += 1;
                }
                None => {
                    self.properties.insert(
                        *p,
                        new_local_record(*p, descriptor.compare, live, timestamp, actor),
                    );
                    outcome.accepted += 1;
                }
            }
        }
        for bucket in registry.bucket_ids() {
            self.forced.insert(bucket);
            outcome.dirty_buckets.insert(bucket);
        }
    }

    /// Put the stored value back in place of a non-finite live one
    fn refuse_non_finite(&self, host: &mut dyn PropertyHost, property: Property, outcome: &mut LocalUpdateOutcome) {
        tracing::warn!(object = %self.id, property = %property, "non-finite local value refused");
        outcome.non_finite += 1;
        if let Some(info) = self.properties.get(&property) {
            host.set_property(property, info.value().clone());
            outcome.corrected.push(property);
        }
    }

    /// Apply remote writes, writing accepted values into `host`
    ///
    /// If any write targets a property that needs a physics actor and the
    /// object has none, the whole batch is abandoned.
    pub fn update_by_sync(
        &mut self,
        host: &mut dyn PropertyHost,
        updates: &[PropertyUpdate],
        registry: &PropertyRegistry,
    ) -> SyncResult<SyncUpdateOutcome> {
        if !host.has_physics_actor()
            && updates.iter().any(|u| {
                registry
                    .descriptor(u.property)
                    .map_or(false, |d| d.needs_physics_actor)
            })
        {
            return Err(SyncError::MissingPhysicsActor(self.id));
        }

        let mut outcome = SyncUpdateOutcome::default();
        for u in updates {
            let Some(descriptor) = registry.descriptor(u.property) else {
                continue;
            };
            let resolution = match self.properties.get_mut(&u.property) {
                Some(info) => info.offer(&u.value, u.timestamp, &u.origin, UpdateSource::FromSync),
                None => {
                    self.properties.insert(
                        u.property,
                        PropertySyncInfo::new(
                            u.property,
                            descriptor.compare,
                            u.value.clone(),
                            u.timestamp,
                            u.origin.clone(),
                            UpdateSource::FromSync,
                        ),
                    );
                    Resolution::Accepted
                }
            };
            match resolution {
                Resolution::Accepted => {
                    host.set_property(u.property, u.value.clone());
                    outcome.applied.push(u.property);
                }
                Resolution::Unchanged => outcome.unchanged += 1,
                Resolution::Rejected { .. } => outcome.rejected += 1,
            }
        }
        Ok(outcome)
    }

    /// Whether `bucket` has anything left to send
    pub fn needs_send(&self, bucket: BucketId, registry: &PropertyRegistry) -> bool {
        if self.forced.contains(&bucket) {
            return true;
        }
        self.properties
            .values()
            .any(|info| info.is_locally_dirty() && registry.bucket_of(info.property()) == Some(bucket))
    }

    /// Clear local dirt of `bucket` after it was sent
    pub fn clear_dirty(&mut self, bucket: BucketId, registry: &PropertyRegistry) {
        self.forced.remove(&bucket);
        for info in self.properties.values_mut() {
            if registry.bucket_of(info.property()) == Some(bucket) {
                info.clear_dirty();
            }
        }
    }
}

fn new_local_record(
    property: Property,
    compare: CompareMode,
    value: Value,
    timestamp: SyncTime,
    actor: &ActorId,
) -> PropertySyncInfo {
    let mut info = PropertySyncInfo::new(property, compare, value, timestamp, actor.clone(), UpdateSource::Local);
    info.mark_dirty();
    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ObjectSnapshot;

    fn actor(name: &str) -> ActorId {
        ActorId::new(name)
    }

    fn ts(micros: i64) -> SyncTime {
        SyncTime::from_micros(micros)
    }

    fn object() -> ObjectSnapshot {
        ObjectSnapshot::new(ObjectId::from_u128(1))
            .with(Property::Name, "crate")
            .with(Property::SalePrice, 0i64)
            .with(Property::Velocity, Vector3::ZERO)
            .with(Property::Position, Vector3::ZERO)
            .with_physics_actor()
    }

    #[test]
    fn test_local_write_dirties_bucket() {
        let registry = PropertyRegistry::with_defaults();
        let mut host = object();
        let mut prim = PrimSyncInfo::from_host(&host, &registry, ts(0), &actor("b"));

        host.set_property(Property::Name, Value::from("barrel"));
        let outcome = prim.update_by_local(&mut host, &[Property::Name], ts(5), &actor("b"), &registry);

        assert_eq!(outcome.accepted, 1);
        assert_eq!(outcome.dirty_buckets.iter().copied().collect::<Vec<_>>(), vec![BucketId(0)]);
        assert!(prim.needs_send(BucketId(0), &registry));
        assert!(!prim.needs_send(BucketId(1), &registry));

        prim.clear_dirty(BucketId(0), &registry);
        assert!(!prim.needs_send(BucketId(0), &registry));
    }

    #[test]
    fn test_stale_local_write_is_corrected_in_place() {
        let registry = PropertyRegistry::with_defaults();
        let mut host = object();
        let mut prim = PrimSyncInfo::from_host(&host, &registry, ts(0), &actor("b"));

        // Remote write at t=10
        let remote = [PropertyUpdate::new(Property::SalePrice, 5i64, ts(10), actor("a"))];
        prim.update_by_sync(&mut host, &remote, &registry).unwrap();
        assert_eq!(host.get_property(Property::SalePrice), Some(Value::Int(5)));

        // Local drifted write at t=8
        host.set_property(Property::SalePrice, Value::Int(7));
        let outcome = prim.update_by_local(&mut host, &[Property::SalePrice], ts(8), &actor("b"), &registry);

        assert_eq!(outcome.corrected, vec![Property::SalePrice]);
        assert!(outcome.dirty_buckets.is_empty());
        assert_eq!(host.get_property(Property::SalePrice), Some(Value::Int(5)));
        assert_eq!(prim.get(Property::SalePrice).unwrap().timestamp(), ts(10));
    }

    #[test]
    fn test_sync_write_applied_to_host() {
        let registry = PropertyRegistry::with_defaults();
        let mut host = object();
        let mut prim = PrimSyncInfo::from_host(&host, &registry, ts(3), &actor("b"));

        let updates = [
            PropertyUpdate::new(Property::Velocity, Vector3::new(1.0, 0.0, 0.0), ts(4), actor("a")),
            PropertyUpdate::new(Property::Name, "crate", ts(9), actor("a")),
            PropertyUpdate::new(Property::SalePrice, 3i64, ts(1), actor("a")),
        ];
        let outcome = prim.update_by_sync(&mut host, &updates, &registry).unwrap();

        assert_eq!(outcome.applied, vec![Property::Velocity]);
        assert_eq!(outcome.unchanged, 1);
        assert_eq!(outcome.rejected, 1);
        assert_eq!(host.get_property(Property::Velocity), Some(Value::from(Vector3::new(1.0, 0.0, 0.0))));
        assert_eq!(host.get_property(Property::SalePrice), Some(Value::Int(0)));
    }

    #[test]
    fn test_missing_physics_actor_abandons_batch() {
        let registry = PropertyRegistry::with_defaults();
        let mut host = object();
        host.physics_actor = false;
        let mut prim = PrimSyncInfo::from_host(&host, &registry, ts(0), &actor("b"));

        let updates = [
            PropertyUpdate::new(Property::Velocity, Vector3::new(1.0, 0.0, 0.0), ts(4), actor("a")),
            PropertyUpdate::new(Property::Position, Vector3::new(2.0, 0.0, 0.0), ts(4), actor("a")),
        ];
        let err = prim.update_by_sync(&mut host, &updates, &registry).unwrap_err();
        assert!(matches!(err, SyncError::MissingPhysicsActor(_)));
        // Nothing from the batch landed
        assert_eq!(host.get_property(Property::Velocity), Some(Value::from(Vector3::ZERO)));
    }

    #[test]
    fn test_full_update_forces_every_bucket() {
        let registry = PropertyRegistry::with_defaults();
        let mut host = object();
        let mut prim = PrimSyncInfo::from_host(&host, &registry, ts(0), &actor("b"));

        let outcome = prim.update_by_local(&mut host, &[Property::FullUpdate], ts(1), &actor("b"), &registry);
        assert_eq!(outcome.dirty_buckets.len(), 2);
        assert!(prim.needs_send(BucketId(0), &registry));
        assert!(prim.needs_send(BucketId(1), &registry));

        prim.clear_dirty(BucketId(1), &registry);
        assert!(!prim.needs_send(BucketId(1), &registry));
        assert!(prim.needs_send(BucketId(0), &registry));
    }

    #[test]
    fn test_full_update_bypasses_timestamp_comparison() {
        let registry = PropertyRegistry::with_defaults();
        let mut host = object();
        let mut prim = PrimSyncInfo::from_host(&host, &registry, ts(0), &actor("b"));
        let remote = [PropertyUpdate::new(Property::SalePrice, 5i64, ts(100), actor("a"))];
        prim.update_by_sync(&mut host, &remote, &registry).unwrap();

        host.set_property(Property::SalePrice, Value::Int(9));
        prim.update_by_local(&mut host, &[Property::FullUpdate], ts(50), &actor("b"), &registry);

        let info = prim.get(Property::SalePrice).unwrap();
        assert_eq!(info.value(), &Value::Int(9));
        assert_eq!(info.timestamp(), ts(50));
    }

    #[test]
    fn test_nan_local_write_is_refused_and_bucket_still_decodes() {
        let registry = PropertyRegistry::with_defaults();
        let mut host = object().with(Property::GroupPosition, Vector3::new(1.0, 2.0, 3.0));
        let mut prim = PrimSyncInfo::from_host(&host, &registry, ts(0), &actor("b"));
        let nan = Value::from(Vector3::new(f32::NAN, 0.0, 0.0));

        for _ in 0..2 {
            host.set_property(Property::Velocity, nan.clone());
            host.set_property(Property::Position, Value::from(Vector3::new(7.0, 0.0, 0.0)));
            let outcome = prim.update_by_local(
                &mut host,
                &[Property::Velocity, Property::Position],
                ts(5),
                &actor("b"),
                &registry,
            );
            assert_eq!(outcome.non_finite, 1);
            assert_eq!(outcome.corrected, vec![Property::Velocity]);
        }
        assert_eq!(host.get_property(Property::Velocity), Some(Value::from(Vector3::ZERO)));

        // The rest of the bucket still crosses the wire
        let physics = registry.bucket_by_name("Physics").unwrap();
        let payload = physics.codec().encode(physics, &prim, &actor("b"));
        let update = physics.codec().decode(&payload).unwrap();
        let position = update.updates.iter().find(|u| u.property == Property::Position).unwrap();
        assert_eq!(position.value, Value::from(Vector3::new(7.0, 0.0, 0.0)));
        assert!(update.updates.iter().all(|u| u.value.is_finite()));
    }

    #[test]
    fn test_nan_value_is_never_tracked_from_host() {
        let registry = PropertyRegistry::with_defaults();
        let host = object().with(Property::Velocity, Vector3::new(0.0, f32::NAN, 0.0));
        let prim = PrimSyncInfo::from_host(&host, &registry, ts(0), &actor("b"));
        assert!(prim.get(Property::Velocity).is_none());
        assert!(prim.get(Property::Name).is_some());
    }

    #[test]
    fn test_local_write_skips_physics_property_without_actor() {
        let registry = PropertyRegistry::with_defaults();
        let mut host = object();
        host.physics_actor = false;
        let mut prim = PrimSyncInfo::from_host(&host, &registry, ts(0), &actor("b"));
        assert!(prim.get(Property::Position).is_none());

        host.set_property(Property::Position, Value::from(Vector3::new(1.0, 1.0, 1.0)));
        let outcome = prim.update_by_local(&mut host, &[Property::Position], ts(1), &actor("b"), &registry);
        assert_eq!(outcome.accepted, 0);
        assert!(outcome.dirty_buckets.is_empty());
    }
}
