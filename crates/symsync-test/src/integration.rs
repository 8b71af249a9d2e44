//! End-to-end scenarios over a star cluster
//!
//! Every scenario runs real nodes linked by in-memory byte streams:
//! - Last-writer-wins convergence and stale-write correction
//! - Echo suppression and batch coalescing
//! - Structural updates, terrain and initial sync
//! - Events, malformed input and operational commands

use symsync_core::{ObjectId, Property, SyncTime, Value, Vector3};
use symsync_state::ObjectSnapshot;

use crate::{wait_until, ClusterNode, SyncCluster, SETTLE_TIMEOUT};

// ============================================================================
// FIXTURES
// ============================================================================

/// A plain object with general properties only
pub fn crate_object(id: ObjectId, name: &str) -> ObjectSnapshot {
    ObjectSnapshot::new(id)
        .with(Property::Name, name)
        .with(Property::SalePrice, 0i64)
        .with(Property::GroupPosition, Vector3::new(10.0, 10.0, 20.0))
}

/// An object with a physics actor and kinetic properties
pub fn physical_object(id: ObjectId, name: &str) -> ObjectSnapshot {
    crate_object(id, name)
        .with(Property::Position, Vector3::new(1.0, 2.0, 3.0))
        .with(Property::Velocity, Vector3::new(0.0, 0.0, 0.0))
        .with(Property::IsPhysical, true)
        .with_physics_actor()
}

/// Add `object` on `owner` and wait until every node has it
pub async fn spawn_object(cluster: &SyncCluster, owner: &ClusterNode, object: ObjectSnapshot) -> bool {
    use symsync_runtime::Scene;

    let id = object.id;
    owner.scene.insert(object);
    owner.node.on_object_added(id);
    wait_until(SETTLE_TIMEOUT, || cluster.nodes().all(|n| n.scene.contains(id))).await
}

/// Timestamps relative to now, in whole seconds
pub fn clock() -> impl Fn(i64) -> SyncTime {
    let base = SyncTime::now().as_micros();
    move |secs| SyncTime::from_micros(base + secs * 1_000_000)
}
