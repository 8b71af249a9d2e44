//! In-memory scene
//!
//! A `Scene` backed by a map of object snapshots. Tests mutate it directly
//! the way a host would, then tell the node what changed.

use std::collections::HashMap;

use parking_lot::{Mutex, MutexGuard};

use symsync_core::{ObjectId, Property, Value};
use symsync_runtime::{DeleteMode, RemoteEvent, Scene};
use symsync_state::{ObjectSnapshot, PropertyHost};

#[derive(Debug, Default)]
pub struct MemoryScene {
    objects: Mutex<HashMap<ObjectId, ObjectSnapshot>>,
    terrain: Mutex<Vec<u8>>,
    events: Mutex<Vec<RemoteEvent>>,
    removed: Mutex<Vec<(ObjectId, DeleteMode)>>,
    listing: Mutex<()>,
}

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place an object as a host would, without telling any node
    pub fn insert(&self, object: ObjectSnapshot) {
        self.objects.lock().insert(object.id, object);
    }

    /// Drop an object as a host would, without telling any node
    pub fn take(&self, id: ObjectId) -> Option<ObjectSnapshot> {
        self.objects.lock().remove(&id)
    }

    /// Write a live property; false if the object is missing
    pub fn set(&self, id: ObjectId, property: Property, value: impl Into<Value>) -> bool {
        match self.objects.lock().get_mut(&id) {
            Some(object) => {
                object.properties.insert(property, value.into());
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: ObjectId, property: Property) -> Option<Value> {
        self.objects
            .lock()
            .get(&id)
            .and_then(|o| o.properties.get(&property).cloned())
    }

    pub fn set_physics_actor(&self, id: ObjectId, present: bool) {
        if let Some(object) = self.objects.lock().get_mut(&id) {
            object.physics_actor = present;
        }
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }

    /// Block `object_ids` until the guard drops
    pub fn hold_listing(&self) -> MutexGuard<'_, ()> {
        self.listing.lock()
    }

    /// Events delivered so far
    pub fn events(&self) -> Vec<RemoteEvent> {
        self.events.lock().clone()
    }

    /// Remote removals applied so far
    pub fn removed(&self) -> Vec<(ObjectId, DeleteMode)> {
        self.removed.lock().clone()
    }
}

impl Scene for MemoryScene {
    fn with_object(&self, id: ObjectId, f: &mut dyn FnMut(&mut dyn PropertyHost)) -> bool {
        let mut objects = self.objects.lock();
        match objects.get_mut(&id) {
            Some(object) => {
                f(object);
                true
            }
            None => false,
        }
    }

    fn object(&self, id: ObjectId) -> Option<ObjectSnapshot> {
        self.objects.lock().get(&id).cloned()
    }

    fn object_ids(&self) -> Vec<ObjectId> {
        let _listing = self.listing.lock();
        let mut ids: Vec<ObjectId> = self.objects.lock().keys().copied().collect();
        ids.sort();
        ids
    }

    fn contains(&self, id: ObjectId) -> bool {
        self.objects.lock().contains_key(&id)
    }

    fn apply_new_object(&self, object: ObjectSnapshot) {
        self.insert(object);
    }

    fn delete_object(&self, id: ObjectId, mode: DeleteMode) -> bool {
        let removed = self.objects.lock().remove(&id).is_some();
        if removed {
            self.removed.lock().push((id, mode));
        }
        removed
    }

    fn delete_all_objects(&self) {
        self.objects.lock().clear();
    }

    fn link_objects(&self, root: ObjectId, children: &[ObjectId], linked: ObjectSnapshot) {
        let mut objects = self.objects.lock();
        for child in children {
            objects.remove(child);
        }
        objects.insert(root, linked);
    }

    fn delink_objects(&self, _parts: &[ObjectId], before: &[ObjectId], after: Vec<ObjectSnapshot>) {
        let mut objects = self.objects.lock();
        for id in before {
            objects.remove(id);
        }
        for object in after {
            objects.insert(object.id, object);
        }
    }

    fn terrain(&self) -> Vec<u8> {
        self.terrain.lock().clone()
    }

    fn set_terrain(&self, data: Vec<u8>) {
        *self.terrain.lock() = data;
    }

    fn deliver_event(&self, event: &RemoteEvent) {
        self.events.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_object_writes_through() {
        let scene = MemoryScene::new();
        let id = ObjectId::from_u128(1);
        scene.insert(ObjectSnapshot::new(id).with(Property::Name, "a"));

        let found = scene.with_object(id, &mut |host: &mut dyn PropertyHost| {
            host.set_property(Property::Name, Value::from("b"));
        });
        assert!(found);
        assert_eq!(scene.get(id, Property::Name), Some(Value::from("b")));
        assert!(!scene.with_object(ObjectId::from_u128(2), &mut |_: &mut dyn PropertyHost| {}));
    }

    #[test]
    fn test_link_and_delink() {
        let scene = MemoryScene::new();
        let (root, child) = (ObjectId::from_u128(1), ObjectId::from_u128(2));
        scene.insert(ObjectSnapshot::new(root));
        scene.insert(ObjectSnapshot::new(child));

        scene.link_objects(root, &[child], ObjectSnapshot::new(root).with(Property::LinkNum, 2i64));
        assert_eq!(scene.object_ids(), vec![root]);

        scene.delink_objects(&[child], &[root], vec![ObjectSnapshot::new(root), ObjectSnapshot::new(child)]);
        assert_eq!(scene.object_ids(), vec![root, child]);
    }
}
